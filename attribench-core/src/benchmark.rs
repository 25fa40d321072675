//! End-to-end benchmark of several attribution methods on one model.
//!
//! For each method: attribute every evaluation instance, aggregate the attributions into a
//! global ranking, then evaluate and score perturbation quality (served from the cache when
//! the same model, method, sample and settings were scored before). Rankings are compared
//! pairwise and the scores ranked into a leaderboard.

use crate::aggregate::{GlobalAggregator, GlobalImportance};
use crate::agreement::{AgreementAnalyzer, AgreementResult};
use crate::cache::{CacheKey, QualityCache};
use crate::capability::{Attributor, Classifier, positive_probability};
use crate::config::EngineConfig;
use crate::error::{BenchError, Result};
use crate::leaderboard::Leaderboard;
use crate::perturbation::{EvaluationInstance, PerturbationEvaluator, evaluation_hash};
use crate::quality::{QualityScore, QualityScorer, QualityWeights};
use crate::reference::ReferenceStats;
use crate::sample::AttributionSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The classifier under test and the name it is reported under.
#[derive(Clone)]
pub struct ModelUnderTest {
    pub name: String,
    pub classifier: Arc<dyn Classifier>,
}

impl ModelUnderTest {
    pub fn new(name: impl Into<String>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            name: name.into(),
            classifier,
        }
    }
}

impl std::fmt::Debug for ModelUnderTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelUnderTest")
            .field("name", &self.name)
            .field("fingerprint", &self.classifier.fingerprint())
            .finish()
    }
}

/// Everything one benchmark run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub model_fingerprint: String,
    /// One ranking per method, ordered by method id.
    pub global: Vec<GlobalImportance>,
    pub agreements: Vec<AgreementResult>,
    /// One score per method, ordered by method id.
    pub quality: Vec<QualityScore>,
    pub leaderboard: Leaderboard,
    /// Methods whose score came from the cache.
    #[serde(default)]
    pub cached_methods: Vec<String>,
}

impl BenchmarkReport {
    pub fn quality_of(&self, method: &str) -> Option<&QualityScore> {
        self.quality.iter().find(|q| q.method == method)
    }

    pub fn ranking_of(&self, method: &str) -> Option<&GlobalImportance> {
        self.global.iter().find(|g| g.method == method)
    }
}

/// Hash of every setting that changes a quality score, bound to the reference data.
pub fn quality_config_hash(config: &EngineConfig, reference: &ReferenceStats) -> String {
    let weights = weights_fingerprint(&config.weights);
    let mut hasher = Sha256::new();
    hasher.update(config.perturbation.content_hash().as_bytes());
    hasher.update(weights.as_bytes());
    hasher.update(reference.content_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn weights_fingerprint(weights: &QualityWeights) -> String {
    format!(
        "{:016x}{:016x}{:016x}",
        weights.faithfulness.to_bits(),
        weights.robustness.to_bits(),
        weights.complexity.to_bits()
    )
}

/// Runs aggregation, agreement and quality scoring for a set of methods.
#[derive(Debug, Clone)]
pub struct Benchmark {
    config: EngineConfig,
}

impl Benchmark {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(
        &self,
        model: &ModelUnderTest,
        reference: Arc<ReferenceStats>,
        attributors: &[Arc<dyn Attributor>],
        instances: &[EvaluationInstance],
        cache: Option<&QualityCache>,
        cancel: &CancellationToken,
    ) -> Result<BenchmarkReport> {
        if attributors.is_empty() {
            return Err(BenchError::empty("no attributors supplied"));
        }
        let mut seen = BTreeSet::new();
        for attributor in attributors {
            if !seen.insert(attributor.method().to_string()) {
                return Err(BenchError::invalid_input(format!(
                    "duplicate attribution method '{}'",
                    attributor.method()
                )));
            }
        }
        let mut ordered: Vec<Arc<dyn Attributor>> = attributors.to_vec();
        ordered.sort_by(|a, b| a.method().cmp(b.method()));

        let run_id = Uuid::new_v4();
        let model_fingerprint = model.classifier.fingerprint();
        let samples_hash = evaluation_hash(instances);
        let config_hash = quality_config_hash(&self.config, &reference);
        let cache = cache.filter(|_| self.config.cache.enabled);
        tracing::info!(
            run_id = %run_id,
            model = %model.name,
            methods = ordered.len(),
            instances = instances.len(),
            "Starting benchmark run"
        );

        let aggregator = GlobalAggregator::new(self.config.aggregation.clone());
        let evaluator = PerturbationEvaluator::new(reference, self.config.perturbation.clone())?;
        let scorer = QualityScorer::new(self.config.weights.clone())?;

        let mut global = Vec::with_capacity(ordered.len());
        let mut quality = Vec::with_capacity(ordered.len());
        let mut cached_methods = Vec::new();

        for attributor in &ordered {
            let method = attributor.method().to_string();

            let samples = collect_samples(
                model.classifier.clone(),
                attributor.clone(),
                instances,
                self.config.perturbation.max_skip_fraction,
                cancel,
            )
            .await?;
            global.push(aggregator.aggregate(&method, &samples)?);

            let key = CacheKey::new(&model_fingerprint, &method, &samples_hash, &config_hash);
            if let Some(score) = cache.and_then(|c| c.get(&key)) {
                tracing::info!(method = %method, "Quality score served from cache");
                cached_methods.push(method);
                quality.push(score);
                continue;
            }

            let metrics = evaluator
                .evaluate(
                    model.classifier.clone(),
                    attributor.clone(),
                    instances,
                    cancel,
                )
                .await?;
            let score = match cache {
                Some(c) => scorer.score_and_cache(&metrics, c, key)?,
                None => scorer.score(&metrics)?,
            };
            tracing::info!(
                method = %method,
                composite = score.composite,
                faithfulness = score.faithfulness,
                robustness = score.robustness,
                complexity = score.complexity,
                "Scored method"
            );
            quality.push(score);
        }

        let analyzer = AgreementAnalyzer::new(self.config.agreement.clone());
        let agreements = analyzer.compare_all(&global)?;
        let leaderboard =
            Leaderboard::from_scores(quality.iter().map(|q| (model.name.as_str(), q)));

        tracing::info!(run_id = %run_id, pairs = agreements.len(), "Benchmark run complete");

        Ok(BenchmarkReport {
            run_id,
            created_at: Utc::now(),
            model: model.name.clone(),
            model_fingerprint,
            global,
            agreements,
            quality,
            leaderboard,
            cached_methods,
        })
    }
}

/// Attribute every instance once, skipping failures up to `max_skip_fraction`.
pub async fn collect_samples(
    classifier: Arc<dyn Classifier>,
    attributor: Arc<dyn Attributor>,
    instances: &[EvaluationInstance],
    max_skip_fraction: f64,
    cancel: &CancellationToken,
) -> Result<Vec<AttributionSample>> {
    if instances.is_empty() {
        return Err(BenchError::empty("no evaluation instances supplied"));
    }
    let owned = instances.to_vec();
    let cancel = cancel.clone();
    let total = owned.len();

    let handle = tokio::task::spawn_blocking(move || {
        let mut samples = Vec::with_capacity(owned.len());
        let mut skipped = 0usize;
        for instance in owned {
            if cancel.is_cancelled() {
                return Err(BenchError::Cancelled {
                    completed: samples.len() + skipped,
                    total,
                });
            }
            let outcome = classifier.predict_one(&instance.values).and_then(|probs| {
                let attribution = attributor.attribute(&instance.values)?;
                Ok((attribution, probs))
            });
            match outcome {
                Ok((attribution, probs)) => {
                    let predicted = positive_probability(&probs).filter(|p| p.is_finite());
                    let non_finite = attribution
                        .contributions
                        .iter()
                        .find(|(_, v)| !v.is_finite())
                        .map(|(name, v)| format!("{name} = {v}"));
                    match (predicted, non_finite) {
                        (Some(predicted), None) => samples
                            .push(attribution.into_sample(instance.instance_id, predicted)),
                        (None, _) => {
                            tracing::warn!(
                                instance_id = %instance.instance_id,
                                "Empty or non-finite prediction, skipping"
                            );
                            skipped += 1;
                        }
                        (Some(_), Some(cause)) => {
                            tracing::warn!(
                                instance_id = %instance.instance_id,
                                method = %attributor.method(),
                                cause = %cause,
                                "Non-finite contribution, skipping"
                            );
                            skipped += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        instance_id = %instance.instance_id,
                        method = %attributor.method(),
                        error = %e,
                        "Attribution failed, skipping"
                    );
                    skipped += 1;
                }
            }
        }
        Ok((samples, skipped))
    });

    let (samples, skipped) = handle
        .await
        .map_err(|e| BenchError::invalid_input(format!("attribution worker failed: {e}")))??;

    let limit = (total as f64 * max_skip_fraction).floor() as usize;
    if skipped > limit || samples.is_empty() {
        return Err(BenchError::InsufficientValidSamples {
            stage: "attribution".into(),
            skipped,
            total,
            limit,
        });
    }
    Ok(samples)
}

//! Perturbation-based evaluation of one attribution method on one model.
//!
//! For each evaluation instance the evaluator computes the original attribution, its
//! complexity, a masking-curve faithfulness score and a re-attribution robustness score.
//! Instances are independent and run on a bounded worker pool; each draws randomness
//! from its own seeded generator so results do not depend on scheduling.

pub mod complexity;
pub mod faithfulness;
pub mod robustness;

use crate::capability::{Attribution, Attributor, Classifier, positive_probability};
use crate::config::PerturbationConfig;
use crate::error::{BenchError, CapabilityError, FailureStage, InstanceFailure, Result};
use crate::reference::ReferenceStats;
use crate::sample::AttributionSample;
use crate::stats;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// One instance to evaluate, with values in reference feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInstance {
    pub instance_id: String,
    pub values: Vec<f64>,
}

impl EvaluationInstance {
    pub fn new(instance_id: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            instance_id: instance_id.into(),
            values,
        }
    }
}

/// SHA-256 over instance ids and value bits.
pub fn evaluation_hash(instances: &[EvaluationInstance]) -> String {
    let mut hasher = Sha256::new();
    for instance in instances {
        hasher.update(instance.instance_id.as_bytes());
        hasher.update([0u8]);
        for v in &instance.values {
            hasher.update(v.to_bits().to_le_bytes());
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Raw per-instance scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetrics {
    pub instance_id: String,
    /// Negated masking correlation in [-1, 1].
    pub faithfulness: f64,
    /// `None` when the attributor failed on a perturbed copy.
    pub robustness: Option<f64>,
    pub complexity: f64,
    pub gini: f64,
    pub effective_features: usize,
    /// The original attribution that was scored.
    pub sample: AttributionSample,
}

/// Raw (pre-normalization) evaluation output for one method on one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationMetrics {
    pub method: String,
    pub model_fingerprint: String,
    pub num_instances: usize,
    pub skipped_count: usize,
    pub instances: Vec<InstanceMetrics>,
    /// Every recorded failure, skipped instances and robustness-only failures alike.
    pub failures: Vec<InstanceFailure>,
}

impl PerturbationMetrics {
    pub fn evaluated_count(&self) -> usize {
        self.instances.len()
    }

    pub fn mean_faithfulness(&self) -> Option<f64> {
        let values: Vec<f64> = self.instances.iter().map(|i| i.faithfulness).collect();
        stats::mean(&values)
    }

    /// Mean over instances with a robustness score.
    pub fn mean_robustness(&self) -> Option<f64> {
        let values: Vec<f64> = self.instances.iter().filter_map(|i| i.robustness).collect();
        stats::mean(&values)
    }

    pub fn mean_complexity(&self) -> Option<f64> {
        let values: Vec<f64> = self.instances.iter().map(|i| i.complexity).collect();
        stats::mean(&values)
    }

    pub fn mean_gini(&self) -> Option<f64> {
        let values: Vec<f64> = self.instances.iter().map(|i| i.gini).collect();
        stats::mean(&values)
    }

    pub fn mean_effective_features(&self) -> Option<f64> {
        let values: Vec<f64> = self
            .instances
            .iter()
            .map(|i| i.effective_features as f64)
            .collect();
        stats::mean(&values)
    }

    /// Original attributions of every evaluated instance, for global aggregation.
    pub fn samples(&self) -> Vec<AttributionSample> {
        self.instances.iter().map(|i| i.sample.clone()).collect()
    }
}

enum InstanceOutcome {
    Evaluated {
        metrics: Box<InstanceMetrics>,
        robustness_failure: Option<InstanceFailure>,
    },
    Skipped(InstanceFailure),
}

/// Shared read-only state for instance workers.
struct EvalContext {
    classifier: Arc<dyn Classifier>,
    attributor: Arc<dyn Attributor>,
    reference: Arc<ReferenceStats>,
    feature_names: Vec<String>,
    baselines: Vec<f64>,
    config: PerturbationConfig,
    attributor_lock: Option<Mutex<()>>,
}

impl EvalContext {
    fn attribute(&self, instance: &[f64]) -> std::result::Result<Attribution, CapabilityError> {
        match &self.attributor_lock {
            Some(lock) => {
                let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                self.attributor.attribute(instance)
            }
            None => self.attributor.attribute(instance),
        }
    }

    fn evaluate_instance(&self, index: usize, instance: &EvaluationInstance) -> InstanceOutcome {
        let id = &instance.instance_id;
        let skip = |stage: FailureStage, cause: String| {
            tracing::warn!(instance_id = %id, stage = %stage, cause = %cause, "Skipping instance");
            InstanceOutcome::Skipped(InstanceFailure {
                instance_id: id.clone(),
                stage,
                cause,
            })
        };

        let predicted_value = match self.classifier.predict_one(&instance.values) {
            Ok(p) if p.iter().all(|v| v.is_finite()) => positive_probability(&p),
            Ok(_) => None,
            Err(e) => return skip(FailureStage::Prediction, e.to_string()),
        };
        let Some(predicted_value) = predicted_value else {
            return skip(
                FailureStage::Prediction,
                "empty or non-finite probabilities".into(),
            );
        };

        let attribution = match self.attribute(&instance.values) {
            Ok(a) => a,
            Err(e) => return skip(FailureStage::Attribution, e.to_string()),
        };
        let original = match attribution.to_vector(&self.feature_names) {
            Ok(v) => v,
            Err(e) => return skip(FailureStage::Attribution, e.to_string()),
        };

        let Some(report) = complexity::complexity(&original) else {
            return skip(
                FailureStage::Complexity,
                "attribution vector is all zeros".into(),
            );
        };

        let curve = match faithfulness::masking_curve(
            self.classifier.as_ref(),
            &instance.values,
            &original,
            &self.baselines,
            self.config.max_masked_features,
        ) {
            Ok(c) => c,
            Err(e) => return skip(FailureStage::Faithfulness, e.to_string()),
        };

        let mut rng = StdRng::seed_from_u64(instance_seed(self.config.seed, index));
        let mut robustness_failure = None;
        let robustness = match self.robustness(&instance.values, &original, &mut rng) {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::warn!(instance_id = %id, error = %e, "Robustness unavailable for instance");
                robustness_failure = Some(InstanceFailure {
                    instance_id: id.clone(),
                    stage: FailureStage::Robustness,
                    cause: e.to_string(),
                });
                None
            }
        };

        tracing::debug!(
            instance_id = %id,
            faithfulness = curve.faithfulness,
            robustness = ?robustness,
            complexity = report.complexity,
            "Evaluated instance"
        );

        InstanceOutcome::Evaluated {
            metrics: Box::new(InstanceMetrics {
                instance_id: id.clone(),
                faithfulness: curve.faithfulness,
                robustness,
                complexity: report.complexity,
                gini: report.gini,
                effective_features: report.effective_features,
                sample: attribution.into_sample(id.clone(), predicted_value),
            }),
            robustness_failure,
        }
    }

    fn robustness(
        &self,
        instance: &[f64],
        original: &[f64],
        rng: &mut StdRng,
    ) -> std::result::Result<f64, CapabilityError> {
        let mut perturbed_attributions = Vec::with_capacity(self.config.repeats);
        for _ in 0..self.config.repeats {
            let perturbed = robustness::perturb(instance, &self.reference, &self.config, rng);
            let attribution = self.attribute(&perturbed)?;
            perturbed_attributions.push(attribution.to_vector(&self.feature_names)?);
        }
        robustness::robustness_score(original, &perturbed_attributions)
            .ok_or_else(|| CapabilityError::Attributor("no perturbed attributions".into()))
    }
}

/// SplitMix64 over the run seed and instance index.
fn instance_seed(seed: u64, index: usize) -> u64 {
    let mut z = seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Scores one attribution method against a classifier using the reference statistics.
#[derive(Debug, Clone)]
pub struct PerturbationEvaluator {
    reference: Arc<ReferenceStats>,
    config: PerturbationConfig,
}

impl PerturbationEvaluator {
    pub fn new(reference: Arc<ReferenceStats>, config: PerturbationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { reference, config })
    }

    pub fn config(&self) -> &PerturbationConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceStats {
        &self.reference
    }

    fn context(
        &self,
        classifier: Arc<dyn Classifier>,
        attributor: Arc<dyn Attributor>,
    ) -> EvalContext {
        let attributor_lock = (!attributor.is_thread_safe()).then(|| Mutex::new(()));
        EvalContext {
            classifier,
            attributor,
            reference: self.reference.clone(),
            feature_names: self.reference.feature_names(),
            baselines: self.reference.baselines(),
            config: self.config.clone(),
            attributor_lock,
        }
    }

    fn validate_instances(&self, instances: &[EvaluationInstance]) -> Result<()> {
        if instances.is_empty() {
            return Err(BenchError::empty("no evaluation instances supplied"));
        }
        let n = self.reference.num_features();
        for instance in instances {
            if instance.values.len() != n {
                return Err(BenchError::schema(format!(
                    "evaluation instance '{}' has {} values, reference has {n} features",
                    instance.instance_id,
                    instance.values.len()
                )));
            }
            if instance.values.iter().any(|v| !v.is_finite()) {
                return Err(BenchError::invalid_input(format!(
                    "evaluation instance '{}' contains a non-finite value",
                    instance.instance_id
                )));
            }
        }
        Ok(())
    }

    /// Evaluate on the worker pool, checking `cancel` before each instance starts.
    pub async fn evaluate(
        &self,
        classifier: Arc<dyn Classifier>,
        attributor: Arc<dyn Attributor>,
        instances: &[EvaluationInstance],
        cancel: &CancellationToken,
    ) -> Result<PerturbationMetrics> {
        self.validate_instances(instances)?;
        let method = attributor.method().to_string();
        let model_fingerprint = classifier.fingerprint();
        let workers = self.config.worker_count();
        tracing::info!(
            method = %method,
            instances = instances.len(),
            repeats = self.config.repeats,
            workers,
            "Starting perturbation evaluation"
        );

        let ctx = Arc::new(self.context(classifier, attributor));
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::with_capacity(instances.len());

        for (index, instance) in instances.iter().cloned().enumerate() {
            let ctx = ctx.clone();
            let sem = semaphore.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return None;
                };
                if cancel.is_cancelled() {
                    return None;
                }
                let id = instance.instance_id.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || ctx.evaluate_instance(index, &instance))
                        .await;
                Some(outcome.unwrap_or_else(|e| {
                    tracing::warn!(instance_id = %id, error = %e, "Instance worker aborted");
                    InstanceOutcome::Skipped(InstanceFailure {
                        instance_id: id,
                        stage: FailureStage::Attribution,
                        cause: format!("worker aborted: {e}"),
                    })
                }))
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        let mut cancelled = false;
        for handle in handles {
            match handle.await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => cancelled = true,
                Err(e) => {
                    tracing::warn!(error = %e, "Instance task failed to join");
                    cancelled = true;
                }
            }
        }
        if cancelled {
            tracing::info!(method = %method, completed = outcomes.len(), "Evaluation cancelled");
            return Err(BenchError::Cancelled {
                completed: outcomes.len(),
                total: instances.len(),
            });
        }

        self.finish(method, model_fingerprint, instances.len(), outcomes)
    }

    /// Evaluate on the calling thread, one instance after another.
    ///
    /// Produces the same metrics as [`evaluate`](Self::evaluate) for the same inputs.
    pub fn evaluate_sequential(
        &self,
        classifier: Arc<dyn Classifier>,
        attributor: Arc<dyn Attributor>,
        instances: &[EvaluationInstance],
        cancel: &CancellationToken,
    ) -> Result<PerturbationMetrics> {
        self.validate_instances(instances)?;
        let method = attributor.method().to_string();
        let model_fingerprint = classifier.fingerprint();
        let ctx = self.context(classifier, attributor);

        let mut outcomes = Vec::with_capacity(instances.len());
        for (index, instance) in instances.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BenchError::Cancelled {
                    completed: outcomes.len(),
                    total: instances.len(),
                });
            }
            outcomes.push(ctx.evaluate_instance(index, instance));
        }
        self.finish(method, model_fingerprint, instances.len(), outcomes)
    }

    fn finish(
        &self,
        method: String,
        model_fingerprint: String,
        total: usize,
        outcomes: Vec<InstanceOutcome>,
    ) -> Result<PerturbationMetrics> {
        let mut instances = Vec::new();
        let mut failures = Vec::new();
        let mut skipped_count = 0;
        let mut robustness_failures = 0;

        for outcome in outcomes {
            match outcome {
                InstanceOutcome::Evaluated {
                    metrics,
                    robustness_failure,
                } => {
                    if let Some(failure) = robustness_failure {
                        robustness_failures += 1;
                        failures.push(failure);
                    }
                    instances.push(*metrics);
                }
                InstanceOutcome::Skipped(failure) => {
                    skipped_count += 1;
                    failures.push(failure);
                }
            }
        }

        let limit = skip_limit(total, self.config.max_skip_fraction);
        if skipped_count > limit || instances.is_empty() {
            tracing::warn!(method = %method, skipped_count, total, "Too many instances skipped");
            return Err(BenchError::InsufficientValidSamples {
                stage: "evaluation".into(),
                skipped: skipped_count,
                total,
                limit,
            });
        }

        let evaluated = instances.len();
        let robustness_limit = skip_limit(evaluated, self.config.max_skip_fraction);
        if robustness_failures > robustness_limit || robustness_failures == evaluated {
            tracing::warn!(method = %method, robustness_failures, evaluated, "Too many robustness failures");
            return Err(BenchError::InsufficientValidSamples {
                stage: "robustness".into(),
                skipped: robustness_failures,
                total: evaluated,
                limit: robustness_limit,
            });
        }

        tracing::info!(
            method = %method,
            evaluated,
            skipped_count,
            robustness_failures,
            "Perturbation evaluation complete"
        );

        Ok(PerturbationMetrics {
            method,
            model_fingerprint,
            num_instances: total,
            skipped_count,
            instances,
            failures,
        })
    }
}

fn skip_limit(total: usize, fraction: f64) -> usize {
    (total as f64 * fraction).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{LinearAttributor, LogisticClassifier};
    use crate::reference::ReferenceDataset;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<LogisticClassifier>, Arc<ReferenceStats>) {
        let model = Arc::new(LogisticClassifier::new(
            vec!["a".into(), "b".into()],
            vec![2.0, 1.0],
            0.0,
        ));
        let reference = Arc::new(
            ReferenceStats::from_dataset(&ReferenceDataset::numeric(
                vec!["a".into(), "b".into()],
                vec![vec![-1.0, -1.0], vec![1.0, 1.0], vec![0.5, -0.5], vec![-0.5, 0.5]],
            ))
            .unwrap(),
        );
        (model, reference)
    }

    fn instances(n: usize) -> Vec<EvaluationInstance> {
        (0..n)
            .map(|i| EvaluationInstance::new(format!("i{i}"), vec![1.0 + i as f64 * 0.1, 0.5]))
            .collect()
    }

    /// Fails on every call after the first `ok_calls`.
    struct FlakyAttributor {
        calls: AtomicUsize,
        ok_calls: usize,
    }

    impl Attributor for FlakyAttributor {
        fn method(&self) -> &str {
            "flaky"
        }

        fn attribute(&self, instance: &[f64]) -> std::result::Result<Attribution, CapabilityError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok_calls {
                return Err(CapabilityError::Attributor("boom".into()));
            }
            Ok(Attribution::new(BTreeMap::from([
                ("a".to_string(), instance[0]),
                ("b".to_string(), instance[1]),
            ])))
        }

        fn is_thread_safe(&self) -> bool {
            false
        }
    }

    /// Emits NaN for every perturbed copy (any instance not in the evaluation set).
    struct NanOnPerturbed;

    impl Attributor for NanOnPerturbed {
        fn method(&self) -> &str {
            "nan"
        }

        fn attribute(&self, instance: &[f64]) -> std::result::Result<Attribution, CapabilityError> {
            let exact = instance[1] == 0.5;
            let value = if exact { instance[0] } else { f64::NAN };
            Ok(Attribution::new(BTreeMap::from([
                ("a".to_string(), value),
                ("b".to_string(), 0.1),
            ])))
        }
    }

    /// Identity attributions, NaN for perturbed copies of instances with a large first value.
    struct NanWhenFarPerturbed;

    impl Attributor for NanWhenFarPerturbed {
        fn method(&self) -> &str {
            "identity"
        }

        fn attribute(&self, instance: &[f64]) -> std::result::Result<Attribution, CapabilityError> {
            let perturbed = instance[1] != 0.5;
            let a = if perturbed && instance[0] > 3.0 {
                f64::NAN
            } else {
                instance[0]
            };
            Ok(Attribution::new(BTreeMap::from([
                ("a".to_string(), a),
                ("b".to_string(), instance[1]),
            ])))
        }
    }

    #[tokio::test]
    async fn test_evaluate_linear_model() {
        let (model, reference) = setup();
        let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
        let evaluator =
            PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();

        let metrics = evaluator
            .evaluate(model, attributor, &instances(4), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(metrics.method, "linear");
        assert_eq!(metrics.evaluated_count(), 4);
        assert_eq!(metrics.skipped_count, 0);
        assert!(metrics.failures.is_empty());
        assert!(metrics.mean_faithfulness().unwrap() > 0.8);
        let robustness = metrics.mean_robustness().unwrap();
        assert!(robustness > 0.9 && robustness <= 1.0);
        let complexity = metrics.mean_complexity().unwrap();
        assert!((0.0..=1.0).contains(&complexity));
        assert_eq!(metrics.samples().len(), 4);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let (model, reference) = setup();
        let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
        let config = PerturbationConfig {
            workers: Some(3),
            ..PerturbationConfig::default()
        };
        let evaluator = PerturbationEvaluator::new(reference, config).unwrap();
        let cancel = CancellationToken::new();
        let data = instances(6);

        let parallel = evaluator
            .evaluate(model.clone(), attributor.clone(), &data, &cancel)
            .await
            .unwrap();
        let sequential = evaluator
            .evaluate_sequential(model, attributor, &data, &cancel)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_too_many_skipped_fails() {
        let (model, reference) = setup();
        // original attributions succeed for the first instance only
        let attributor = Arc::new(FlakyAttributor {
            calls: AtomicUsize::new(0),
            ok_calls: 1,
        });
        let config = PerturbationConfig {
            repeats: 1,
            workers: Some(1),
            ..PerturbationConfig::default()
        };
        let evaluator = PerturbationEvaluator::new(reference, config).unwrap();
        let err = evaluator
            .evaluate_sequential(model, attributor, &instances(4), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, BenchError::InsufficientValidSamples { .. }));
    }

    #[tokio::test]
    async fn test_all_robustness_failures_rejected() {
        let (model, reference) = setup();
        let config = PerturbationConfig {
            max_skip_fraction: 1.0,
            ..PerturbationConfig::default()
        };
        let evaluator = PerturbationEvaluator::new(reference, config).unwrap();
        let err = evaluator
            .evaluate(model, Arc::new(NanOnPerturbed), &instances(2), &CancellationToken::new())
            .await
            .unwrap_err();
        // every instance lost its robustness score, so the evaluation is rejected
        assert!(matches!(
            err,
            BenchError::InsufficientValidSamples { ref stage, .. } if stage == "robustness"
        ));
    }

    #[tokio::test]
    async fn test_partial_robustness_failure_keeps_instance() {
        let (model, reference) = setup();
        let evaluator =
            PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();
        let mut data = instances(3);
        data.push(EvaluationInstance::new("far", vec![5.0, 0.5]));

        let metrics = evaluator
            .evaluate(model, Arc::new(NanWhenFarPerturbed), &data, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(metrics.evaluated_count(), 4);
        assert_eq!(metrics.skipped_count, 0);
        assert_eq!(metrics.failures.len(), 1);
        assert_eq!(metrics.failures[0].instance_id, "far");
        assert_eq!(metrics.failures[0].stage, FailureStage::Robustness);

        let far = metrics.instances.iter().find(|m| m.instance_id == "far").unwrap();
        assert_eq!(far.robustness, None);
        assert!(far.faithfulness.is_finite());

        let others: Vec<f64> = metrics
            .instances
            .iter()
            .filter_map(|m| m.robustness)
            .collect();
        assert_eq!(others.len(), 3);
        let expected = others.iter().sum::<f64>() / 3.0;
        assert!((metrics.mean_robustness().unwrap() - expected).abs() < 1e-12);
        let all_complexity = metrics.instances.iter().map(|m| m.complexity).sum::<f64>() / 4.0;
        assert!((metrics.mean_complexity().unwrap() - all_complexity).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (model, reference) = setup();
        let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
        let evaluator =
            PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = evaluator
            .evaluate(model, attributor, &instances(3), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Cancelled { total: 3, .. }));
    }

    #[test]
    fn test_rejects_wrong_instance_width() {
        let (model, reference) = setup();
        let attributor = Arc::new(LinearAttributor::from_logistic(&model, &reference).unwrap());
        let evaluator =
            PerturbationEvaluator::new(reference, PerturbationConfig::default()).unwrap();
        let bad = vec![EvaluationInstance::new("x", vec![1.0])];
        assert!(matches!(
            evaluator.evaluate_sequential(model, attributor, &bad, &CancellationToken::new()),
            Err(BenchError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_instance_seed_differs_by_index() {
        assert_ne!(instance_seed(42, 0), instance_seed(42, 1));
        assert_eq!(instance_seed(42, 3), instance_seed(42, 3));
    }

    #[test]
    fn test_evaluation_hash_tracks_content() {
        let a = instances(2);
        let mut b = instances(2);
        assert_eq!(evaluation_hash(&a), evaluation_hash(&b));
        b[1].values[0] += 1e-9;
        assert_ne!(evaluation_hash(&a), evaluation_hash(&b));
    }
}

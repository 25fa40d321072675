//! Composite explanation quality.
//!
//! Faithfulness is rescaled from [-1, 1] to [0, 1] so that higher is better on every
//! dimension, then the three means are combined with explicit weights that must sum to 1.

use crate::cache::{CacheKey, QualityCache};
use crate::error::{BenchError, Result};
use crate::perturbation::PerturbationMetrics;
use serde::{Deserialize, Serialize};

/// Composite weights over faithfulness, robustness and complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    #[serde(default = "default_weight")]
    pub faithfulness: f64,
    #[serde(default = "default_weight")]
    pub robustness: f64,
    #[serde(default = "default_weight")]
    pub complexity: f64,
    /// Allowed distance of the weight sum from 1.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_weight() -> f64 {
    1.0 / 3.0
}

fn default_tolerance() -> f64 {
    1e-9
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            faithfulness: default_weight(),
            robustness: default_weight(),
            complexity: default_weight(),
            tolerance: default_tolerance(),
        }
    }
}

impl QualityWeights {
    pub fn new(faithfulness: f64, robustness: f64, complexity: f64) -> Self {
        Self {
            faithfulness,
            robustness,
            complexity,
            tolerance: default_tolerance(),
        }
    }

    pub fn sum(&self) -> f64 {
        self.faithfulness + self.robustness + self.complexity
    }

    /// Weights must be finite, non-negative and sum to 1 within `tolerance`.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(BenchError::InvalidWeights(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        for (name, w) in [
            ("faithfulness", self.faithfulness),
            ("robustness", self.robustness),
            ("complexity", self.complexity),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(BenchError::InvalidWeights(format!(
                    "{name} weight must be finite and non-negative, got {w}"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > self.tolerance {
            return Err(BenchError::InvalidWeights(format!(
                "weights sum to {sum}, expected 1 (tolerance {})",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Quality of one attribution method on one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub method: String,
    pub model_fingerprint: String,
    /// Mean faithfulness rescaled to [0, 1].
    pub faithfulness: f64,
    /// Mean faithfulness before rescaling, in [-1, 1].
    pub raw_faithfulness: f64,
    pub robustness: f64,
    pub complexity: f64,
    pub composite: f64,
    pub weights: QualityWeights,
    pub evaluated_instances: usize,
    pub skipped_count: usize,
    /// Reported alongside complexity; not part of the composite.
    pub mean_gini: f64,
    pub mean_effective_features: f64,
}

/// Rescale a correlation-style score from [-1, 1] to [0, 1].
pub fn rescale_faithfulness(raw: f64) -> f64 {
    ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Fold raw perturbation metrics into a [`QualityScore`].
pub fn score(metrics: &PerturbationMetrics, weights: &QualityWeights) -> Result<QualityScore> {
    weights.validate()?;

    let raw_faithfulness = metrics.mean_faithfulness().ok_or_else(|| {
        BenchError::empty(format!("no evaluated instances for method '{}'", metrics.method))
    })?;
    let robustness =
        metrics
            .mean_robustness()
            .ok_or_else(|| BenchError::InsufficientValidSamples {
                stage: "robustness".into(),
                skipped: metrics.evaluated_count(),
                total: metrics.evaluated_count(),
                limit: 0,
            })?;
    let complexity = metrics.mean_complexity().unwrap_or_default();
    let faithfulness = rescale_faithfulness(raw_faithfulness);

    let composite = weights.faithfulness * faithfulness
        + weights.robustness * robustness
        + weights.complexity * complexity;

    Ok(QualityScore {
        method: metrics.method.clone(),
        model_fingerprint: metrics.model_fingerprint.clone(),
        faithfulness,
        raw_faithfulness,
        robustness,
        complexity,
        composite,
        weights: weights.clone(),
        evaluated_instances: metrics.evaluated_count(),
        skipped_count: metrics.skipped_count,
        mean_gini: metrics.mean_gini().unwrap_or_default(),
        mean_effective_features: metrics.mean_effective_features().unwrap_or_default(),
    })
}

/// Scores metrics with a fixed, validated weight set.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    pub fn new(weights: QualityWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    pub fn score(&self, metrics: &PerturbationMetrics) -> Result<QualityScore> {
        score(metrics, &self.weights)
    }

    /// Score and store the result under `key`.
    pub fn score_and_cache(
        &self,
        metrics: &PerturbationMetrics,
        cache: &QualityCache,
        key: CacheKey,
    ) -> Result<QualityScore> {
        let score = self.score(metrics)?;
        cache.insert(key, score.clone());
        Ok(score)
    }
}

//! Exact attributions for models that are linear in the logit.

use super::logistic::LogisticClassifier;
use super::{Attribution, Attributor};
use crate::error::CapabilityError;
use crate::reference::ReferenceStats;

/// Contribution of feature i is `w_i * (x_i - baseline_i)`; the base value is the logit
/// at the baseline, so contributions plus base value reproduce the instance's logit.
#[derive(Debug, Clone)]
pub struct LinearAttributor {
    method: String,
    feature_names: Vec<String>,
    weights: Vec<f64>,
    baselines: Vec<f64>,
    intercept: f64,
}

impl LinearAttributor {
    pub fn new(
        method: impl Into<String>,
        feature_names: Vec<String>,
        weights: Vec<f64>,
        baselines: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, CapabilityError> {
        if weights.len() != feature_names.len() {
            return Err(CapabilityError::Dimension {
                expected: feature_names.len(),
                actual: weights.len(),
            });
        }
        if baselines.len() != feature_names.len() {
            return Err(CapabilityError::Dimension {
                expected: feature_names.len(),
                actual: baselines.len(),
            });
        }
        Ok(Self {
            method: method.into(),
            feature_names,
            weights,
            baselines,
            intercept,
        })
    }

    /// Explain a logistic model against the reference baselines.
    pub fn from_logistic(
        model: &LogisticClassifier,
        reference: &ReferenceStats,
    ) -> Result<Self, CapabilityError> {
        Self::new(
            "linear",
            model.feature_names.clone(),
            model.weights.clone(),
            reference.baselines(),
            model.intercept,
        )
    }

    pub fn base_value(&self) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(&self.baselines)
                .map(|(w, b)| w * b)
                .sum::<f64>()
    }
}

impl Attributor for LinearAttributor {
    fn method(&self) -> &str {
        &self.method
    }

    fn attribute(&self, instance: &[f64]) -> Result<Attribution, CapabilityError> {
        if instance.len() != self.weights.len() {
            return Err(CapabilityError::Dimension {
                expected: self.weights.len(),
                actual: instance.len(),
            });
        }
        let contributions = self
            .feature_names
            .iter()
            .zip(self.weights.iter().zip(&self.baselines))
            .zip(instance)
            .map(|((name, (w, b)), x)| (name.clone(), w * (x - b)))
            .collect();
        Ok(Attribution::new(contributions).with_base_value(self.base_value()))
    }
}

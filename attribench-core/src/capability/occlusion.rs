//! Model-agnostic occlusion attributions.

use super::{Attribution, Attributor, Classifier, argmax};
use crate::error::CapabilityError;
use crate::reference::ReferenceStats;
use std::sync::Arc;

/// Contribution of feature i is the drop in the predicted class probability when that
/// feature alone is replaced by its reference baseline.
pub struct OcclusionAttributor {
    method: String,
    classifier: Arc<dyn Classifier>,
    feature_names: Vec<String>,
    baselines: Vec<f64>,
}

impl OcclusionAttributor {
    pub fn new(classifier: Arc<dyn Classifier>, reference: &ReferenceStats) -> Self {
        Self {
            method: "occlusion".to_string(),
            classifier,
            feature_names: reference.feature_names(),
            baselines: reference.baselines(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }
}

impl std::fmt::Debug for OcclusionAttributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcclusionAttributor")
            .field("method", &self.method)
            .field("features", &self.feature_names.len())
            .finish()
    }
}

impl Attributor for OcclusionAttributor {
    fn method(&self) -> &str {
        &self.method
    }

    fn attribute(&self, instance: &[f64]) -> Result<Attribution, CapabilityError> {
        let n = self.feature_names.len();
        if instance.len() != n {
            return Err(CapabilityError::Dimension {
                expected: n,
                actual: instance.len(),
            });
        }

        // row 0: the instance, rows 1..=n: one feature occluded each, last: full baseline
        let mut batch = Vec::with_capacity(n + 2);
        batch.push(instance.to_vec());
        for i in 0..n {
            let mut row = instance.to_vec();
            row[i] = self.baselines[i];
            batch.push(row);
        }
        batch.push(self.baselines.clone());

        let probs = self.classifier.predict_proba(&batch)?;
        if probs.len() != batch.len() {
            return Err(CapabilityError::Classifier(format!(
                "expected {} prediction rows, got {}",
                batch.len(),
                probs.len()
            )));
        }
        let class = argmax(&probs[0]);
        let prob = |row: &Vec<f64>| -> Result<f64, CapabilityError> {
            row.get(class)
                .copied()
                .filter(|p| p.is_finite())
                .ok_or_else(|| CapabilityError::NonFinite(format!("probability for class {class}")))
        };

        let original = prob(&probs[0])?;
        let mut contributions = std::collections::BTreeMap::new();
        for (i, name) in self.feature_names.iter().enumerate() {
            contributions.insert(name.clone(), original - prob(&probs[i + 1])?);
        }
        let base_value = prob(&probs[n + 1])?;
        Ok(Attribution::new(contributions).with_base_value(base_value))
    }
}

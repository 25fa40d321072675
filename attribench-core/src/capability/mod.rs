//! Capabilities consumed by the engine: a trained classifier and a per-instance attributor.
//!
//! Any attribution algorithm (exact tree explainers, kernel approximations, local
//! surrogates) plugs in through [`Attributor`]; the engine never depends on a specific
//! library's API shape.

pub mod linear;
pub mod logistic;
pub mod occlusion;

pub use linear::LinearAttributor;
pub use logistic::LogisticClassifier;
pub use occlusion::OcclusionAttributor;

use crate::error::CapabilityError;
use crate::sample::AttributionSample;
use std::collections::BTreeMap;

/// A trained probabilistic classifier.
///
/// Implementations must be deterministic for identical input and safe to share across
/// threads for concurrent reads.
pub trait Classifier: Send + Sync {
    /// Class probabilities for each row of `batch`.
    fn predict_proba(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, CapabilityError>;

    /// Content hash of the model artifact; changes whenever the model does.
    fn fingerprint(&self) -> String;

    /// Index of the most probable class, lowest index on ties.
    fn predict(&self, instance: &[f64]) -> Result<usize, CapabilityError> {
        let probs = self.predict_one(instance)?;
        Ok(argmax(&probs))
    }

    fn predict_one(&self, instance: &[f64]) -> Result<Vec<f64>, CapabilityError> {
        self.predict_proba(&[instance.to_vec()])?
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::Classifier("empty prediction batch".into()))
    }
}

/// One instance's raw attribution as returned by an attributor.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub contributions: BTreeMap<String, f64>,
    pub base_value: Option<f64>,
}

impl Attribution {
    pub fn new(contributions: BTreeMap<String, f64>) -> Self {
        Self {
            contributions,
            base_value: None,
        }
    }

    pub fn with_base_value(mut self, base_value: f64) -> Self {
        self.base_value = Some(base_value);
        self
    }

    /// Contributions in `order`, failing on missing, extra or non-finite entries.
    pub fn to_vector(&self, order: &[String]) -> Result<Vec<f64>, CapabilityError> {
        if self.contributions.len() != order.len() {
            return Err(CapabilityError::Dimension {
                expected: order.len(),
                actual: self.contributions.len(),
            });
        }
        order
            .iter()
            .map(|name| match self.contributions.get(name) {
                Some(v) if v.is_finite() => Ok(*v),
                Some(v) => Err(CapabilityError::NonFinite(format!("{name} = {v}"))),
                None => Err(CapabilityError::Attributor(format!(
                    "missing contribution for '{name}'"
                ))),
            })
            .collect()
    }

    pub fn into_sample(self, instance_id: impl Into<String>, predicted_value: f64) -> AttributionSample {
        AttributionSample {
            instance_id: instance_id.into(),
            feature_contributions: self.contributions,
            base_value: self.base_value,
            predicted_value,
        }
    }
}

/// Computes per-feature contributions for a single instance.
pub trait Attributor: Send + Sync {
    /// Method identifier, e.g. `"shap"` or `"occlusion"`.
    fn method(&self) -> &str;

    fn attribute(&self, instance: &[f64]) -> Result<Attribution, CapabilityError>;

    /// Whether concurrent `attribute` calls are allowed; the evaluator serializes calls
    /// to attributors that return `false`.
    fn is_thread_safe(&self) -> bool {
        true
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Value recorded as an instance's `predicted_value`: the positive-class probability of a
/// binary model, the sole output of a single-output model, otherwise the probability of
/// the most probable class. `None` for an empty prediction.
pub(crate) fn positive_probability(probs: &[f64]) -> Option<f64> {
    match probs {
        [] => None,
        [p] | [_, p] => Some(*p),
        _ => probs.get(argmax(probs)).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_lowest_index() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.2, 0.8]), 1);
    }

    #[test]
    fn test_positive_probability_reads_binary_class_one() {
        assert_eq!(positive_probability(&[0.924, 0.076]), Some(0.076));
        assert_eq!(positive_probability(&[0.3]), Some(0.3));
        assert_eq!(positive_probability(&[0.2, 0.5, 0.3]), Some(0.5));
        assert_eq!(positive_probability(&[]), None);
    }

    #[test]
    fn test_attribution_to_vector() {
        let attr = Attribution::new(BTreeMap::from([("a".to_string(), 1.0), ("b".to_string(), 2.0)]));
        let order = vec!["b".to_string(), "a".to_string()];
        assert_eq!(attr.to_vector(&order).unwrap(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_attribution_to_vector_rejects_nan() {
        let attr = Attribution::new(BTreeMap::from([("a".to_string(), f64::NAN)]));
        assert!(matches!(
            attr.to_vector(&["a".to_string()]),
            Err(CapabilityError::NonFinite(_))
        ));
    }

    #[test]
    fn test_attribution_to_vector_wrong_names() {
        let attr = Attribution::new(BTreeMap::from([("a".to_string(), 1.0)]));
        assert!(attr.to_vector(&["z".to_string()]).is_err());
        assert!(matches!(
            attr.to_vector(&["a".to_string(), "b".to_string()]),
            Err(CapabilityError::Dimension { expected: 2, actual: 1 })
        ));
    }
}

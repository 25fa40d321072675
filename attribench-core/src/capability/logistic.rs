//! Binary logistic regression classifier.

use super::Classifier;
use crate::error::CapabilityError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `p(class 1 | x) = sigmoid(w · x + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LogisticClassifier {
    pub fn new(feature_names: Vec<String>, weights: Vec<f64>, intercept: f64) -> Self {
        Self {
            feature_names,
            weights,
            intercept,
        }
    }

    pub fn logit(&self, instance: &[f64]) -> Result<f64, CapabilityError> {
        if instance.len() != self.weights.len() {
            return Err(CapabilityError::Dimension {
                expected: self.weights.len(),
                actual: instance.len(),
            });
        }
        let z = self
            .weights
            .iter()
            .zip(instance)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        if z.is_finite() {
            Ok(z)
        } else {
            Err(CapabilityError::NonFinite(format!("logit {z}")))
        }
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LogisticClassifier {
    fn predict_proba(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, CapabilityError> {
        batch
            .iter()
            .map(|row| {
                let p = sigmoid(self.logit(row)?);
                Ok(vec![1.0 - p, p])
            })
            .collect()
    }

    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"logistic");
        for name in &self.feature_names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        for w in &self.weights {
            hasher.update(w.to_bits().to_le_bytes());
        }
        hasher.update(self.intercept.to_bits().to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LogisticClassifier {
        LogisticClassifier::new(vec!["a".into(), "b".into()], vec![2.0, 1.0], 0.0)
    }

    #[test]
    fn test_predict_proba_sums_to_one() {
        let probs = model().predict_proba(&[vec![1.0, -1.0], vec![0.0, 0.0]]).unwrap();
        assert!((probs[0][1] - sigmoid(1.0)).abs() < 1e-12);
        assert!((probs[1][0] - 0.5).abs() < 1e-12);
        for p in probs {
            assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_predict_class() {
        assert_eq!(model().predict(&[1.0, 0.0]).unwrap(), 1);
        assert_eq!(model().predict(&[-1.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(matches!(
            model().predict_proba(&[vec![1.0]]),
            Err(CapabilityError::Dimension { .. })
        ));
    }

    #[test]
    fn test_fingerprint_changes_with_weights() {
        let a = model();
        let mut b = model();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.weights[0] = 2.5;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}

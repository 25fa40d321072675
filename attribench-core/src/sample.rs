//! Per-instance attribution records.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One instance's explanation: a signed contribution per feature plus prediction metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionSample {
    /// Opaque identifier, stable across methods for the same instance.
    pub instance_id: String,
    /// Feature name to signed contribution. Keys are unique and iterate in name order.
    pub feature_contributions: BTreeMap<String, f64>,
    /// The method's reference output before contributions are added, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_value: Option<f64>,
    /// Probability of the positive class (class 1) for a binary model; for a model with
    /// more than two classes, the probability of the most probable class.
    pub predicted_value: f64,
}

impl AttributionSample {
    pub fn new<I, S>(instance_id: impl Into<String>, contributions: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            instance_id: instance_id.into(),
            feature_contributions: contributions
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
            base_value: None,
            predicted_value: 0.0,
        }
    }

    pub fn with_base_value(mut self, base_value: f64) -> Self {
        self.base_value = Some(base_value);
        self
    }

    pub fn with_predicted_value(mut self, predicted_value: f64) -> Self {
        self.predicted_value = predicted_value;
        self
    }

    pub fn num_features(&self) -> usize {
        self.feature_contributions.len()
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.feature_contributions.keys().map(String::as_str)
    }

    pub fn contribution(&self, feature: &str) -> Option<f64> {
        self.feature_contributions.get(feature).copied()
    }

    /// Contributions laid out in the given feature order.
    ///
    /// Fails with `SchemaMismatch` if the sample does not carry exactly `order`.
    pub fn to_vector(&self, order: &[String]) -> Result<Vec<f64>> {
        if order.len() != self.feature_contributions.len() {
            return Err(BenchError::schema(format!(
                "instance '{}' has {} features, expected {}",
                self.instance_id,
                self.feature_contributions.len(),
                order.len()
            )));
        }
        order
            .iter()
            .map(|name| {
                self.contribution(name).ok_or_else(|| {
                    BenchError::schema(format!(
                        "instance '{}' is missing feature '{name}'",
                        self.instance_id
                    ))
                })
            })
            .collect()
    }
}

/// Check that `samples` is non-empty, finite, and shares one feature-name set.
///
/// Returns the common feature names in ascending order.
pub fn validate_schema(samples: &[AttributionSample]) -> Result<Vec<String>> {
    let first = samples
        .first()
        .ok_or_else(|| BenchError::empty("no attribution samples supplied"))?;
    let reference: Vec<String> = first.feature_contributions.keys().cloned().collect();
    if reference.is_empty() {
        return Err(BenchError::schema(format!(
            "instance '{}' has no features",
            first.instance_id
        )));
    }

    for sample in samples {
        if !sample
            .feature_contributions
            .keys()
            .eq(reference.iter())
        {
            let missing: Vec<&str> = reference
                .iter()
                .filter(|f| !sample.feature_contributions.contains_key(*f))
                .map(String::as_str)
                .collect();
            let extra: Vec<&str> = sample
                .feature_names()
                .filter(|f| !first.feature_contributions.contains_key(*f))
                .collect();
            return Err(BenchError::schema(format!(
                "instance '{}' differs from '{}': missing {:?}, extra {:?}",
                sample.instance_id, first.instance_id, missing, extra
            )));
        }
        if let Some((name, value)) = sample
            .feature_contributions
            .iter()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(BenchError::invalid_input(format!(
                "instance '{}' has non-finite contribution {value} for '{name}'",
                sample.instance_id
            )));
        }
    }

    Ok(reference)
}

//! Reference (background) dataset and the per-feature statistics derived from it.
//!
//! The statistics are computed once and shared read-only across evaluation workers.

use crate::error::{BenchError, Result};
use crate::stats;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How a feature's values are perturbed and masked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    #[default]
    Numeric,
    /// Category codes stored as numbers.
    Categorical,
}

/// A table of background instances, one value per feature per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDataset {
    pub feature_names: Vec<String>,
    /// Per-feature kind; an empty list means every feature is numeric.
    #[serde(default)]
    pub kinds: Vec<FeatureKind>,
    pub rows: Vec<Vec<f64>>,
}

impl ReferenceDataset {
    pub fn numeric(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            feature_names,
            kinds: Vec::new(),
            rows,
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<FeatureKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn kind(&self, index: usize) -> FeatureKind {
        self.kinds.get(index).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_names.is_empty() {
            return Err(BenchError::empty("reference dataset has no features"));
        }
        if self.rows.is_empty() {
            return Err(BenchError::empty("reference dataset has no rows"));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.feature_names.iter().find(|f| !seen.insert(*f)) {
            return Err(BenchError::invalid_input(format!(
                "duplicate feature name '{dup}' in reference dataset"
            )));
        }
        if !self.kinds.is_empty() && self.kinds.len() != self.feature_names.len() {
            return Err(BenchError::invalid_input(format!(
                "reference dataset declares {} feature kinds for {} features",
                self.kinds.len(),
                self.feature_names.len()
            )));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.feature_names.len() {
                return Err(BenchError::invalid_input(format!(
                    "reference row {i} has {} values, expected {}",
                    row.len(),
                    self.feature_names.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(BenchError::invalid_input(format!(
                    "reference row {i} contains a non-finite value"
                )));
            }
        }
        Ok(())
    }

    /// SHA-256 over feature names, kinds and value bits.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.feature_names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        for i in 0..self.feature_names.len() {
            hasher.update([self.kind(i) as u8]);
        }
        for row in &self.rows {
            for v in row {
                hasher.update(v.to_bits().to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Observed distribution of one categorical feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalDistribution {
    /// Distinct codes in ascending order.
    pub values: Vec<f64>,
    pub counts: Vec<usize>,
}

impl CategoricalDistribution {
    fn from_column(column: &[f64]) -> Self {
        let mut sorted = column.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mut values: Vec<f64> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for v in sorted {
            match values.last() {
                Some(last) if *last == v => {
                    if let Some(c) = counts.last_mut() {
                        *c += 1;
                    }
                }
                _ => {
                    values.push(v);
                    counts.push(1);
                }
            }
        }
        Self { values, counts }
    }

    /// Most frequent code, smallest code on ties.
    pub fn mode(&self) -> f64 {
        let mut best = 0;
        for (i, c) in self.counts.iter().enumerate() {
            if *c > self.counts[best] {
                best = i;
            }
        }
        self.values[best]
    }

    /// Draw a code with probability proportional to its observed count.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let total: usize = self.counts.iter().sum();
        let mut pick = rng.gen_range(0..total);
        for (value, count) in self.values.iter().zip(&self.counts) {
            if pick < *count {
                return *value;
            }
            pick -= count;
        }
        self.values[self.values.len() - 1]
    }
}

/// Statistics for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub name: String,
    pub kind: FeatureKind,
    pub mean: f64,
    pub std: f64,
    /// Masking value: the mean for numerics, the mode for categoricals.
    pub baseline: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<CategoricalDistribution>,
}

/// Per-feature statistics of a reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    pub features: Vec<FeatureStats>,
    pub num_rows: usize,
    pub content_hash: String,
}

impl ReferenceStats {
    pub fn from_dataset(dataset: &ReferenceDataset) -> Result<Self> {
        dataset.validate()?;

        let features = dataset
            .feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column: Vec<f64> = dataset.rows.iter().map(|r| r[i]).collect();
                let mean = stats::mean(&column).unwrap_or(0.0);
                let std = stats::std_dev(&column).unwrap_or(0.0);
                let kind = dataset.kind(i);
                let (baseline, distribution) = match kind {
                    FeatureKind::Numeric => (mean, None),
                    FeatureKind::Categorical => {
                        let dist = CategoricalDistribution::from_column(&column);
                        (dist.mode(), Some(dist))
                    }
                };
                FeatureStats {
                    name: name.clone(),
                    kind,
                    mean,
                    std,
                    baseline,
                    distribution,
                }
            })
            .collect();

        Ok(Self {
            features,
            num_rows: dataset.rows.len(),
            content_hash: dataset.content_hash(),
        })
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn baselines(&self) -> Vec<f64> {
        self.features.iter().map(|f| f.baseline).collect()
    }

    pub fn index_of(&self, feature: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == feature)
    }
}

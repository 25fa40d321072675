//! Agreement between two methods' global rankings.
//!
//! Top-k overlap and rank correlation are computed so that swapping the two inputs only
//! swaps `method_a`/`method_b` in the result.

use crate::aggregate::GlobalImportance;
use crate::config::AgreementConfig;
use crate::error::{BenchError, Result};
use crate::stats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Rank correlation over the union of both methods' top-N features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankCorrelation {
    pub spearman: f64,
    pub kendall_tau: f64,
}

/// Pairwise agreement statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementResult {
    pub method_a: String,
    pub method_b: String,
    /// Requested k to overlap fraction in [0, 1].
    pub top_k_overlap: BTreeMap<usize, f64>,
    /// Requested k to the k actually used, for every k larger than a ranking.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clamped_k: BTreeMap<usize, usize>,
    pub rank_correlation: RankCorrelation,
    pub top_n_for_correlation: usize,
    /// Features in the union of both top-N lists.
    pub union_size: usize,
    /// Features present in both full rankings.
    pub shared_features: usize,
}

impl AgreementResult {
    pub fn overlap_at(&self, k: usize) -> Option<f64> {
        self.top_k_overlap.get(&k).copied()
    }

    /// The same statistics with the method labels exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            method_a: self.method_b.clone(),
            method_b: self.method_a.clone(),
            ..self.clone()
        }
    }
}

/// Compares global rankings produced by different explanation methods.
#[derive(Debug, Clone, Default)]
pub struct AgreementAnalyzer {
    config: AgreementConfig,
}

impl AgreementAnalyzer {
    pub fn new(config: AgreementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgreementConfig {
        &self.config
    }

    /// Compare with the configured top-k list and top-N.
    pub fn compare(&self, a: &GlobalImportance, b: &GlobalImportance) -> Result<AgreementResult> {
        compare(
            a,
            b,
            &self.config.top_k_values,
            self.config.top_n_for_correlation,
        )
    }

    /// Compare every unordered pair, ordered by method identifier.
    pub fn compare_all(&self, rankings: &[GlobalImportance]) -> Result<Vec<AgreementResult>> {
        let mut sorted: Vec<&GlobalImportance> = rankings.iter().collect();
        sorted.sort_by(|x, y| x.method.cmp(&y.method));

        let mut results = Vec::new();
        for (i, a) in sorted.iter().enumerate() {
            for b in &sorted[i + 1..] {
                results.push(self.compare(a, b)?);
            }
        }
        Ok(results)
    }
}

/// Compare two rankings.
///
/// Fails with `IncompatibleFeatureSpace` if they reference disjoint feature sets.
pub fn compare(
    a: &GlobalImportance,
    b: &GlobalImportance,
    top_k_values: &[usize],
    top_n_for_correlation: usize,
) -> Result<AgreementResult> {
    if a.is_empty() || b.is_empty() {
        return Err(BenchError::empty(format!(
            "cannot compare '{}' and '{}': a ranking has no features",
            a.method, b.method
        )));
    }
    if top_n_for_correlation == 0 {
        return Err(BenchError::config("top_n_for_correlation must be at least 1"));
    }

    let features_a: HashSet<&str> = a.ranked_features.iter().map(|r| r.feature.as_str()).collect();
    let shared_features = b
        .ranked_features
        .iter()
        .filter(|r| features_a.contains(r.feature.as_str()))
        .count();
    if shared_features == 0 {
        return Err(BenchError::IncompatibleFeatureSpace {
            method_a: a.method.clone(),
            method_b: b.method.clone(),
        });
    }

    let mut top_k_overlap = BTreeMap::new();
    let mut clamped_k = BTreeMap::new();
    for &k in top_k_values {
        if k == 0 {
            return Err(BenchError::config("top-k cutoffs must be positive"));
        }
        let effective = k.min(a.len()).min(b.len());
        if effective < k {
            tracing::debug!(k, effective, "Clamped top-k to ranking size");
            clamped_k.insert(k, effective);
        }
        let top_a: HashSet<&str> = a.top_k(effective).into_iter().collect();
        let hits = b
            .top_k(effective)
            .into_iter()
            .filter(|f| top_a.contains(f))
            .count();
        top_k_overlap.insert(k, hits as f64 / effective as f64);
    }

    let union: BTreeSet<&str> = a
        .top_k(top_n_for_correlation)
        .into_iter()
        .chain(b.top_k(top_n_for_correlation))
        .collect();
    let penalty = (top_n_for_correlation + 1) as f64;
    let rank_vector = |g: &GlobalImportance| -> Vec<f64> {
        union
            .iter()
            .map(|f| match g.rank_of(f) {
                Some(rank) if rank <= top_n_for_correlation => rank as f64,
                _ => penalty,
            })
            .collect()
    };
    let ranks_a = rank_vector(a);
    let ranks_b = rank_vector(b);

    let rank_correlation = RankCorrelation {
        spearman: stats::spearman(&ranks_a, &ranks_b),
        kendall_tau: stats::kendall_tau(&ranks_a, &ranks_b),
    };

    tracing::debug!(
        method_a = %a.method,
        method_b = %b.method,
        spearman = rank_correlation.spearman,
        kendall_tau = rank_correlation.kendall_tau,
        "Compared rankings"
    );

    Ok(AgreementResult {
        method_a: a.method.clone(),
        method_b: b.method.clone(),
        top_k_overlap,
        clamped_k,
        rank_correlation,
        top_n_for_correlation,
        union_size: union.len(),
        shared_features,
    })
}

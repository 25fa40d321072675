//! Keyed store for computed quality scores.
//!
//! Perturbation evaluation is the expensive step, so scores are cached per
//! (model, method, evaluation sample, perturbation config), each identified by content
//! hash. Invalidation is always an explicit call.

use crate::quality::QualityScore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Content-hash key of one quality computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub model_hash: String,
    pub method: String,
    pub samples_hash: String,
    pub config_hash: String,
}

impl CacheKey {
    pub fn new(
        model_hash: impl Into<String>,
        method: impl Into<String>,
        samples_hash: impl Into<String>,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            model_hash: model_hash.into(),
            method: method.into(),
            samples_hash: samples_hash.into(),
            config_hash: config_hash.into(),
        }
    }

    /// Single SHA-256 over all key parts.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            &self.model_hash,
            &self.method,
            &self.samples_hash,
            &self.config_hash,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Hit/miss counters for a [`QualityCache`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared quality score cache. Reads are concurrent; writes overwrite idempotently.
#[derive(Debug, Default)]
pub struct QualityCache {
    entries: RwLock<HashMap<CacheKey, QualityScore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QualityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<QualityScore> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let found = entries.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: CacheKey, score: QualityScore) {
        tracing::debug!(method = %key.method, key = %key.digest(), "Caching quality score");
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, score);
    }

    /// Drop every entry computed against the model with this hash.
    pub fn invalidate_model(&self, model_hash: &str) -> usize {
        self.retain(|key| key.model_hash != model_hash)
    }

    /// Drop every entry computed on the evaluation sample with this hash.
    pub fn invalidate_samples(&self, samples_hash: &str) -> usize {
        self.retain(|key| key.samples_hash != samples_hash)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn retain(&self, keep: impl Fn(&CacheKey) -> bool) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, _| keep(key));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(removed, "Invalidated cached quality scores");
        }
        removed
    }
}

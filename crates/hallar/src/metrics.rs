//! Engine metrics: per-provider execution stats, cache effectiveness, and
//! resolve latency.
//!
//! Everything here is observational. Metrics feed monitoring and the
//! learner's latency factor; they never influence ranking directly.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;
use crate::weights::WeightSnapshot;

/// Accumulated execution stats for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Total `generate` invocations.
    pub calls: u64,
    /// Candidates emitted across all calls.
    pub candidates: u64,
    /// Internal failures absorbed by the executor.
    pub failures: u64,
    /// Deadline overruns absorbed by the executor.
    pub timeouts: u64,
    /// Cumulative wall-clock latency across calls.
    pub total_latency_ms: f64,
}

impl ProviderStats {
    /// Mean latency per call, 0 when never called.
    #[must_use]
    pub fn average_latency_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_latency_ms / self.calls as f64
        }
    }
}

/// A point-in-time export of all engine metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Per-provider execution stats, keyed by provider id.
    pub providers: BTreeMap<String, ProviderStats>,
    /// Cache lookups that returned a usable candidate.
    pub cache_hits: u64,
    /// Cache lookups that missed (absent, gated, or expired).
    pub cache_misses: u64,
    /// Hit ratio over all lookups, 0 when never looked up.
    pub cache_hit_rate: f64,
    /// Completed `resolve` calls.
    pub resolutions: u64,
    /// Mean end-to-end resolve latency.
    pub average_resolve_ms: f64,
    /// Consistent view of the learned weights.
    pub weights: WeightSnapshot,
}

#[derive(Debug, Default)]
struct MetricsInner {
    providers: BTreeMap<String, ProviderStats>,
    cache_hits: u64,
    cache_misses: u64,
    resolutions: u64,
    total_resolve_ms: f64,
}

/// Shared metrics accumulator. Cheap to update from the executor hot path.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: RwLock<MetricsInner>,
}

impl Metrics {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a provider call that completed (successfully or not).
    pub(crate) fn record_provider_call(
        &self,
        id: &ProviderId,
        latency_ms: f64,
        candidates: usize,
    ) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let stats = inner.providers.entry(id.to_string()).or_default();
        stats.calls += 1;
        stats.candidates += candidates as u64;
        stats.total_latency_ms += latency_ms;
    }

    /// Record an absorbed provider failure.
    pub(crate) fn record_provider_failure(&self, id: &ProviderId, latency_ms: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let stats = inner.providers.entry(id.to_string()).or_default();
        stats.calls += 1;
        stats.failures += 1;
        stats.total_latency_ms += latency_ms;
    }

    /// Record an absorbed provider timeout.
    pub(crate) fn record_provider_timeout(&self, id: &ProviderId, deadline_ms: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let stats = inner.providers.entry(id.to_string()).or_default();
        stats.calls += 1;
        stats.timeouts += 1;
        stats.total_latency_ms += deadline_ms;
    }

    /// Record a cache lookup result.
    pub(crate) fn record_cache_lookup(&self, hit: bool) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if hit {
            inner.cache_hits += 1;
        } else {
            inner.cache_misses += 1;
        }
    }

    /// Record a completed resolution.
    pub(crate) fn record_resolution(&self, elapsed_ms: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.resolutions += 1;
        inner.total_resolve_ms += elapsed_ms;
    }

    /// Export a snapshot, merging in the current weight view.
    #[must_use]
    pub fn export(&self, weights: WeightSnapshot) -> EngineMetrics {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let lookups = inner.cache_hits + inner.cache_misses;
        EngineMetrics {
            providers: inner.providers.clone(),
            cache_hits: inner.cache_hits,
            cache_misses: inner.cache_misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.cache_hits as f64 / lookups as f64
            },
            resolutions: inner.resolutions,
            average_resolve_ms: if inner.resolutions == 0 {
                0.0
            } else {
                inner.total_resolve_ms / inner.resolutions as f64
            },
            weights,
        }
    }
}

//! Learned weight table consumed by the fusion engine.
//!
//! Four independent, read-mostly sub-tables: per-provider, per-platform,
//! per-intent-class, and per-tier. Every weight defaults to 1.0 (neutral) and
//! is only ever written by the weight learner via exponential moving
//! averages. Readers take a consistent [`WeightSnapshot`]; racing outcome
//! writes resolve last-writer-wins per key.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::Tier;
use crate::query::IntentClass;

/// Lower bound for all learned weights.
pub const MIN_WEIGHT: f64 = 0.01;
/// Upper bound for provider/platform/intent weights.
pub const MAX_WEIGHT: f64 = 0.99;
/// Upper bound for tier weights, which blend in a latency factor and may
/// exceed the success-rate range.
pub const MAX_TIER_WEIGHT: f64 = 2.0;

/// A consistent, serializable view of all learned weights.
///
/// This is both the read snapshot handed to fusion and the on-disk JSON
/// document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    /// Weight per provider id.
    #[serde(default)]
    pub provider: BTreeMap<String, f64>,
    /// Weight per platform class.
    #[serde(default)]
    pub platform: BTreeMap<String, f64>,
    /// Weight per normalized intent class.
    #[serde(default)]
    pub intent: BTreeMap<IntentClass, f64>,
    /// Weight per cost tier.
    #[serde(default)]
    pub tier: BTreeMap<Tier, f64>,
    /// When any weight last changed.
    pub last_updated: DateTime<Utc>,
}

impl Default for WeightSnapshot {
    fn default() -> Self {
        Self {
            provider: BTreeMap::new(),
            platform: BTreeMap::new(),
            intent: BTreeMap::new(),
            tier: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl WeightSnapshot {
    /// Weight for a provider, 1.0 when unlearned.
    #[must_use]
    pub fn provider_weight(&self, id: &str) -> f64 {
        self.provider.get(id).copied().unwrap_or(1.0)
    }

    /// Weight for a platform class, 1.0 when unlearned.
    #[must_use]
    pub fn platform_weight(&self, platform: &str) -> f64 {
        self.platform.get(platform).copied().unwrap_or(1.0)
    }

    /// Weight for an intent class, 1.0 when unlearned.
    #[must_use]
    pub fn intent_weight(&self, intent: IntentClass) -> f64 {
        self.intent.get(&intent).copied().unwrap_or(1.0)
    }

    /// Weight for a tier, 1.0 when unlearned.
    #[must_use]
    pub fn tier_weight(&self, tier: Tier) -> f64 {
        self.tier.get(&tier).copied().unwrap_or(1.0)
    }
}

/// The shared, process-wide weight table.
///
/// The learner is the sole writer; fusion is the sole reader. No await
/// happens while the lock is held, so the `std` lock is safe in async
/// context.
#[derive(Debug, Default)]
pub struct WeightTable {
    inner: RwLock<WeightSnapshot>,
}

fn ema(current: f64, observed: f64, alpha: f64) -> f64 {
    current.mul_add(1.0 - alpha, observed * alpha)
}

impl WeightTable {
    /// Create a table with no learned weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a table from a persisted snapshot, re-clamping every value so
    /// a hand-edited or stale file cannot smuggle out-of-range weights in.
    #[must_use]
    pub fn from_snapshot(mut snapshot: WeightSnapshot) -> Self {
        for w in snapshot.provider.values_mut() {
            *w = w.clamp(MIN_WEIGHT, MAX_WEIGHT);
        }
        for w in snapshot.platform.values_mut() {
            *w = w.clamp(MIN_WEIGHT, MAX_WEIGHT);
        }
        for w in snapshot.intent.values_mut() {
            *w = w.clamp(MIN_WEIGHT, MAX_WEIGHT);
        }
        for w in snapshot.tier.values_mut() {
            *w = w.clamp(MIN_WEIGHT, MAX_TIER_WEIGHT);
        }
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Take a consistent snapshot of all weights.
    ///
    /// Weights are advisory, so a poisoned lock is recovered rather than
    /// propagated; the last written state is still the best available.
    #[must_use]
    pub fn snapshot(&self) -> WeightSnapshot {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// EMA-update one provider's weight toward an observed success rate.
    pub(crate) fn learn_provider(&self, id: &str, observed: f64, alpha: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current = inner.provider.get(id).copied().unwrap_or(1.0);
        let next = ema(current, observed, alpha).clamp(MIN_WEIGHT, MAX_WEIGHT);
        inner.provider.insert(id.to_string(), next);
        inner.last_updated = Utc::now();
    }

    /// EMA-update one platform's weight toward an observed success rate.
    pub(crate) fn learn_platform(&self, platform: &str, observed: f64, alpha: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current = inner.platform.get(platform).copied().unwrap_or(1.0);
        let next = ema(current, observed, alpha).clamp(MIN_WEIGHT, MAX_WEIGHT);
        inner.platform.insert(platform.to_string(), next);
        inner.last_updated = Utc::now();
    }

    /// EMA-update one intent class's weight toward an observed success rate.
    pub(crate) fn learn_intent(&self, intent: IntentClass, observed: f64, alpha: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current = inner.intent.get(&intent).copied().unwrap_or(1.0);
        let next = ema(current, observed, alpha).clamp(MIN_WEIGHT, MAX_WEIGHT);
        inner.intent.insert(intent, next);
        inner.last_updated = Utc::now();
    }

    /// EMA-update one tier's weight toward a combined success/speed score.
    pub(crate) fn learn_tier(&self, tier: Tier, observed: f64, alpha: f64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current = inner.tier.get(&tier).copied().unwrap_or(1.0);
        let next = ema(current, observed, alpha).clamp(MIN_WEIGHT, MAX_TIER_WEIGHT);
        inner.tier.insert(tier, next);
        inner.last_updated = Utc::now();
    }
}

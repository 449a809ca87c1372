//! Exponential-moving-average weight learning over reported outcomes.
//!
//! The learner is the only writer of the [`WeightTable`]. Each reported
//! outcome is appended to a bounded log; once a bucket (provider, platform,
//! intent class, or tier) has accumulated enough samples, that bucket's
//! weight drifts toward the observed evidence with a small learning rate.
//! A single bad night of flaky runs moves a weight by a percent or two, not
//! to zero.
//!
//! Tier weights learn a combined target rather than a raw success rate: a
//! tier that succeeds but takes seconds per candidate should rank below one
//! that succeeds in milliseconds.

use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::Tier;
use crate::fusion::SuccessHistory;
use crate::outcome::Outcome;
use crate::provider::ProviderId;
use crate::query::IntentClass;
use crate::weights::WeightTable;

/// Default EMA learning rate.
pub const DEFAULT_ALPHA: f64 = 0.01;

/// Samples a bucket needs before its weight starts moving.
pub const MIN_SAMPLES: usize = 10;

/// Maximum retained outcomes.
pub const LOG_CAPACITY: usize = 1000;

/// Days an outcome stays relevant.
pub const LOG_RETENTION_DAYS: i64 = 30;

/// Latency divisor for the tier speed factor. 10 seconds maps to the floor.
const TIME_FACTOR_SCALE_MS: f64 = 10_000.0;

/// Learner tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// EMA learning rate.
    pub alpha: f64,
    /// Samples a bucket needs before learning starts.
    pub min_samples: usize,
    /// Outcome log capacity.
    pub log_capacity: usize,
    /// Outcome log retention in days.
    pub retention_days: i64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            min_samples: MIN_SAMPLES,
            log_capacity: LOG_CAPACITY,
            retention_days: LOG_RETENTION_DAYS,
        }
    }
}

/// One retained outcome, reduced to the fields learning needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    provider: ProviderId,
    platform: String,
    intent: IntentClass,
    tier: Tier,
    success: bool,
    latency_ms: f64,
    timestamp: chrono::DateTime<Utc>,
}

impl From<&Outcome> for LogEntry {
    fn from(outcome: &Outcome) -> Self {
        Self {
            provider: outcome.candidate.source().clone(),
            platform: outcome.query.platform().to_string(),
            intent: outcome.query.intent_class(),
            tier: outcome.candidate.tier(),
            success: outcome.success,
            latency_ms: outcome.latency_ms,
            timestamp: outcome.timestamp,
        }
    }
}

/// Learns weights from outcome reports and answers historical-rate queries
/// for fusion.
#[derive(Debug)]
pub struct Learner {
    config: LearnerConfig,
    log: RwLock<VecDeque<LogEntry>>,
}

impl Default for Learner {
    fn default() -> Self {
        Self::new(LearnerConfig::default())
    }
}

impl Learner {
    /// Create a learner with an empty outcome log.
    #[must_use]
    pub fn new(config: LearnerConfig) -> Self {
        Self {
            config,
            log: RwLock::new(VecDeque::new()),
        }
    }

    /// Record one outcome and nudge every bucket that has enough evidence.
    pub fn record(&self, outcome: &Outcome, weights: &WeightTable) {
        let entry = LogEntry::from(outcome);
        let observed = if entry.success { 1.0 } else { 0.0 };

        let mut log = self.log.write().unwrap_or_else(|e| e.into_inner());
        log.push_back(entry.clone());
        self.trim(&mut log);

        if Self::count(&log, |e| e.provider == entry.provider) >= self.config.min_samples {
            weights.learn_provider(entry.provider.as_str(), observed, self.config.alpha);
        }
        if Self::count(&log, |e| e.platform == entry.platform) >= self.config.min_samples {
            weights.learn_platform(&entry.platform, observed, self.config.alpha);
        }
        if Self::count(&log, |e| e.intent == entry.intent) >= self.config.min_samples {
            weights.learn_intent(entry.intent, observed, self.config.alpha);
        }

        let tier_samples: Vec<&LogEntry> = log.iter().filter(|e| e.tier == entry.tier).collect();
        if tier_samples.len() >= self.config.min_samples {
            let target = Self::tier_target(&tier_samples);
            weights.learn_tier(entry.tier, target, self.config.alpha);
        }

        tracing::debug!(
            provider = %entry.provider,
            intent = %entry.intent.as_str(),
            success = entry.success,
            log_len = log.len(),
            "recorded outcome"
        );
    }

    /// Retained outcome count.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.log.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Success over speed: a tier earns a high weight by matching reliably
    /// and matching fast.
    fn tier_target(samples: &[&LogEntry]) -> f64 {
        let total = samples.len() as f64;
        let successes = samples.iter().filter(|e| e.success).count() as f64;
        let success_rate = successes / total;
        let avg_latency_ms = samples.iter().map(|e| e.latency_ms).sum::<f64>() / total;
        let time_factor = f64::max(0.1, 1.0 - avg_latency_ms / TIME_FACTOR_SCALE_MS);
        0.7 * success_rate + 0.3 * time_factor
    }

    fn count(log: &VecDeque<LogEntry>, pred: impl Fn(&LogEntry) -> bool) -> usize {
        log.iter().filter(|e| pred(e)).count()
    }

    fn trim(&self, log: &mut VecDeque<LogEntry>) {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        while log.front().is_some_and(|e| e.timestamp < cutoff) {
            log.pop_front();
        }
        while log.len() > self.config.log_capacity {
            log.pop_front();
        }
    }
}

impl SuccessHistory for Learner {
    /// Observed success rate for the `(provider, platform, intent)` bucket,
    /// 0.5 until enough samples exist.
    fn success_rate(&self, provider: &ProviderId, platform: &str, intent: IntentClass) -> f64 {
        let log = self.log.read().unwrap_or_else(|e| e.into_inner());
        let bucket: Vec<&LogEntry> = log
            .iter()
            .filter(|e| e.provider == *provider && e.platform == platform && e.intent == intent)
            .collect();
        if bucket.len() < self.config.min_samples {
            return 0.5;
        }
        let successes = bucket.iter().filter(|e| e.success).count() as f64;
        successes / bucket.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;
    use crate::query::Query;

    fn outcome(provider: &str, tier: Tier, success: bool, latency_ms: f64) -> Outcome {
        let candidate = Candidate::new("button", 0.8, provider, tier).unwrap();
        let query = Query::new("login button", "p1", "login").unwrap();
        if success {
            Outcome::success(candidate, query, latency_ms)
        } else {
            Outcome::failure(candidate, query, latency_ms, "no match")
        }
    }

    mod gating {
        use super::*;

        #[test]
        fn test_weight_frozen_below_min_samples() {
            let learner = Learner::default();
            let weights = WeightTable::new();
            for _ in 0..MIN_SAMPLES - 1 {
                learner.record(&outcome("semantic", Tier::Fast, false, 20.0), &weights);
            }
            let w = weights.snapshot().provider_weight("semantic");
            assert!((w - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_weight_moves_at_min_samples() {
            let learner = Learner::default();
            let weights = WeightTable::new();
            for _ in 0..MIN_SAMPLES {
                learner.record(&outcome("semantic", Tier::Fast, false, 20.0), &weights);
            }
            assert!(weights.snapshot().provider_weight("semantic") < 1.0);
        }
    }

    mod convergence {
        use super::*;

        #[test]
        fn test_failures_drag_weight_down_slowly() {
            let learner = Learner::default();
            let weights = WeightTable::new();
            for _ in 0..50 {
                learner.record(&outcome("flaky", Tier::Fast, false, 20.0), &weights);
            }
            let w = weights.snapshot().provider_weight("flaky");
            // 41 effective updates at alpha 0.01; gradual, not collapsed.
            assert!(w < 1.0);
            assert!(w > 0.6);
        }

        #[test]
        fn test_mixed_outcomes_settle_between_bounds() {
            let learner = Learner::default();
            let weights = WeightTable::new();
            for i in 0..200 {
                learner.record(&outcome("mixed", Tier::Fast, i % 2 == 0, 20.0), &weights);
            }
            let w = weights.snapshot().provider_weight("mixed");
            assert!(w < 1.0);
            assert!(w > 0.5);
        }
    }

    mod tier_learning {
        use super::*;

        #[test]
        fn test_slow_tier_learns_lower_target_than_fast() {
            let weights = WeightTable::new();
            let learner = Learner::default();
            for _ in 0..100 {
                learner.record(&outcome("a", Tier::Instant, true, 5.0), &weights);
                learner.record(&outcome("b", Tier::Expensive, true, 9_000.0), &weights);
            }
            let snap = weights.snapshot();
            assert!(snap.tier_weight(Tier::Instant) > snap.tier_weight(Tier::Expensive));
        }

        #[test]
        fn test_tier_target_math() {
            // All successes at 2s average: 0.7 + 0.3*(1 - 0.2) = 0.94
            let entries: Vec<LogEntry> = (0..10)
                .map(|_| LogEntry::from(&outcome("a", Tier::Medium, true, 2_000.0)))
                .collect();
            let refs: Vec<&LogEntry> = entries.iter().collect();
            assert!((Learner::tier_target(&refs) - 0.94).abs() < 1e-9);
        }

        #[test]
        fn test_time_factor_floor() {
            // 60s average latency clamps the speed factor at 0.1.
            let entries: Vec<LogEntry> = (0..10)
                .map(|_| LogEntry::from(&outcome("a", Tier::Expensive, true, 60_000.0)))
                .collect();
            let refs: Vec<&LogEntry> = entries.iter().collect();
            assert!((Learner::tier_target(&refs) - 0.73).abs() < 1e-9);
        }
    }

    mod history {
        use super::*;

        #[test]
        fn test_unobserved_bucket_is_neutral() {
            let learner = Learner::default();
            let rate =
                learner.success_rate(&ProviderId::from("ghost"), "p1", IntentClass::Login);
            assert!((rate - 0.5).abs() < f64::EPSILON);
        }

        #[test]
        fn test_bucket_rate_reflects_log() {
            let learner = Learner::default();
            let weights = WeightTable::new();
            for i in 0..20 {
                learner.record(&outcome("semantic", Tier::Fast, i < 15, 20.0), &weights);
            }
            let rate =
                learner.success_rate(&ProviderId::from("semantic"), "p1", IntentClass::Login);
            assert!((rate - 0.75).abs() < f64::EPSILON);
        }
    }

    mod log_bounds {
        use super::*;

        #[test]
        fn test_capacity_trims_oldest() {
            let config = LearnerConfig {
                log_capacity: 10,
                ..LearnerConfig::default()
            };
            let learner = Learner::new(config);
            let weights = WeightTable::new();
            for _ in 0..25 {
                learner.record(&outcome("a", Tier::Fast, true, 5.0), &weights);
            }
            assert_eq!(learner.log_len(), 10);
        }
    }
}

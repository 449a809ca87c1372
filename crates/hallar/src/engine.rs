//! Tiered resolution engine.
//!
//! One `resolve` call walks a fixed phase order: cache, deterministic
//! patterns, then the provider tiers from cheapest to most expensive. Each
//! phase can end the walk early, so the common case (a warmed cache or a
//! confident instant-tier hit) never pays for the tail.
//!
//! ```text
//!  Query ──► cache ──► patterns ──► Instant ──► Fast ──► Medium ──► Expensive
//!              │                       │          │         │           │
//!              hit                 confident? confident? confident?  last resort
//!              │                       │          │         │           │
//!              ▼                       ▼          ▼         ▼           ▼
//!           Resolution ◄── verify ◄── fuse ◄──────┴─────────┴───────────┘
//! ```
//!
//! The engine never executes selectors against a live page. Callers try the
//! ranked candidates themselves and report what happened through
//! [`Engine::report_outcome`]; those reports feed the cache and the weight
//! learner.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{AdaptiveCache, CacheConfig};
use crate::candidate::{Candidate, Tier};
use crate::executor::ProviderExecutor;
use crate::fusion::{FusionConfig, FusionEngine};
use crate::learner::{Learner, LearnerConfig};
use crate::metrics::{EngineMetrics, Metrics};
use crate::outcome::Outcome;
use crate::patterns::PatternBank;
use crate::provider::ProviderRegistry;
use crate::query::Query;
use crate::result::HallarResult;
use crate::snapshot::HtmlSnapshot;
use crate::store::JsonStore;
use crate::verify::{Verifier, DEFAULT_VERIFICATION_PENALTY};
use crate::weights::WeightTable;

/// Default end-to-end resolve budget.
pub const DEFAULT_BUDGET_MS: u64 = 1000;

/// Confidence that ends the tier walk early.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Outcome reports between automatic state flushes.
pub const DEFAULT_FLUSH_EVERY: usize = 20;

/// Engine tuning knobs. All methods are chainable.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total wall-clock budget for one resolve.
    pub budget_ms: u64,
    /// Raw confidence at which later tiers are skipped.
    pub high_confidence_threshold: f64,
    /// Outcome reports between automatic flushes; 0 disables auto-flush.
    pub flush_every: usize,
    /// Fusion knobs.
    pub fusion: FusionConfig,
    /// Cache knobs.
    pub cache: CacheConfig,
    /// Learner knobs.
    pub learner: LearnerConfig,
    /// Confidence multiplier for unverifiable candidates.
    pub verification_penalty: f64,
    /// Directory for persisted weights and cache, `None` for in-memory only.
    pub store_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget_ms: DEFAULT_BUDGET_MS,
            high_confidence_threshold: HIGH_CONFIDENCE_THRESHOLD,
            flush_every: DEFAULT_FLUSH_EVERY,
            fusion: FusionConfig::default(),
            cache: CacheConfig::default(),
            learner: LearnerConfig::default(),
            verification_penalty: DEFAULT_VERIFICATION_PENALTY,
            store_dir: None,
        }
    }
}

impl EngineConfig {
    /// Set the total resolve budget.
    #[must_use]
    pub const fn with_budget_ms(mut self, budget_ms: u64) -> Self {
        self.budget_ms = budget_ms;
        self
    }

    /// Set the early-termination confidence threshold.
    #[must_use]
    pub const fn with_high_confidence_threshold(mut self, threshold: f64) -> Self {
        self.high_confidence_threshold = threshold;
        self
    }

    /// Enable persistence under `dir`.
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Set the auto-flush cadence; 0 disables auto-flush.
    #[must_use]
    pub const fn with_flush_every(mut self, every: usize) -> Self {
        self.flush_every = every;
        self
    }

    /// Replace the fusion knobs.
    #[must_use]
    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }

    /// Replace the cache knobs.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the learner knobs.
    #[must_use]
    pub fn with_learner(mut self, learner: LearnerConfig) -> Self {
        self.learner = learner;
        self
    }
}

/// The phases a resolve walked, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Served from the adaptive cache.
    Cache,
    /// Deterministic pattern bank.
    Patterns,
    /// A provider tier.
    Tier(Tier),
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Patterns => write!(f, "patterns"),
            Self::Tier(tier) => write!(f, "{tier}"),
        }
    }
}

/// The result of one resolve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Correlation id for logs and outcome reports.
    pub id: Uuid,
    /// Ranked candidates, best first.
    pub candidates: Vec<Candidate>,
    /// Phases walked, in order.
    pub phases: Vec<Phase>,
    /// End-to-end latency.
    pub elapsed_ms: f64,
    /// Whether the top candidate came straight from the cache.
    pub from_cache: bool,
}

impl Resolution {
    /// The best candidate, `None` when nothing matched.
    #[must_use]
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// Adaptive locator resolution engine.
///
/// Cheap to share behind an [`Arc`]; all interior state is synchronized.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    registry: ProviderRegistry,
    patterns: PatternBank,
    executor: ProviderExecutor,
    fusion: FusionEngine,
    verifier: Verifier,
    cache: AdaptiveCache,
    learner: Learner,
    weights: WeightTable,
    metrics: Arc<Metrics>,
    store: Option<JsonStore>,
    outcomes_since_flush: AtomicUsize,
}

impl Engine {
    /// Create an engine, loading persisted weights and cache when a store
    /// directory is configured. Missing or corrupt state cold-starts.
    #[must_use]
    pub fn new(registry: ProviderRegistry, config: EngineConfig) -> Self {
        let store = config.store_dir.as_ref().map(JsonStore::new);

        let weights = store
            .as_ref()
            .and_then(JsonStore::load_weights)
            .map_or_else(WeightTable::new, WeightTable::from_snapshot);
        let cache = store.as_ref().and_then(JsonStore::load_cache).map_or_else(
            || AdaptiveCache::new(config.cache.clone()),
            |entries| AdaptiveCache::from_entries(config.cache.clone(), entries),
        );

        let metrics = Arc::new(Metrics::new());
        Self {
            executor: ProviderExecutor::new(Arc::clone(&metrics)),
            fusion: FusionEngine::new(config.fusion.clone()),
            verifier: Verifier::new(config.verification_penalty),
            learner: Learner::new(config.learner.clone()),
            patterns: PatternBank::new(),
            weights,
            cache,
            metrics,
            store,
            outcomes_since_flush: AtomicUsize::new(0),
            registry,
            config,
        }
    }

    /// Create an engine with default configuration and no persistence.
    #[must_use]
    pub fn with_defaults(registry: ProviderRegistry) -> Self {
        Self::new(registry, EngineConfig::default())
    }

    /// Resolve a query into a ranked candidate list.
    ///
    /// # Errors
    ///
    /// Resolution itself never fails; provider errors and timeouts degrade
    /// to fewer candidates. The `Result` is reserved for query validation
    /// performed by [`Query`] construction upstream and keeps the signature
    /// stable as phases grow.
    pub async fn resolve(&self, query: &Query) -> HallarResult<Resolution> {
        let id = Uuid::new_v4();
        let started = Instant::now();
        let key = query.cache_key();
        let mut phases = vec![Phase::Cache];

        if let Some(candidate) = self.cache.get(&key) {
            self.metrics.record_cache_lookup(true);
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.metrics.record_resolution(elapsed_ms);
            debug!(%id, key, "served from cache");
            return Ok(Resolution {
                id,
                candidates: vec![candidate],
                phases,
                elapsed_ms,
                from_cache: true,
            });
        }
        self.metrics.record_cache_lookup(false);

        let mut pool = self.patterns.matches(query);
        phases.push(Phase::Patterns);

        if !self.is_confident(&pool) {
            self.run_tiers(query, started, &mut pool, &mut phases).await;
        }

        if let Some(document) = query.document() {
            let snapshot = HtmlSnapshot::parse(document);
            if snapshot.is_empty() {
                debug!(%id, "document yielded no elements; skipping verification");
            } else {
                pool = self.verifier.filter(pool, &snapshot);
            }
        }

        let candidates = self
            .fusion
            .fuse(pool, query, &self.weights.snapshot(), &self.learner);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_resolution(elapsed_ms);
        debug!(
            %id,
            intent = query.intent(),
            candidates = candidates.len(),
            elapsed_ms,
            "resolved"
        );
        Ok(Resolution {
            id,
            candidates,
            phases,
            elapsed_ms,
            from_cache: false,
        })
    }

    /// Report what happened when a candidate was actually executed.
    ///
    /// Successes warm the cache; every report feeds the learner. Flushes to
    /// the store happen every [`EngineConfig::flush_every`] reports; a
    /// failed flush logs a warning and the state stays in memory.
    pub fn report_outcome(&self, outcome: &Outcome) {
        let key = outcome.query.cache_key();
        if outcome.success {
            self.cache.record_success(&key, &outcome.candidate);
        } else {
            self.cache.record_failure(&key);
        }
        self.learner.record(outcome, &self.weights);

        if self.store.is_some() && self.config.flush_every > 0 {
            let pending = self.outcomes_since_flush.fetch_add(1, Ordering::Relaxed) + 1;
            if pending >= self.config.flush_every {
                self.outcomes_since_flush.store(0, Ordering::Relaxed);
                if let Err(error) = self.flush() {
                    warn!(%error, "state flush failed; keeping state in memory");
                }
            }
        }
    }

    /// Persist weights and cache now.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O or serialization error. A no-op without a
    /// configured store directory.
    pub fn flush(&self) -> HallarResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save_weights(&self.weights.snapshot())?;
        store.save_cache(&self.cache.entries())?;
        Ok(())
    }

    /// Export current metrics with a consistent weight view.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.export(self.weights.snapshot())
    }

    async fn run_tiers(
        &self,
        query: &Query,
        started: Instant,
        pool: &mut Vec<Candidate>,
        phases: &mut Vec<Phase>,
    ) {
        for tier in Tier::ALL {
            let providers = self.registry.tier(tier);
            if providers.is_empty() {
                continue;
            }
            // The expensive tier is a last resort, not a refinement.
            if tier == Tier::Expensive && !pool.is_empty() {
                debug!("skipping expensive tier, candidates already found");
                continue;
            }

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let remaining_ms = self.config.budget_ms.saturating_sub(elapsed_ms);
            if remaining_ms < tier.minimum_viable_ms() {
                debug!(
                    %tier,
                    remaining_ms,
                    "skipping tier, not enough budget left to be useful"
                );
                continue;
            }

            let timeout = Duration::from_millis(tier.default_timeout_ms().min(remaining_ms));
            let mut found = self.executor.execute(&providers, query, timeout).await;
            pool.append(&mut found);
            phases.push(Phase::Tier(tier));

            if self.is_confident(pool) {
                debug!(%tier, "confident result, skipping later tiers");
                break;
            }
        }
    }

    fn is_confident(&self, pool: &[Candidate]) -> bool {
        pool.iter()
            .any(|c| c.confidence() >= self.config.high_confidence_threshold)
    }
}

//! Hallar: Adaptive Locator Resolution for UI Automation
//!
//! Hallar (Spanish: "to find") turns a natural-language element description
//! into ranked, executable selector candidates. Independent strategy
//! providers generate candidates in parallel; confidence fusion blends their
//! estimates with learned weights; reported execution outcomes teach the
//! engine which providers, platforms, and tiers to trust.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      HALLAR Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────┐   ┌─────────┐   ┌───────────┐   ┌────────────────┐  │
//! │  │ Query  │──►│ Cache / │──►│ Providers │──►│ Verify + Fuse  │  │
//! │  │        │   │ Patterns│   │ (tiered)  │   │ (learned wts)  │  │
//! │  └────────┘   └─────────┘   └───────────┘   └────────┬───────┘  │
//! │       ▲                                              │          │
//! │       │              ┌─────────┐   ┌─────────┐       ▼          │
//! │       └──────────────│ Learner │◄──│ Outcome │◄── Resolution    │
//! │        (reweighting) └─────────┘   │ reports │                  │
//! │                                    └─────────┘                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hallar::{Engine, EngineConfig, MockProvider, Outcome, ProviderRegistry, Query, Tier};
//!
//! # async fn example() -> hallar::HallarResult<()> {
//! let registry = ProviderRegistry::new()
//!     .with(Arc::new(MockProvider::new("semantic", Tier::Fast).returning("#login", 0.9)));
//! let engine = Engine::new(registry, EngineConfig::default());
//!
//! let query = Query::new("click the login button", "web", "login")?;
//! let resolution = engine.resolve(&query).await?;
//!
//! if let Some(best) = resolution.best() {
//!     // ... execute best.selector() against the page, then report back:
//!     engine.report_outcome(&Outcome::success(best.clone(), query, 12.0));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod cache;
mod candidate;
mod engine;
mod executor;
mod fusion;
mod learner;
mod metrics;
pub mod mock;
mod outcome;
mod patterns;
mod provider;
mod query;
mod result;
mod snapshot;
mod store;
mod verify;
mod weights;

pub use cache::{AdaptiveCache, CacheConfig, CacheEntry, DEFAULT_TTL_DAYS, SERVE_THRESHOLD};
pub use candidate::{meta, Candidate, Ensemble, Tier};
pub use engine::{
    Engine, EngineConfig, Phase, Resolution, DEFAULT_BUDGET_MS, HIGH_CONFIDENCE_THRESHOLD,
};
pub use executor::ProviderExecutor;
pub use fusion::{FusionConfig, FusionEngine, NeutralHistory, SuccessHistory, FUSION_ID};
pub use learner::{Learner, LearnerConfig, DEFAULT_ALPHA, MIN_SAMPLES};
pub use metrics::{EngineMetrics, Metrics, ProviderStats};
pub use mock::MockProvider;
pub use outcome::Outcome;
pub use patterns::{PatternBank, PATTERN_BANK_ID};
pub use provider::{Provider, ProviderId, ProviderRegistry};
pub use query::{IntentClass, Query};
pub use result::{HallarError, HallarResult};
pub use snapshot::{DocumentSnapshot, HtmlSnapshot};
pub use store::JsonStore;
pub use verify::{Verdict, Verifier, DEFAULT_VERIFICATION_PENALTY};
pub use weights::{WeightSnapshot, WeightTable};

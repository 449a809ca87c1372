//! The strategy provider contract and registry.
//!
//! A provider is the pluggable unit of candidate generation: given a query,
//! it returns zero or more candidate locators with confidence estimates. The
//! engine never looks inside a provider; it only requires this contract plus
//! a declared cost tier. Providers must be side-effect-free with respect to
//! one another; the executor enforces the rest of the contract (deadline,
//! failure absorption).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, Tier};
use crate::query::Query;
use crate::result::HallarResult;

/// Stable identifier of a provider, used for provenance, weight-table keys,
/// and per-provider metrics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pluggable candidate generator.
///
/// Implementations may do anything internally (keyword dictionaries,
/// accessibility tables, OCR, model calls) as long as `generate` is free of
/// cross-provider side effects. Returning an error is allowed and absorbed
/// by the executor; it degrades coverage, never the request.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier for provenance and learning.
    fn id(&self) -> ProviderId;

    /// Declared cost class; decides which orchestration tier runs this
    /// provider.
    fn tier(&self) -> Tier;

    /// Rough cost estimate in milliseconds, used for diagnostics.
    fn cost_estimate_ms(&self) -> u64 {
        self.tier().default_timeout_ms()
    }

    /// Generate candidate locators for the query.
    async fn generate(&self, query: &Query) -> HallarResult<Vec<Candidate>>;
}

/// An ordered registry of providers, grouped by tier at execution time.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Registration order is preserved within a tier,
    /// which keeps resolution deterministic.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    /// All providers declaring the given tier, in registration order.
    #[must_use]
    pub fn tier(&self, tier: Tier) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|p| p.tier() == tier)
            .cloned()
            .collect()
    }

    /// All registered providers.
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.providers.iter().map(|p| p.id().to_string()).collect();
        f.debug_struct("ProviderRegistry")
            .field("providers", &ids)
            .finish()
    }
}

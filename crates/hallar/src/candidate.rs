//! Candidate locators: the unit of currency between providers, fusion, and
//! the caller.
//!
//! A [`Candidate`] pairs an opaque selector string with a confidence estimate
//! and provenance. The selector is never interpreted here beyond the special
//! `visual:click(x,y)` form recognized by the verifier; CSS, XPath, or any
//! other syntax is executed by the collaborating document driver.
//!
//! # Design Philosophy
//!
//! - **Validated at construction**: out-of-range confidence or an empty
//!   selector is an error, never silently clamped.
//! - **Immutable**: a reweighted candidate is a new value, not a mutation.
//! - **Ensembles are structured**: consensus/fallback-chain candidates carry
//!   their component candidates as data, not as an encoded selector string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::provider::ProviderId;
use crate::result::{HallarError, HallarResult};

/// Reserved metadata keys consumed by the fusion engine and verifier.
pub mod meta {
    /// Set to `true` by the verifier when the selector matched the snapshot.
    pub const VERIFIED: &str = "verified";
    /// Pre-fusion confidence, recorded when the fusion engine reweights.
    pub const ORIGINAL_CONFIDENCE: &str = "original_confidence";
    /// Matched keyword set, attached by the deterministic pattern bank.
    pub const KEYWORDS: &str = "keywords";
}

/// Expected cost class of producing (and executing) a candidate.
///
/// Orders provider execution and feeds the ranking bonus: cheaper candidates
/// win ties against expensive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Near-zero cost (pattern lookups, cached knowledge)
    Instant,
    /// Lightweight computation (attribute scans, web standards)
    Fast,
    /// Moderate computation (contextual analysis)
    Medium,
    /// Heavy machinery (model calls, screenshots); last resort
    Expensive,
}

impl Tier {
    /// All tiers in execution order, cheapest first.
    pub const ALL: [Self; 4] = [Self::Instant, Self::Fast, Self::Medium, Self::Expensive];

    /// Stable string form used in weight tables and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Expensive => "expensive",
        }
    }

    /// Ranking bonus: faster strategies get a slight edge, expensive ones a
    /// slight penalty.
    #[must_use]
    pub const fn rank_bonus(&self) -> f64 {
        match self {
            Self::Instant => 0.05,
            Self::Fast => 0.03,
            Self::Medium => 0.01,
            Self::Expensive => -0.02,
        }
    }

    /// Default per-provider deadline for this tier, in milliseconds.
    #[must_use]
    pub const fn default_timeout_ms(&self) -> u64 {
        match self {
            Self::Instant => 10,
            Self::Fast => 50,
            Self::Medium => 200,
            Self::Expensive => 500,
        }
    }

    /// Minimum remaining budget required to bother starting this tier.
    #[must_use]
    pub const fn minimum_viable_ms(&self) -> u64 {
        match self {
            Self::Instant => 1,
            Self::Fast => 10,
            Self::Medium => 50,
            Self::Expensive => 100,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Multi-try structure of a candidate.
///
/// Synthetic ensemble candidates let the caller opt into multi-try behavior
/// without re-implementing retry logic. The component candidates are carried
/// as data; the selector string of the synthetic candidate stays a plain,
/// executable selector (the top component's).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ensemble {
    /// A single selector, tried once.
    #[default]
    Simple,
    /// Try each component in order, accept the first that matches.
    Consensus(Vec<Candidate>),
    /// Ordered retry list over the components.
    FallbackChain(Vec<Candidate>),
}

impl Ensemble {
    /// Whether this is a synthetic multi-try candidate.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        !matches!(self, Self::Simple)
    }

    /// Component candidates, empty for [`Ensemble::Simple`].
    #[must_use]
    pub fn components(&self) -> &[Candidate] {
        match self {
            Self::Simple => &[],
            Self::Consensus(c) | Self::FallbackChain(c) => c,
        }
    }
}

/// A single proposed locator with confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    selector: String,
    confidence: f64,
    source: ProviderId,
    tier: Tier,
    reasoning: String,
    metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "is_simple")]
    ensemble: Ensemble,
}

fn is_simple(e: &Ensemble) -> bool {
    matches!(e, Ensemble::Simple)
}

impl Candidate {
    /// Create a candidate, validating the selector and confidence.
    ///
    /// # Errors
    ///
    /// Returns [`HallarError::InvalidCandidate`] when the selector is empty
    /// or whitespace, or when the confidence falls outside `[0, 1]`.
    pub fn new(
        selector: impl Into<String>,
        confidence: f64,
        source: impl Into<ProviderId>,
        tier: Tier,
    ) -> HallarResult<Self> {
        let selector = selector.into();
        if selector.trim().is_empty() {
            return Err(HallarError::InvalidCandidate {
                message: "selector must not be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
            return Err(HallarError::InvalidCandidate {
                message: format!("confidence {confidence} outside [0, 1]"),
            });
        }
        Ok(Self {
            selector,
            confidence,
            source: source.into(),
            tier,
            reasoning: String::new(),
            metadata: Map::new(),
            ensemble: Ensemble::Simple,
        })
    }

    /// Attach a human-readable justification. Diagnostic only, never parsed.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Attach a provider-specific metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Mark this candidate as an ensemble over component candidates.
    #[must_use]
    pub fn with_ensemble(mut self, ensemble: Ensemble) -> Self {
        self.ensemble = ensemble;
        self
    }

    /// The opaque selector string (or `visual:click(x,y)`).
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Estimated reliability in `[0, 1]`.
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    /// The provider that produced this candidate.
    #[must_use]
    pub const fn source(&self) -> &ProviderId {
        &self.source
    }

    /// Expected cost class.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Human-readable justification.
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Provider-specific annotations.
    #[must_use]
    pub const fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Multi-try structure, [`Ensemble::Simple`] for ordinary candidates.
    #[must_use]
    pub const fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Whether the `visual:click(x,y)` coordinate form is used.
    #[must_use]
    pub fn is_visual(&self) -> bool {
        self.selector.starts_with("visual:")
    }

    /// Whether the verifier confirmed this selector against a snapshot.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.metadata
            .get(meta::VERIFIED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// A copy of this candidate with a new confidence, preserving the
    /// pre-adjustment value under [`meta::ORIGINAL_CONFIDENCE`].
    ///
    /// The new confidence must already be in range; fusion clamps before
    /// calling this.
    #[must_use]
    pub(crate) fn reweighted(&self, confidence: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&confidence));
        let mut next = self.clone();
        if !next.metadata.contains_key(meta::ORIGINAL_CONFIDENCE) {
            next.metadata.insert(
                meta::ORIGINAL_CONFIDENCE.to_string(),
                Value::from(self.confidence),
            );
        }
        next.confidence = confidence;
        next
    }
}

//! Mock provider for testing resolution pipelines.
//!
//! Downstream crates (and this crate's own tests) need providers with fully
//! scripted behavior: canned candidates, artificial latency, forced failure.
//! `MockProvider` covers all three without touching a real document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::candidate::{Candidate, Tier};
use crate::provider::{Provider, ProviderId};
use crate::query::Query;
use crate::result::{HallarError, HallarResult};

/// A provider with scripted behavior.
#[derive(Debug)]
pub struct MockProvider {
    id: ProviderId,
    tier: Tier,
    candidates: Vec<Candidate>,
    delay: Option<Duration>,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a mock that returns no candidates.
    #[must_use]
    pub fn new(id: impl Into<ProviderId>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            tier,
            candidates: Vec::new(),
            delay: None,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the candidates every `generate` call returns.
    #[must_use]
    pub fn with_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Convenience: script a single candidate with this selector/confidence.
    ///
    /// # Panics
    ///
    /// Panics when the candidate would be invalid; mocks are test plumbing.
    #[must_use]
    pub fn returning(self, selector: &str, confidence: f64) -> Self {
        let tier = self.tier;
        let id = self.id.clone();
        let candidate = Candidate::new(selector, confidence, id, tier)
            .expect("mock candidate must be valid");
        self.with_candidates(vec![candidate])
    }

    /// Sleep for this long before answering. Combine with a short executor
    /// timeout to script a provider timeout.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every `generate` call with this message.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// How many times `generate` has been called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn tier(&self) -> Tier {
        self.tier
    }

    async fn generate(&self, _query: &Query) -> HallarResult<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(HallarError::ProviderFailure {
                provider: self.id.to_string(),
                message: message.clone(),
            });
        }
        Ok(self.candidates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> Query {
        Query::new("login button", "p1", "login").unwrap()
    }

    #[tokio::test]
    async fn test_returning_yields_candidate() {
        let p = MockProvider::new("a", Tier::Fast).returning("button", 0.8);
        let out = p.generate(&query()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].selector(), "button");
        assert_eq!(p.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_returns_provider_failure() {
        let p = MockProvider::new("a", Tier::Fast).failing("boom");
        let err = p.generate(&query()).await.unwrap_err();
        assert!(matches!(err, HallarError::ProviderFailure { .. }));
    }
}

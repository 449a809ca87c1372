//! Execution outcomes reported back by the caller.
//!
//! The engine never executes a selector against a live page itself; the
//! caller does, then reports what happened. Outcomes drive the adaptive
//! cache and the weight learner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::query::Query;

/// The result of actually trying a [`Candidate`] against a live document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// The candidate that was executed.
    pub candidate: Candidate,
    /// The query that produced it.
    pub query: Query,
    /// Whether the selector matched and the action succeeded.
    pub success: bool,
    /// Wall-clock execution latency.
    pub latency_ms: f64,
    /// Error detail for failures, if the caller captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the execution happened.
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    /// Record a successful execution, stamped now.
    #[must_use]
    pub fn success(candidate: Candidate, query: Query, latency_ms: f64) -> Self {
        Self {
            candidate,
            query,
            success: true,
            latency_ms,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed execution, stamped now.
    #[must_use]
    pub fn failure(
        candidate: Candidate,
        query: Query,
        latency_ms: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            candidate,
            query,
            success: false,
            latency_ms,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Tier;

    fn candidate() -> Candidate {
        Candidate::new("button", 0.8, "semantic", Tier::Fast).unwrap()
    }

    fn query() -> Query {
        Query::new("login button", "p1", "login").unwrap()
    }

    #[test]
    fn test_success_has_no_error() {
        let o = Outcome::success(candidate(), query(), 12.5);
        assert!(o.success);
        assert!(o.error.is_none());
    }

    #[test]
    fn test_failure_carries_error() {
        let o = Outcome::failure(candidate(), query(), 40.0, "element detached");
        assert!(!o.success);
        assert_eq!(o.error.as_deref(), Some("element detached"));
    }
}

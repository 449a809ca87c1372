//! Parallel provider execution with bulkhead isolation.
//!
//! All providers in a tier run concurrently under one shared deadline. Each
//! call runs in its own spawned task so that a failure, a timeout, or even a
//! panic in one provider yields an empty result for that provider only;
//! partial failure degrades coverage, never the request. Latency and candidate
//! counts are recorded per provider for monitoring and the weight learner.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::warn;

use crate::candidate::Candidate;
use crate::metrics::Metrics;
use crate::provider::Provider;
use crate::query::Query;

/// Runs sets of providers concurrently with per-provider isolation.
#[derive(Debug, Clone)]
pub struct ProviderExecutor {
    metrics: Arc<Metrics>,
}

impl ProviderExecutor {
    /// Create an executor reporting into the shared metrics accumulator.
    #[must_use]
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Run all providers concurrently, each bounded by `per_provider_timeout`.
    ///
    /// Results are flattened and sorted deterministically: confidence
    /// descending, then provider id, then selector. The sort keeps
    /// resolution idempotent regardless of task completion order.
    pub async fn execute(
        &self,
        providers: &[Arc<dyn Provider>],
        query: &Query,
        per_provider_timeout: Duration,
    ) -> Vec<Candidate> {
        if providers.is_empty() {
            return Vec::new();
        }

        let tasks: Vec<_> = providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let metrics = Arc::clone(&self.metrics);
                let query = query.clone();
                tokio::spawn(async move {
                    let id = provider.id();
                    let started = Instant::now();
                    let outcome =
                        tokio::time::timeout(per_provider_timeout, provider.generate(&query))
                            .await;
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    match outcome {
                        Ok(Ok(candidates)) => {
                            metrics.record_provider_call(&id, elapsed_ms, candidates.len());
                            candidates
                        }
                        Ok(Err(error)) => {
                            warn!(provider = %id, %error, "provider failed; dropping its output");
                            metrics.record_provider_failure(&id, elapsed_ms);
                            Vec::new()
                        }
                        Err(_) => {
                            warn!(
                                provider = %id,
                                timeout_ms = per_provider_timeout.as_millis() as u64,
                                "provider timed out; abandoning its output"
                            );
                            metrics.record_provider_timeout(
                                &id,
                                per_provider_timeout.as_secs_f64() * 1000.0,
                            );
                            Vec::new()
                        }
                    }
                })
            })
            .collect();

        let mut candidates: Vec<Candidate> = Vec::new();
        for (task, provider) in join_all(tasks).await.into_iter().zip(providers) {
            match task {
                Ok(mut found) => candidates.append(&mut found),
                // A panicked task aborts only its own provider.
                Err(error) => {
                    let id = provider.id();
                    warn!(provider = %id, %error, "provider panicked; dropping its output");
                    self.metrics.record_provider_failure(&id, 0.0);
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| a.source().cmp(b.source()))
                .then_with(|| a.selector().cmp(b.selector()))
        });
        candidates
    }
}

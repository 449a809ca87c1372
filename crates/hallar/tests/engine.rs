//! End-to-end resolution tests.
//!
//! These exercise the full pipeline: pattern bank, tiered provider
//! execution, snapshot verification, fusion, and the outcome feedback loop.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use hallar::{
    Engine, EngineConfig, MockProvider, Outcome, Phase, ProviderRegistry, Query, Tier,
};

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

const LOGIN_PAGE: &str = r#"
    <html>
      <body>
        <form id="login-form" class="auth">
          <input type="email" name="username" placeholder="Email">
          <input type="password" name="password">
          <button type="submit" class="primary">Login</button>
        </form>
      </body>
    </html>
"#;

fn login_query() -> Query {
    init_tracing();
    Query::new("click the login button", "web", "login")
        .unwrap()
        .with_document(LOGIN_PAGE)
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[tokio::test]
async fn test_login_scenario_end_to_end() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(
            MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.92),
        ))
        .with(Arc::new(
            MockProvider::new("text", Tier::Fast).returning("button:has-text('Login')", 0.85),
        ));
    let engine = Engine::with_defaults(registry);

    let resolution = engine.resolve(&login_query()).await.unwrap();

    // Both provider selectors survive verification against the document.
    let selectors: Vec<&str> = resolution
        .candidates
        .iter()
        .map(hallar::Candidate::selector)
        .collect();
    assert!(selectors.contains(&"button[type=submit]"));
    assert!(selectors.contains(&"button:has-text('Login')"));
    assert_eq!(resolution.best().unwrap().selector(), "button[type=submit]");
    assert!(resolution.best().unwrap().is_verified());
}

#[tokio::test]
async fn test_confident_fast_tier_skips_slower_tiers() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(
            MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.92),
        ))
        .with(Arc::new(
            MockProvider::new("heavy", Tier::Medium).returning(".candidate", 0.6),
        ));
    let engine = Engine::with_defaults(registry);

    let resolution = engine.resolve(&login_query()).await.unwrap();
    assert_eq!(
        resolution.phases,
        vec![Phase::Cache, Phase::Patterns, Phase::Tier(Tier::Fast)]
    );
}

#[tokio::test]
async fn test_ruled_out_selector_dropped_by_verification() {
    let registry = ProviderRegistry::new().with(Arc::new(
        MockProvider::new("stale", Tier::Fast).returning("#checkout-button", 0.9),
    ));
    let engine = Engine::with_defaults(registry);

    let resolution = engine.resolve(&login_query()).await.unwrap();
    assert!(resolution
        .candidates
        .iter()
        .all(|c| c.selector() != "#checkout-button"));
}

// ============================================================================
// Bulkhead Isolation
// ============================================================================

#[tokio::test]
async fn test_failing_provider_does_not_poison_resolution() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(
            MockProvider::new("broken", Tier::Fast).failing("model endpoint unreachable"),
        ))
        .with(Arc::new(
            MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.9),
        ));
    let engine = Engine::with_defaults(registry);

    let resolution = engine.resolve(&login_query()).await.unwrap();
    assert_eq!(resolution.best().unwrap().selector(), "button[type=submit]");

    let metrics = engine.metrics();
    assert_eq!(metrics.providers["broken"].failures, 1);
    assert_eq!(metrics.providers["semantic"].failures, 0);
}

#[tokio::test]
async fn test_hung_provider_times_out_without_blocking() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(
            MockProvider::new("hung", Tier::Instant)
                .returning("#never", 0.99)
                .with_delay(Duration::from_millis(500)),
        ))
        .with(Arc::new(
            MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.9),
        ));
    let engine = Engine::with_defaults(registry);

    let resolution = engine.resolve(&login_query()).await.unwrap();
    assert!(resolution
        .candidates
        .iter()
        .all(|c| c.selector() != "#never"));
    assert_eq!(engine.metrics().providers["hung"].timeouts, 1);
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn test_resolution_is_idempotent_without_feedback() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(
            MockProvider::new("a", Tier::Fast).returning("button[type=submit]", 0.7),
        ))
        .with(Arc::new(
            MockProvider::new("b", Tier::Fast).returning("input[type=submit]", 0.7),
        ));
    let engine = Engine::with_defaults(registry);

    let first = engine.resolve(&login_query()).await.unwrap();
    let second = engine.resolve(&login_query()).await.unwrap();
    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.phases, second.phases);
}

// ============================================================================
// Cache Gating
// ============================================================================

#[tokio::test]
async fn test_degraded_selector_is_benched() {
    let registry = ProviderRegistry::new().with(Arc::new(
        MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.9),
    ));
    let engine = Engine::with_defaults(registry);
    let query = login_query();

    let best = engine
        .resolve(&query)
        .await
        .unwrap()
        .best()
        .unwrap()
        .clone();
    engine.report_outcome(&Outcome::success(best.clone(), query.clone(), 10.0));
    engine.report_outcome(&Outcome::success(best.clone(), query.clone(), 10.0));
    engine.report_outcome(&Outcome::failure(best, query.clone(), 40.0, "detached"));

    // 2/3 success rate does not clear the serve gate.
    let resolution = engine.resolve(&query).await.unwrap();
    assert!(!resolution.from_cache);
}

#[tokio::test]
async fn test_reliable_selector_is_served_from_cache() {
    let registry = ProviderRegistry::new().with(Arc::new(
        MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.9),
    ));
    let engine = Engine::with_defaults(registry);
    let query = login_query();

    let best = engine
        .resolve(&query)
        .await
        .unwrap()
        .best()
        .unwrap()
        .clone();
    for _ in 0..7 {
        engine.report_outcome(&Outcome::success(best.clone(), query.clone(), 10.0));
    }
    engine.report_outcome(&Outcome::failure(best.clone(), query.clone(), 40.0, "flake"));

    // 7/8 clears the gate.
    let resolution = engine.resolve(&query).await.unwrap();
    assert!(resolution.from_cache);
    assert_eq!(resolution.best().unwrap().selector(), best.selector());
}

#[tokio::test]
async fn test_different_intents_cache_independently() {
    let registry = ProviderRegistry::new().with(Arc::new(
        MockProvider::new("semantic", Tier::Fast).returning("button[type=submit]", 0.9),
    ));
    let engine = Engine::with_defaults(registry);
    let login = login_query();
    let search = Query::new("search for shoes", "web", "catalog").unwrap();

    let best = engine
        .resolve(&login)
        .await
        .unwrap()
        .best()
        .unwrap()
        .clone();
    engine.report_outcome(&Outcome::success(best, login.clone(), 10.0));

    assert!(engine.resolve(&login).await.unwrap().from_cache);
    assert!(!engine.resolve(&search).await.unwrap().from_cache);
}

// ============================================================================
// Learning Feedback
// ============================================================================

#[tokio::test]
async fn test_outcomes_shift_provider_ranking() {
    let registry = ProviderRegistry::new()
        .with(Arc::new(
            MockProvider::new("reliable", Tier::Fast).returning("button[type=submit]", 0.8),
        ))
        .with(Arc::new(
            MockProvider::new("flaky", Tier::Fast).returning("input[type=submit]", 0.8),
        ));
    // Disable early termination so both providers always run.
    let engine = Engine::new(
        registry,
        EngineConfig::default().with_high_confidence_threshold(1.0),
    );
    let query = login_query();

    let initial = engine.resolve(&query).await.unwrap();
    let good = initial
        .candidates
        .iter()
        .find(|c| c.source().as_str() == "reliable")
        .unwrap()
        .clone();
    let bad = initial
        .candidates
        .iter()
        .find(|c| c.source().as_str() == "flaky")
        .unwrap()
        .clone();

    for _ in 0..50 {
        engine.report_outcome(&Outcome::success(good.clone(), query.clone(), 10.0));
        engine.report_outcome(&Outcome::failure(bad.clone(), query.clone(), 10.0, "miss"));
    }

    let learned = engine.resolve(&query).await.unwrap();
    let first_real = learned
        .candidates
        .iter()
        .find(|c| !c.ensemble().is_synthetic() && c.source().as_str() != "pattern_bank")
        .unwrap();
    assert_eq!(first_real.source().as_str(), "reliable");

    let weights = engine.metrics().weights;
    assert!(weights.provider_weight("flaky") < weights.provider_weight("reliable"));
}

//! Confidence fusion: reweighting, ranking, deduplication, and ensemble
//! synthesis over candidates from independent providers.
//!
//! Fusion is the only reader of the learned weight table. Every adjustment
//! produces new candidate values; inputs are never mutated.
//!
//! # Scoring
//!
//! Reweighted confidence is a convex blend of learned weights applied to the
//! provider's own estimate:
//!
//! ```text
//! confidence × (0.3·provider + 0.2·platform + 0.2·intent + 0.1·tier + 0.2·history)
//! ```
//!
//! clamped to `[0.01, 0.99]`. Ranking then orders by a composite score:
//!
//! ```text
//! 0.7·confidence + tier_bonus + 0.1·diversity + 0.2·context_relevance
//! ```
//!
//! where the diversity bonus rewards a source provider not yet represented
//! above; five near-duplicate candidates from one provider should not crowd
//! out independent evidence.

use std::collections::HashMap;

use serde_json::Value;

use crate::candidate::{meta, Candidate, Ensemble, Tier};
use crate::provider::ProviderId;
use crate::query::{IntentClass, Query};
use crate::weights::WeightSnapshot;

/// Provider id attached to synthetic ensemble candidates.
pub const FUSION_ID: &str = "fusion";

/// Bonus granted when a candidate's source is not yet represented higher in
/// the ranking.
const DIVERSITY_BONUS: f64 = 0.05;

/// Historical success rates per `(provider, platform, intent-class)` bucket.
///
/// Implemented by the outcome log; tests substitute fixed-rate stubs.
pub trait SuccessHistory {
    /// Observed success rate for the bucket, 0.5 when unobserved.
    fn success_rate(&self, provider: &ProviderId, platform: &str, intent: IntentClass) -> f64;
}

/// History stub that has observed nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralHistory;

impl SuccessHistory for NeutralHistory {
    fn success_rate(&self, _: &ProviderId, _: &str, _: IntentClass) -> f64 {
        0.5
    }
}

/// Fusion tuning knobs.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Cap on the returned ranked list.
    pub max_candidates: usize,
    /// Confidence floor for a candidate to join an ensemble.
    pub ensemble_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            ensemble_threshold: 0.8,
        }
    }
}

/// Reweights, ranks, deduplicates, and synthesizes ensembles.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    /// Create a fusion engine.
    #[must_use]
    pub const fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Produce the final ranked candidate list.
    #[must_use]
    pub fn fuse(
        &self,
        candidates: Vec<Candidate>,
        query: &Query,
        weights: &WeightSnapshot,
        history: &dyn SuccessHistory,
    ) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }

        let reweighted: Vec<Candidate> = candidates
            .into_iter()
            .map(|c| {
                let adjusted = Self::blend(&c, query, weights, history);
                c.reweighted(adjusted)
            })
            .collect();

        let mut scored = self.rank(reweighted, query);
        Self::dedupe(&mut scored);
        self.synthesize(&mut scored, query);

        scored.sort_by(|a, b| Self::order(a, b));
        scored.truncate(self.config.max_candidates);
        scored.into_iter().map(|(_, c)| c).collect()
    }

    fn blend(
        candidate: &Candidate,
        query: &Query,
        weights: &WeightSnapshot,
        history: &dyn SuccessHistory,
    ) -> f64 {
        let intent = query.intent_class();
        let provider_w = weights.provider_weight(candidate.source().as_str());
        let platform_w = weights.platform_weight(query.platform());
        let intent_w = weights.intent_weight(intent);
        let tier_w = weights.tier_weight(candidate.tier());
        let historical = history.success_rate(candidate.source(), query.platform(), intent);

        let factor = 0.3 * provider_w
            + 0.2 * platform_w
            + 0.2 * intent_w
            + 0.1 * tier_w
            + 0.2 * historical;
        (candidate.confidence() * factor).clamp(0.01, 0.99)
    }

    /// Composite-score the list. The diversity bonus looks at sources ranked
    /// earlier in the confidence order, making the pass deterministic.
    fn rank(&self, candidates: Vec<Candidate>, query: &Query) -> Vec<(f64, Candidate)> {
        let mut by_confidence = candidates;
        by_confidence.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| a.source().cmp(b.source()))
                .then_with(|| a.selector().cmp(b.selector()))
        });

        let mut seen_sources: Vec<ProviderId> = Vec::new();
        let mut scored = Vec::with_capacity(by_confidence.len());
        for candidate in by_confidence {
            let diversity = if seen_sources.contains(candidate.source()) {
                0.0
            } else {
                DIVERSITY_BONUS
            };
            seen_sources.push(candidate.source().clone());
            let score = Self::composite(&candidate, query, diversity);
            scored.push((score, candidate));
        }
        scored
    }

    fn composite(candidate: &Candidate, query: &Query, diversity: f64) -> f64 {
        0.7 * candidate.confidence()
            + candidate.tier().rank_bonus()
            + 0.1 * diversity
            + 0.2 * Self::context_relevance(candidate, query)
    }

    fn context_relevance(candidate: &Candidate, query: &Query) -> f64 {
        let mut score = 0.0;
        let intent = query.intent().to_lowercase();
        if let Some(Value::Array(keywords)) = candidate.metadata().get(meta::KEYWORDS) {
            if keywords
                .iter()
                .filter_map(Value::as_str)
                .any(|k| intent.contains(k))
            {
                score += 0.1;
            }
        }
        if candidate
            .reasoning()
            .to_lowercase()
            .contains(query.intent_class().as_str())
        {
            score += 0.1;
        }
        if candidate.is_verified() {
            score += 0.1;
        }
        f64::min(score, 1.0)
    }

    /// Merge identical selector strings, keeping the highest confidence (and
    /// its score) at the earliest position among the duplicates.
    fn dedupe(scored: &mut Vec<(f64, Candidate)>) {
        let mut best: HashMap<String, usize> = HashMap::new();
        let mut keep: Vec<(f64, Candidate)> = Vec::with_capacity(scored.len());
        for (score, candidate) in scored.drain(..) {
            match best.get(candidate.selector()) {
                None => {
                    best.insert(candidate.selector().to_string(), keep.len());
                    keep.push((score, candidate));
                }
                Some(&i) => {
                    if candidate.confidence() > keep[i].1.confidence() {
                        keep[i] = (score.max(keep[i].0), candidate);
                    }
                }
            }
        }
        *scored = keep;
    }

    /// When several independent candidates are strong, add consensus and
    /// fallback-chain pseudo-candidates so the caller can opt into multi-try
    /// behavior.
    fn synthesize(&self, scored: &mut Vec<(f64, Candidate)>, query: &Query) {
        let strong: Vec<Candidate> = scored
            .iter()
            .filter(|(_, c)| c.confidence() >= self.config.ensemble_threshold)
            .map(|(_, c)| c.clone())
            .take(3)
            .collect();
        if strong.len() < 2 {
            return;
        }

        let max_confidence = strong
            .iter()
            .map(Candidate::confidence)
            .fold(f64::MIN, f64::max);
        let lead_selector = strong[0].selector().to_string();

        let consensus = Candidate::new(
            lead_selector.clone(),
            f64::min(0.95, max_confidence + 0.05),
            FUSION_ID,
            Tier::Fast,
        )
        .map(|c| {
            c.with_reasoning("consensus of high-confidence candidates")
                .with_ensemble(Ensemble::Consensus(strong.clone()))
        });
        let fallback =
            Candidate::new(lead_selector, max_confidence, FUSION_ID, Tier::Medium).map(|c| {
                c.with_reasoning("ordered fallback chain of high-confidence candidates")
                    .with_ensemble(Ensemble::FallbackChain(strong))
            });

        for synthetic in [consensus, fallback].into_iter().flatten() {
            let score = Self::composite(&synthetic, query, 0.0);
            scored.push((score, synthetic));
        }
    }

    fn order(a: &(f64, Candidate), b: &(f64, Candidate)) -> std::cmp::Ordering {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.confidence().total_cmp(&a.1.confidence()))
            .then_with(|| a.1.source().cmp(b.1.source()))
            .then_with(|| a.1.selector().cmp(b.1.selector()))
    }
}

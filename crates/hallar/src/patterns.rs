//! Deterministic pattern bank: universal keyword-to-selector rules.
//!
//! The first orchestration phase is a pure data lookup, not a provider call.
//! These rules rest on web standards only (semantic HTML, ARIA) and carry no
//! application-specific knowledge, so they are safe to try against any page
//! at near-zero cost.

use serde_json::Value;

use crate::candidate::{meta, Candidate, Tier};
use crate::provider::ProviderId;
use crate::query::Query;

/// Provider id attached to pattern-bank candidates for provenance/learning.
pub const PATTERN_BANK_ID: &str = "pattern_bank";

/// How many patterns and selectors-per-pattern a single lookup emits.
const MAX_PATTERNS: usize = 5;
const MAX_SELECTORS_PER_PATTERN: usize = 3;

#[derive(Debug)]
struct Pattern {
    keywords: &'static [&'static str],
    selectors: &'static [&'static str],
    confidence: f64,
}

/// Built-in rule table keyed by normalized intent substrings.
#[derive(Debug)]
pub struct PatternBank {
    patterns: Vec<Pattern>,
}

impl Default for PatternBank {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternBank {
    /// The built-in universal rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: vec![
                // Authentication
                Pattern {
                    keywords: &["login", "sign in", "log in", "signin"],
                    selectors: &[
                        "button[type='submit']",
                        "input[type='submit']",
                        "button:has-text('Log')",
                        "button:has-text('Sign')",
                        "*[aria-label*='log' i]",
                    ],
                    confidence: 0.85,
                },
                Pattern {
                    keywords: &["username", "user", "email"],
                    selectors: &[
                        "input[type='email']",
                        "input[name*='user' i]",
                        "input[name*='email' i]",
                        "input[placeholder*='email' i]",
                    ],
                    confidence: 0.90,
                },
                Pattern {
                    keywords: &["password", "pwd", "pass"],
                    selectors: &[
                        "input[type='password']",
                        "*[role='textbox'][aria-label*='password' i]",
                    ],
                    confidence: 0.95,
                },
                // Actions
                Pattern {
                    keywords: &["save", "submit", "send", "apply"],
                    selectors: &[
                        "button[type='submit']",
                        "input[type='submit']",
                        "*[aria-label*='save' i]",
                        "button:has-text('Save')",
                    ],
                    confidence: 0.80,
                },
                Pattern {
                    keywords: &["cancel", "close", "abort", "back"],
                    selectors: &[
                        "*[aria-label*='cancel' i]",
                        "*[aria-label*='close' i]",
                        "button:has-text('Cancel')",
                    ],
                    confidence: 0.75,
                },
                Pattern {
                    keywords: &["continue", "next", "proceed", "forward"],
                    selectors: &[
                        "*[aria-label*='continue' i]",
                        "button:has-text('Continue')",
                        "button:has-text('Next')",
                        "button[type='submit']",
                    ],
                    confidence: 0.75,
                },
                // Search
                Pattern {
                    keywords: &["search", "find", "query", "filter"],
                    selectors: &[
                        "input[type='search']",
                        "*[role='searchbox']",
                        "input[placeholder*='search' i]",
                        "*[aria-label*='search' i]",
                    ],
                    confidence: 0.85,
                },
                // Navigation
                Pattern {
                    keywords: &["menu", "nav", "navigation", "burger"],
                    selectors: &[
                        "nav",
                        "*[role='navigation']",
                        "*[role='menu']",
                        "button[aria-label*='menu' i]",
                    ],
                    confidence: 0.80,
                },
                Pattern {
                    keywords: &["home", "dashboard", "main"],
                    selectors: &[
                        "a[href*='home' i]",
                        "*[aria-label*='home' i]",
                        "a:has-text('Home')",
                    ],
                    confidence: 0.75,
                },
                // Forms
                Pattern {
                    keywords: &["input", "field", "textbox", "text"],
                    selectors: &[
                        "input[type='text']",
                        "*[role='textbox']",
                        "textarea",
                    ],
                    confidence: 0.70,
                },
                Pattern {
                    keywords: &["dropdown", "select", "choose", "pick"],
                    selectors: &[
                        "select",
                        "*[role='combobox']",
                        "*[role='listbox']",
                    ],
                    confidence: 0.75,
                },
            ],
        }
    }

    /// Candidates for every pattern whose keywords appear in the intent.
    ///
    /// Confidence scales with the fraction of the pattern's keywords the
    /// intent mentions, so a one-word graze ranks below a full match.
    #[must_use]
    pub fn matches(&self, query: &Query) -> Vec<Candidate> {
        let intent = query.intent().to_lowercase();
        let source = ProviderId::new(PATTERN_BANK_ID);

        let mut scored: Vec<(f64, &Pattern, Vec<&str>)> = self
            .patterns
            .iter()
            .filter_map(|pattern| {
                let hits: Vec<&str> = pattern
                    .keywords
                    .iter()
                    .filter(|k| intent.contains(**k))
                    .copied()
                    .collect();
                if hits.is_empty() {
                    return None;
                }
                let match_score = hits.len() as f64 / pattern.keywords.len() as f64;
                Some((pattern.confidence * match_score, pattern, hits))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut candidates = Vec::new();
        for (confidence, pattern, hits) in scored.into_iter().take(MAX_PATTERNS) {
            let keywords = Value::from(
                hits.iter()
                    .map(|k| Value::from(*k))
                    .collect::<Vec<Value>>(),
            );
            for selector in pattern.selectors.iter().take(MAX_SELECTORS_PER_PATTERN) {
                // Constructor inputs are static table data; construction
                // cannot fail, but the validating path is kept anyway.
                if let Ok(candidate) =
                    Candidate::new(*selector, confidence, source.clone(), Tier::Instant)
                {
                    candidates.push(
                        candidate
                            .with_reasoning("universal pattern match")
                            .with_metadata(meta::KEYWORDS, keywords.clone()),
                    );
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(intent: &str) -> Query {
        Query::new(intent, "p1", "login").unwrap()
    }

    #[test]
    fn test_login_intent_matches() {
        let bank = PatternBank::new();
        let out = bank.matches(&query("click the login button"));
        assert!(!out.is_empty());
        assert!(out.iter().any(|c| c.selector() == "button[type='submit']"));
        assert!(out.iter().all(|c| c.tier() == Tier::Instant));
        assert!(out.iter().all(|c| c.source().as_str() == PATTERN_BANK_ID));
    }

    #[test]
    fn test_password_full_keyword_strength() {
        let bank = PatternBank::new();
        let out = bank.matches(&query("password"));
        let best = out
            .iter()
            .map(Candidate::confidence)
            .fold(f64::MIN, f64::max);
        // "password" hits both "password" and its substring keyword "pass":
        // two of three keywords.
        assert!((best - 0.95 * 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_match_scales_confidence() {
        let bank = PatternBank::new();
        let one = bank.matches(&query("login"));
        let two = bank.matches(&query("login signin"));
        let max = |v: &[Candidate]| v.iter().map(Candidate::confidence).fold(f64::MIN, f64::max);
        assert!(max(&two) > max(&one));
    }

    #[test]
    fn test_unrelated_intent_matches_nothing() {
        let bank = PatternBank::new();
        assert!(bank.matches(&query("zarbulon flux capacitor")).is_empty());
    }

    #[test]
    fn test_selector_cap_per_pattern() {
        let bank = PatternBank::new();
        let out = bank.matches(&query("username"));
        let from_username: Vec<_> = out
            .iter()
            .filter(|c| c.selector().contains("user") || c.selector().contains("email"))
            .collect();
        assert!(from_username.len() <= MAX_SELECTORS_PER_PATTERN);
    }

    #[test]
    fn test_deterministic_output() {
        let bank = PatternBank::new();
        let a = bank.matches(&query("login button"));
        let b = bank.matches(&query("login button"));
        assert_eq!(a, b);
    }
}

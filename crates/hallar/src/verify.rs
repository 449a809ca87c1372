//! Advisory structural verification of candidates against a snapshot.
//!
//! Verification answers "would this selector plausibly match at least one
//! node", not "will the live click succeed"; the authoritative check is the
//! execution outcome the caller reports later. A false negative here
//! (rejecting a selector that would have worked live) is worse than a false
//! positive, so anything the snapshot boundary cannot decide is kept with a
//! confidence penalty instead of dropped.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::candidate::{meta, Candidate};
use crate::snapshot::DocumentSnapshot;

/// Default multiplier applied to candidates the verifier cannot decide.
pub const DEFAULT_VERIFICATION_PENALTY: f64 = 0.7;

/// What the verifier concluded about one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The selector plausibly matches at least one node.
    Matched,
    /// The snapshot positively rules the selector out.
    Unmatched,
    /// The snapshot boundary cannot decide (visual form, XPath, parser
    /// limitation). Advisory penalty applies.
    Inconclusive,
}

fn attr_selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?x)
            ^\s*
            ([a-zA-Z][a-zA-Z0-9-]*|\*)?          # optional tag or universal
            \[\s*
            ([a-zA-Z_:][-a-zA-Z0-9_:.]*)         # attribute name
            \s*
            (?:
                ([*^$|~]?)=                      # operator
                \s*
                (?:"([^"]*)"|'([^']*)'|([^\s\]]+))
            )?
            (?:\s+i)?                            # case-insensitivity flag
            \s*\]\s*$
        "#,
        )
        .expect("static attribute selector regex")
    })
}

fn leading_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([a-zA-Z][a-zA-Z0-9-]*)").expect("static tag regex"))
}

fn is_simple_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Checks candidates against a document snapshot.
#[derive(Debug, Clone)]
pub struct Verifier {
    penalty: f64,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFICATION_PENALTY)
    }
}

impl Verifier {
    /// Create a verifier with the given inconclusive-penalty multiplier.
    #[must_use]
    pub const fn new(penalty: f64) -> Self {
        Self { penalty }
    }

    /// Classify one candidate's selector against the snapshot.
    #[must_use]
    pub fn verify(&self, candidate: &Candidate, snapshot: &dyn DocumentSnapshot) -> Verdict {
        Self::verify_selector(candidate.selector(), snapshot)
    }

    fn verify_selector(selector: &str, snapshot: &dyn DocumentSnapshot) -> Verdict {
        let selector = selector.trim();

        // Coordinate clicks and XPath live outside this structural boundary.
        if selector.starts_with("visual:")
            || selector.starts_with("//")
            || selector.starts_with(".//")
            || selector.starts_with("xpath=")
        {
            return Verdict::Inconclusive;
        }

        // #id
        if let Some(id) = selector.strip_prefix('#') {
            if is_simple_token(id) {
                return if snapshot.find_by_attribute("id", id) > 0 {
                    Verdict::Matched
                } else {
                    Verdict::Unmatched
                };
            }
        }

        // .class: only an exact class attribute can be decided through the
        // snapshot boundary; multi-class lists stay inconclusive.
        if let Some(class) = selector.strip_prefix('.') {
            if is_simple_token(class) {
                return if snapshot.find_by_attribute("class", class) > 0 {
                    Verdict::Matched
                } else if snapshot.has_attribute("class") {
                    Verdict::Inconclusive
                } else {
                    Verdict::Unmatched
                };
            }
        }

        // Bare tag
        if is_simple_token(selector) {
            return if snapshot.find_by_tag(selector) > 0 {
                Verdict::Matched
            } else {
                Verdict::Unmatched
            };
        }

        // tag[attr<op>value], *[attr], [attr=value] ...
        if let Some(cap) = attr_selector_regex().captures(selector) {
            let name = &cap[2];
            let operator = cap.get(3).map_or("", |m| m.as_str());
            let value = cap
                .get(4)
                .or_else(|| cap.get(5))
                .or_else(|| cap.get(6))
                .map(|m| m.as_str());

            return match value {
                // Existence check only.
                None => {
                    if snapshot.has_attribute(name) {
                        Verdict::Matched
                    } else {
                        Verdict::Unmatched
                    }
                }
                Some(value) if operator.is_empty() => {
                    if snapshot.find_by_attribute(name, value) > 0 {
                        Verdict::Matched
                    } else {
                        Verdict::Unmatched
                    }
                }
                // Substring/prefix/suffix operators: an exact hit proves a
                // match, a missing attribute disproves it, anything between
                // is undecidable through the boundary.
                Some(value) => {
                    if snapshot.find_by_attribute(name, value) > 0 {
                        Verdict::Matched
                    } else if snapshot.has_attribute(name) {
                        Verdict::Inconclusive
                    } else {
                        Verdict::Unmatched
                    }
                }
            };
        }

        // Complex selector (combinators, pseudo-classes, :has-text): best
        // effort on the leading tag name rather than failing closed.
        if let Some(cap) = leading_tag_regex().captures(selector) {
            return if snapshot.find_by_tag(&cap[1]) > 0 {
                Verdict::Matched
            } else {
                Verdict::Unmatched
            };
        }

        Verdict::Inconclusive
    }

    /// Apply verification to a candidate list: confirmed candidates are
    /// tagged, ruled-out candidates are dropped, undecidable candidates are
    /// kept with the penalty applied.
    #[must_use]
    pub fn filter(
        &self,
        candidates: Vec<Candidate>,
        snapshot: &dyn DocumentSnapshot,
    ) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter_map(|candidate| match self.verify(&candidate, snapshot) {
                Verdict::Matched => {
                    Some(candidate.with_metadata(meta::VERIFIED, Value::Bool(true)))
                }
                Verdict::Unmatched => {
                    debug!(
                        selector = candidate.selector(),
                        "dropping candidate ruled out by snapshot"
                    );
                    None
                }
                Verdict::Inconclusive => {
                    let penalized = (candidate.confidence() * self.penalty).clamp(0.0, 1.0);
                    Some(candidate.reweighted(penalized))
                }
            })
            .collect()
    }
}

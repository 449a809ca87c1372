//! Structural document snapshots.
//!
//! The verifier works against a parsed view of the target document, never a
//! live session. The [`DocumentSnapshot`] trait is the whole boundary: any
//! DOM implementation can substitute. The built-in [`HtmlSnapshot`] is a
//! deliberately forgiving regex parser; it only needs to answer "does a
//! node with this tag/attribute plausibly exist", not build a correct tree.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// A read-only structural view of a document.
///
/// Counting semantics: `find_*` return the number of matching elements, so
/// implementations stay useful for strictness checks later. Attribute value
/// comparison is case-insensitive exact match.
pub trait DocumentSnapshot: Send + Sync {
    /// Whether any element carries the attribute, regardless of value.
    fn has_attribute(&self, name: &str) -> bool;

    /// Number of elements with this tag name (case-insensitive).
    fn find_by_tag(&self, tag: &str) -> usize;

    /// Number of elements whose attribute equals the value
    /// (case-insensitive).
    fn find_by_attribute(&self, name: &str, value: &str) -> usize;
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
}

/// Regex-parsed snapshot of raw HTML.
///
/// Handles well-formed and sloppy markup alike; anything it cannot parse it
/// simply does not see, which biases verification toward keeping candidates
/// (the live execution outcome is the authoritative check).
#[derive(Debug, Clone)]
pub struct HtmlSnapshot {
    elements: Vec<Element>,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
            .expect("static tag regex")
    })
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#)
            .expect("static attr regex")
    })
}

impl HtmlSnapshot {
    /// Parse raw HTML into a flat element list.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let mut elements = Vec::new();
        for tag_cap in tag_regex().captures_iter(html) {
            let tag = tag_cap[1].to_lowercase();
            let mut attrs = BTreeMap::new();
            if let Some(attr_str) = tag_cap.get(2) {
                for attr_cap in attr_regex().captures_iter(attr_str.as_str()) {
                    let name = attr_cap[1].to_lowercase();
                    let value = attr_cap
                        .get(2)
                        .or_else(|| attr_cap.get(3))
                        .or_else(|| attr_cap.get(4))
                        .map_or(String::new(), |m| m.as_str().to_string());
                    attrs.insert(name, value);
                }
            }
            elements.push(Element { tag, attrs });
        }
        Self { elements }
    }

    /// Number of parsed elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether nothing was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl DocumentSnapshot for HtmlSnapshot {
    fn has_attribute(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.elements.iter().any(|e| e.attrs.contains_key(&name))
    }

    fn find_by_tag(&self, tag: &str) -> usize {
        let tag = tag.to_lowercase();
        self.elements.iter().filter(|e| e.tag == tag).count()
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> usize {
        let name = name.to_lowercase();
        self.elements
            .iter()
            .filter(|e| {
                e.attrs
                    .get(&name)
                    .is_some_and(|v| v.eq_ignore_ascii_case(value))
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html>
        <body>
            <form id="login-form" class="auth form">
                <input type="email" name="username" placeholder="Email">
                <input type="password" name="password">
                <button type="submit" class="primary">Login</button>
            </form>
        </body>
        </html>
    "#;

    #[test]
    fn test_parses_tags() {
        let snap = HtmlSnapshot::parse(LOGIN_PAGE);
        assert_eq!(snap.find_by_tag("input"), 2);
        assert_eq!(snap.find_by_tag("button"), 1);
        assert_eq!(snap.find_by_tag("table"), 0);
    }

    #[test]
    fn test_tag_matching_case_insensitive() {
        let snap = HtmlSnapshot::parse("<BUTTON TYPE='submit'>Go</BUTTON>");
        assert_eq!(snap.find_by_tag("button"), 1);
        assert_eq!(snap.find_by_attribute("type", "submit"), 1);
    }

    #[test]
    fn test_attribute_lookup() {
        let snap = HtmlSnapshot::parse(LOGIN_PAGE);
        assert!(snap.has_attribute("placeholder"));
        assert!(!snap.has_attribute("aria-label"));
        assert_eq!(snap.find_by_attribute("type", "submit"), 1);
        assert_eq!(snap.find_by_attribute("id", "login-form"), 1);
        assert_eq!(snap.find_by_attribute("type", "checkbox"), 0);
    }

    #[test]
    fn test_unquoted_attribute_values() {
        let snap = HtmlSnapshot::parse("<input type=text name=q>");
        assert_eq!(snap.find_by_attribute("type", "text"), 1);
        assert_eq!(snap.find_by_attribute("name", "q"), 1);
    }

    #[test]
    fn test_valueless_attribute() {
        let snap = HtmlSnapshot::parse("<input type='checkbox' checked>");
        assert!(snap.has_attribute("checked"));
    }

    #[test]
    fn test_sloppy_markup_does_not_panic() {
        let snap = HtmlSnapshot::parse("<div <span>> <p class=>junk</ <b>");
        // Whatever parsed, the query surface stays usable.
        let _ = snap.find_by_tag("div");
        let _ = snap.has_attribute("class");
    }

    #[test]
    fn test_empty_document() {
        let snap = HtmlSnapshot::parse("");
        assert!(snap.is_empty());
        assert_eq!(snap.find_by_tag("button"), 0);
    }
}

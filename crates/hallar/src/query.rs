//! Queries: the immutable per-request description of what to locate.
//!
//! A [`Query`] carries the natural-language intent ("login button"), the
//! platform and page class the caller believes it is on, and optionally a
//! structural snapshot of the document for the verifier. A query never
//! changes after construction; everything derived from it (intent class,
//! cache key) is a pure function of its fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::result::{HallarError, HallarResult};

/// Normalized bucket of the free-text intent, used as a key for learned
/// weights and historical success rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentClass {
    /// Sign-in actions: "login", "sign in"
    Login,
    /// Generic clickable: "button", "click", "submit"
    Button,
    /// Identity fields: "username", "email", "user"
    Username,
    /// Password fields
    Password,
    /// Search boxes and triggers
    Search,
    /// Persisting actions: "save", "apply", "send"
    Save,
    /// Dismissing actions: "cancel", "close", "back"
    Cancel,
    /// Landing targets: "home", "dashboard"
    Home,
    /// Menus and navigation chrome
    Navigation,
    /// Everything else
    Other,
}

impl IntentClass {
    /// Bucket a free-text intent. Keyword groups are checked most-specific
    /// first so "login button" lands in [`IntentClass::Login`], not Button.
    #[must_use]
    pub fn classify(intent: &str) -> Self {
        let lower = intent.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["login", "log in", "sign in", "signin"]) {
            Self::Login
        } else if lower.contains("password") {
            Self::Password
        } else if has(&["username", "email", "user"]) {
            Self::Username
        } else if has(&["search", "find", "query", "filter"]) {
            Self::Search
        } else if has(&["save", "apply", "send"]) {
            Self::Save
        } else if has(&["cancel", "close", "abort", "back"]) {
            Self::Cancel
        } else if has(&["home", "dashboard"]) {
            Self::Home
        } else if has(&["menu", "nav", "navigation"]) {
            Self::Navigation
        } else if has(&["button", "click", "submit"]) {
            Self::Button
        } else {
            Self::Other
        }
    }

    /// Stable string form used in weight tables and persistence.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Button => "button",
            Self::Username => "username",
            Self::Password => "password",
            Self::Search => "search",
            Self::Save => "save",
            Self::Cancel => "cancel",
            Self::Home => "home",
            Self::Navigation => "navigation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for IntentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    intent: String,
    platform: String,
    page_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
}

impl Query {
    /// Create a query.
    ///
    /// # Errors
    ///
    /// Returns [`HallarError::InvalidQuery`] when the intent is empty or
    /// whitespace. This is the only caller-facing validation error in the
    /// resolution path.
    pub fn new(
        intent: impl Into<String>,
        platform: impl Into<String>,
        page_type: impl Into<String>,
    ) -> HallarResult<Self> {
        let intent = intent.into();
        if intent.trim().is_empty() {
            return Err(HallarError::InvalidQuery {
                message: "intent must not be empty".to_string(),
            });
        }
        Ok(Self {
            intent,
            platform: platform.into(),
            page_type: page_type.into(),
            document: None,
            extra: BTreeMap::new(),
        })
    }

    /// Attach a structural document snapshot (raw HTML) for verification.
    #[must_use]
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    /// Attach an extra context hint. Keys are sorted, so insertion order
    /// never changes the cache key.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The natural-language description of the target element.
    #[must_use]
    pub fn intent(&self) -> &str {
        &self.intent
    }

    /// Platform class hint (e.g. "salesforce_lightning").
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Page class hint (e.g. "login", "dashboard").
    #[must_use]
    pub fn page_type(&self) -> &str {
        &self.page_type
    }

    /// Raw document snapshot, if the caller supplied one.
    #[must_use]
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Extra context hints.
    #[must_use]
    pub const fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Normalized intent bucket.
    #[must_use]
    pub fn intent_class(&self) -> IntentClass {
        IntentClass::classify(&self.intent)
    }

    /// Stable cache key over `(platform, page_type, normalized intent,
    /// sorted extra)`. The document snapshot is deliberately excluded:
    /// a cached resolution should survive page re-renders.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.platform.as_bytes());
        hasher.update(b":");
        hasher.update(self.page_type.as_bytes());
        hasher.update(b":");
        hasher.update(self.intent.to_lowercase().trim().as_bytes());
        for (k, v) in &self.extra {
            hasher.update(b":");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }
        let digest = hasher.finalize();
        let mut key = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            key.push_str(&format!("{byte:02x}"));
        }
        key
    }
}

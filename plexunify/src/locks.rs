//! Field Lock Registry
//!
//! A record's `user_fields` column is a `&`-joined list of `key=value` pairs.
//! The `lockedFields` pair holds `|`-joined numeric field codes, e.g.
//! `lockedFields=2|8|15`. Every other pair is carried through untouched.
//!
//! Serialization sorts codes numerically and removes duplicates, so an
//! already canonical string round-trips byte for byte.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

const LOCKED_FIELDS_KEY: &str = "lockedFields";

/// Stable code for one lockable field category
///
/// Discriminants are the codes stored in the catalog and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldCode {
    Title = 1,
    SortTitle = 2,
    OriginalTitle = 3,
    Summary = 5,
    Tagline = 7,
    ContentRating = 8,
    Poster = 9,
    Genre = 15,
    Collection = 16,
}

impl FieldCode {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldCode::Title => "title",
            FieldCode::SortTitle => "sort title",
            FieldCode::OriginalTitle => "original title",
            FieldCode::Summary => "summary",
            FieldCode::Tagline => "tagline",
            FieldCode::ContentRating => "content rating",
            FieldCode::Poster => "poster",
            FieldCode::Genre => "genres",
            FieldCode::Collection => "collection",
        }
    }
}

impl fmt::Display for FieldCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Parsed lock state of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocks {
    /// Raw string as read from the catalog
    original: String,
    /// Non-lock pairs, in original order; `None` marks the lock pair's slot
    segments: Vec<Option<String>>,
    codes: BTreeSet<u32>,
    /// Lock tokens that are not integers, kept verbatim
    unparsed: Vec<String>,
    modified: bool,
}

impl FieldLocks {
    /// Parse a raw `user_fields` value
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut codes = BTreeSet::new();
        let mut unparsed = Vec::new();

        if !raw.is_empty() {
            for segment in raw.split('&') {
                match segment.split_once('=') {
                    Some((LOCKED_FIELDS_KEY, value)) if !segments.contains(&None) => {
                        segments.push(None);
                        for token in value.split('|').filter(|t| !t.is_empty()) {
                            match token.trim().parse::<u32>() {
                                Ok(code) if code > 0 => {
                                    codes.insert(code);
                                }
                                _ => unparsed.push(token.to_string()),
                            }
                        }
                    }
                    _ => segments.push(Some(segment.to_string())),
                }
            }
        }

        Self {
            original: raw.to_string(),
            segments,
            codes,
            unparsed,
            modified: false,
        }
    }

    pub fn is_locked(&self, field: FieldCode) -> bool {
        self.codes.contains(&field.code())
    }

    /// Add a lock; locking an already locked field is a no-op
    pub fn lock(&mut self, field: FieldCode) {
        if self.codes.insert(field.code()) {
            self.modified = true;
        }
    }

    /// Number of distinct locked codes
    pub fn count(&self) -> usize {
        self.codes.len() + self.unparsed.len()
    }

    /// True once `lock` added a code that was not present at parse time
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Canonical encoding: numeric order, no duplicates, other pairs preserved
    pub fn serialize(&self) -> String {
        let mut tokens: Vec<String> = self.codes.iter().map(|c| c.to_string()).collect();
        tokens.extend(self.unparsed.iter().cloned());
        let lock_pair = format!("{}={}", LOCKED_FIELDS_KEY, tokens.join("|"));

        let mut parts: Vec<String> = Vec::with_capacity(self.segments.len() + 1);
        let mut placed = false;
        for segment in &self.segments {
            match segment {
                Some(pair) => parts.push(pair.clone()),
                None => {
                    parts.push(lock_pair.clone());
                    placed = true;
                }
            }
        }
        if !placed && !tokens.is_empty() {
            parts.push(lock_pair);
        }

        parts.join("&")
    }
}

impl Default for FieldLocks {
    fn default() -> Self {
        Self::parse("")
    }
}

/// Per-rule overwrite policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RulePolicy {
    /// Rule runs at all
    #[serde(default)]
    pub enabled: bool,
    /// Ignore locks and existing values
    #[serde(default)]
    pub force: bool,
    /// Skip records whose field is locked
    #[serde(default = "default_true")]
    pub respect_lock: bool,
    /// Lock the field after the rule applied a value
    #[serde(default)]
    pub lock_after_completion: bool,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            force: false,
            respect_lock: true,
            lock_after_completion: false,
        }
    }
}

fn default_true() -> bool {
    true
}

impl RulePolicy {
    /// Whether the lock state lets this rule compute a new value
    pub fn permits(&self, locks: &FieldLocks, field: FieldCode) -> bool {
        self.force || !(self.respect_lock && locks.is_locked(field))
    }

    /// Record completion of a rule that applied a value
    pub fn complete(&self, locks: &mut FieldLocks, field: FieldCode) {
        if self.lock_after_completion {
            locks.lock(field);
        }
    }
}

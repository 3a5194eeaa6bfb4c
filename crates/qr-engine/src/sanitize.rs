//! File-safe artifact names derived from arbitrary cell text.
//!
//! Names are made only of `[a-z0-9_-]`, are never empty and never exceed
//! [`MAX_NAME_LEN`] characters. Two different inputs may map to the same name
//! (`"A!B"` and `"A?B"` both become `"ab"`); the later artifact then replaces
//! the earlier one on disk.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime};
use regex::Regex;

/// Longest name produced, keeping full artifact paths well under OS limits.
pub const MAX_NAME_LEN: usize = 100;

/// Prefix of the names synthesized for missing values.
pub const FALLBACK_PREFIX: &str = "sin_id";

/// Cell texts treated as "no value" (compared case-insensitively after trimming).
const MISSING_SENTINELS: &[&str] = &["nan", "none"];

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());

/// A validated artifact name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedName(String);

impl SanitizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this name was synthesized for a missing value.
    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_PREFIX)
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps raw cell text to [`SanitizedName`]s.
///
/// The fallback timestamp is captured once at construction, so every pass of
/// one run derives the same fallback names.
#[derive(Debug, Clone)]
pub struct NameSanitizer {
    stamp: String,
}

impl Default for NameSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl NameSanitizer {
    /// Create a sanitizer stamped with the current local time.
    pub fn new() -> Self {
        Self::with_timestamp(Local::now().naive_local())
    }

    /// Create a sanitizer stamped with a fixed time (seconds resolution).
    pub fn with_timestamp(at: NaiveDateTime) -> Self {
        Self {
            stamp: at.format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    /// Sanitize `raw`, falling back to `<prefix>_<timestamp>` when the value
    /// is missing or nothing survives cleaning.
    pub fn sanitize(&self, raw: &str) -> SanitizedName {
        match clean(raw) {
            Some(name) => SanitizedName(name),
            None => SanitizedName(format!("{FALLBACK_PREFIX}_{}", self.stamp)),
        }
    }

    /// Like [`sanitize`](Self::sanitize), but the fallback also carries the
    /// row index so several empty rows in one run get distinct names.
    pub fn sanitize_row(&self, row_index: usize, raw: &str) -> SanitizedName {
        match clean(raw) {
            Some(name) => SanitizedName(name),
            None => SanitizedName(format!("{FALLBACK_PREFIX}_{}_r{row_index}", self.stamp)),
        }
    }
}

/// Whether `raw` counts as a missing value (blank, `nan` or `none`).
pub fn is_missing(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty()
        || MISSING_SENTINELS
            .iter()
            .any(|s| trimmed.eq_ignore_ascii_case(s))
}

fn clean(raw: &str) -> Option<String> {
    if is_missing(raw) {
        return None;
    }

    let joined = RE_WHITESPACE.replace_all(raw.trim(), "_");
    let kept = RE_DISALLOWED.replace_all(&joined, "");
    let mut name = kept.to_ascii_lowercase();
    // Only ASCII survives the filter, so byte truncation is char-safe.
    name.truncate(MAX_NAME_LEN);

    (!name.is_empty()).then_some(name)
}

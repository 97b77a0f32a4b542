//! Named value transforms referenced by [`LearnedPattern::transform`].
//!
//! [`LearnedPattern::transform`]: boothdb_core::LearnedPattern::transform

use std::sync::LazyLock;

use regex::Regex;

pub const TRIM: &str = "trim";
pub const COLLAPSE_WHITESPACE: &str = "collapse_whitespace";
pub const CURRENCY: &str = "currency";
pub const STRIP_LABEL: &str = "strip_label";
pub const UPPERCASE: &str = "uppercase";
pub const LOWERCASE: &str = "lowercase";
pub const FIRST_LINE: &str = "first_line";

/// Currency amount with a leading symbol (`$5`, `€ 4,50`) or a trailing
/// symbol or code (`5 €`, `4.50 EUR`).
pub(crate) const CURRENCY_PATTERN: &str = r"(?:[$€£¥]\s?\d+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?\s?(?:[$€£¥]|USD|EUR|GBP|CAD|AUD))";

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CURRENCY_PATTERN).expect("valid regex"));
static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\p{L}][\p{L} ]{0,24}:\s*").expect("valid regex"));

/// Apply a named transform. Unknown names leave the value unchanged.
#[must_use]
pub fn apply_transform(name: &str, value: &str) -> String {
    match name {
        TRIM => value.trim().to_string(),
        COLLAPSE_WHITESPACE => collapse_whitespace(value),
        CURRENCY => currency(value),
        STRIP_LABEL => strip_label(value),
        UPPERCASE => value.to_uppercase(),
        LOWERCASE => value.to_lowercase(),
        FIRST_LINE => value
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string(),
        other => {
            tracing::debug!(transform = other, "unknown transform, value left unchanged");
            value.to_string()
        }
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First currency amount in `value`, with inner whitespace removed.
/// Values without an amount pass through trimmed.
fn currency(value: &str) -> String {
    match CURRENCY_RE.find(value) {
        Some(m) => m.as_str().split_whitespace().collect::<String>(),
        None => value.trim().to_string(),
    }
}

/// Drop a leading `Label:` prefix such as `Hours:` or `Address:`.
fn strip_label(value: &str) -> String {
    LABEL_RE.replace(value, "").trim().to_string()
}

/// True when `value` starts with a short `Label:` prefix.
#[must_use]
pub(crate) fn has_label(value: &str) -> bool {
    LABEL_RE.is_match(value)
}

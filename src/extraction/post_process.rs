//! # Post-Processing
//!
//! Normalization applied to raw strings read from a page: whitespace
//! cleanup, price parsing and URL resolution. Every function returns
//! `None` for input it cannot make sense of; the caller maps that to the
//! absent marker.

use tracing::trace;
use url::Url;

/// Trims and collapses internal whitespace. Empty input is `None`.
#[must_use]
pub fn clean_text(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Parses a price-like string into a finite non-negative number.
///
/// Keeps only digits, `.` and `,`, then resolves separator conventions:
/// `"$1,234.56"` -> `1234.56`, `"€ 99,99"` -> `99.99`,
/// `"1.234,56 €"` -> `1234.56`. Anything ambiguous or malformed is
/// `None`.
#[must_use]
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.contains('.'), cleaned.contains(',')) {
        (true, true) => {
            // The separator closest to the end is the decimal mark.
            let last_dot = cleaned.rfind('.').unwrap_or(0);
            let last_comma = cleaned.rfind(',').unwrap_or(0);
            if last_comma > last_dot {
                // European convention: dots group thousands.
                let without_dots: String = cleaned.chars().filter(|c| *c != '.').collect();
                let segments: Vec<&str> = without_dots.split(',').collect();
                if segments.len() != 2 || segments[1].is_empty() || segments[1].len() > 2 {
                    trace!(input = raw, "ambiguous decimal comma layout");
                    return None;
                }
                format!("{}.{}", segments[0], segments[1])
            } else {
                cleaned.chars().filter(|c| *c != ',').collect()
            }
        }
        (false, true) => {
            let segments: Vec<&str> = cleaned.split(',').collect();
            let last = segments.last()?;
            if segments.len() == 2 && (last.len() == 1 || last.len() == 2) {
                // Trailing 1-2 digit group is a European decimal.
                format!("{}.{}", segments[..segments.len() - 1].concat(), last)
            } else if segments.iter().skip(1).all(|group| group.len() == 3) {
                // Every interior group of exactly three digits is a
                // thousands separator.
                segments.concat()
            } else {
                trace!(input = raw, "ambiguous comma grouping");
                return None;
            }
        }
        (true, false) => {
            let segments: Vec<&str> = cleaned.split('.').collect();
            if segments.len() > 2 {
                if segments.iter().skip(1).all(|group| group.len() == 3) {
                    segments.concat()
                } else {
                    trace!(input = raw, "ambiguous dot grouping");
                    return None;
                }
            } else {
                cleaned
            }
        }
        (false, false) => cleaned,
    };

    let value: f64 = normalized.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Resolves a candidate URL against a base: protocol-relative links get
/// the base's scheme, root-relative and relative links resolve against
/// the base path. Script and mail pseudo-links are rejected.
#[must_use]
pub fn normalize_url(raw: &str, base: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let base = Url::parse(base).ok()?;
    let resolved = base.join(trimmed).ok()?;
    match resolved.scheme() {
        "javascript" | "mailto" => None,
        _ => Some(resolved.to_string()),
    }
}

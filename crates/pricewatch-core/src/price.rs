//! Price extraction from arbitrary marketplace text.
//!
//! Listing prices arrive as free text: currency prefixes ("Rs.725",
//! "Rs 725"), thousands separators, or multi-line blocks with several
//! prices. "No price" is a valid outcome, not an error — callers skip
//! the record.

use std::sync::LazyLock;

use regex::Regex;

/// Currency-prefixed or bare numeric token with optional thousands
/// separators and up to two decimal places.
static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Rs\.?\s*)?(\d+(?:,\d{3})*(?:\.\d{2})?)").expect("valid price regex")
});

/// First bare numeric run, used by the fallback path.
static NUMERIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid numeric regex"));

/// Parse a positive price out of marketplace text.
///
/// Only the first line of multi-line input is considered. Returns `None`
/// for empty input, unparseable text, and zero values.
pub fn parse_price(text: &str) -> Option<f64> {
    let first_line = text.trim().lines().next()?.trim();
    if first_line.is_empty() {
        return None;
    }

    let cleaned = match PRICE_TOKEN.captures(first_line) {
        Some(caps) => caps[1].replace(',', ""),
        None => fallback_clean(first_line)?,
    };

    match cleaned.parse::<f64>() {
        Ok(value) if value > 0.0 => Some(value),
        Ok(_) => None,
        Err(_) => {
            tracing::warn!(text = %text, "Could not parse price");
            None
        }
    }
}

/// Fallback: strip everything but digits and dots, discard a leading dot
/// left behind by a removed currency prefix, and take the first numeric
/// run if more than one number remains.
fn fallback_clean(line: &str) -> Option<String> {
    let mut cleaned: String = line
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if let Some(rest) = cleaned.strip_prefix('.') {
        cleaned = rest.to_string();
    }

    if cleaned.is_empty() {
        return None;
    }

    let is_single_number = cleaned.replace('.', "").chars().all(|c| c.is_ascii_digit())
        && cleaned.matches('.').count() <= 1;
    if is_single_number {
        Some(cleaned)
    } else {
        NUMERIC_RUN.find(&cleaned).map(|m| m.as_str().to_string())
    }
}

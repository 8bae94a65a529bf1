//! Bot-protection detection on fetched HTML.
//!
//! A direct fetch that hits Cloudflare, a WAF challenge, or a CAPTCHA wall
//! still returns 200 with a page that contains no listings. The hybrid
//! engine uses this check to decide whether a browser fallback is worth a
//! try before giving up on the term.

/// Challenge-page phrases, matched case-insensitively.
const PROTECTION_MARKERS: &[&str] = &[
    "cloudflare",
    "captcha",
    "are you a robot",
    "access denied",
    "pardon our interruption",
    "verify you are human",
    "unusual traffic",
    "attention required",
    "just a moment",
];

/// Bodies shorter than this are treated as challenge shells, not results.
const MIN_CONTENT_LEN: usize = 500;

/// How far into the body the binary sniff looks.
const SNIFF_LEN: usize = 1024;

/// Fraction of non-text bytes in the sniffed chunk that marks a body as
/// binary.
const BINARY_THRESHOLD: f64 = 0.05;

/// Whether a response body looks like a bot-protection page rather than
/// search results.
pub fn looks_protected(html: &str) -> bool {
    let trimmed = html.trim();
    if trimmed.len() < MIN_CONTENT_LEN {
        return true;
    }
    if looks_binary(trimmed) {
        return true;
    }

    let lowered = trimmed.to_lowercase();
    PROTECTION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Whether the first characters look like binary data served in place of
/// HTML (some challenge endpoints ship compressed or image payloads with a
/// text content type). Decoding turns those bytes into control characters
/// and replacement characters.
fn looks_binary(body: &str) -> bool {
    let mut total = 0usize;
    let mut suspect = 0usize;
    for c in body.chars().take(SNIFF_LEN) {
        total += 1;
        if (c.is_control() && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{FFFD}' {
            suspect += 1;
        }
    }
    suspect as f64 / total as f64 > BINARY_THRESHOLD
}

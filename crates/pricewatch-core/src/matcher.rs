//! Fuzzy matching of scraped listing names against the regulated catalog.
//!
//! Two stages: exact case-insensitive containment (either direction) is a
//! direct match; otherwise both names are normalized and compared by
//! keyword overlap and character-level sequence similarity. A pair is a
//! candidate when overlap ≥ 0.5 or similarity > 0.6; ties across a sweep
//! are broken by `similarity + 0.3 × overlap`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::RegulatedProduct;

/// Keyword-overlap ratio at or above which a pair is a candidate.
pub const OVERLAP_THRESHOLD: f64 = 0.5;
/// Sequence-similarity ratio above which a pair is a candidate.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;
/// Weight of keyword overlap in the combined tie-break score.
const OVERLAP_BONUS: f64 = 0.3;

/// Quantity/unit suffixes like "1kg", "500 ml", "12 pcs", "x6".
static UNIT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d+(?:\.\d+)?\s*(?:kg|g|gm|grams?|mg|l|ltr|litres?|liters?|ml|pcs?|pieces?|packs?|dozen)\b|\bx\s*\d+\b|\b\d+\s*x\b",
    )
    .expect("valid unit regex")
});

/// Unit words left behind without a quantity ("pack", "litre").
static BARE_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:kg|gm|grams?|mg|ltr|litres?|liters?|ml|pcs?|pieces?|packs?|dozen)\b")
        .expect("valid bare unit regex")
});

/// Bracketed asides: "(Imported)", "[New Stock]".
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("valid bracket regex"));

const STOP_WORDS: &[&str] = &["a", "an", "and", "the", "of", "with", "for", "per", "in"];

/// An ordered match candidate from the regulated catalog.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub product: RegulatedProduct,
    pub score: f64,
}

/// Normalize a product name for comparison: lowercase, drop bracketed
/// content, unit/quantity tokens, stop words, and collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let without_brackets = BRACKETED.replace_all(&lowered, " ");
    let without_units = UNIT_TOKEN.replace_all(&without_brackets, " ");
    let without_units = BARE_UNIT.replace_all(&without_units, " ");

    without_units
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !STOP_WORDS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ratio of shared tokens to the larger token set, over normalized names.
pub fn keyword_overlap(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let common = tokens_a.intersection(&tokens_b).count();
    common as f64 / tokens_a.len().max(tokens_b.len()) as f64
}

/// Character-level sequence similarity of two normalized names.
pub fn sequence_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Whether two raw product names are similar enough to be compared for
/// compliance.
pub fn is_match(scraped_name: &str, regulated_name: &str) -> bool {
    let scraped = scraped_name.to_lowercase();
    let regulated = regulated_name.to_lowercase();
    if scraped.contains(regulated.trim()) || regulated.contains(scraped.trim()) {
        return true;
    }

    let norm_scraped = normalize_name(scraped_name);
    let norm_regulated = normalize_name(regulated_name);
    keyword_overlap(&norm_scraped, &norm_regulated) >= OVERLAP_THRESHOLD
        || sequence_similarity(&norm_scraped, &norm_regulated) > SIMILARITY_THRESHOLD
}

/// Combined score used to rank candidates across a sweep.
pub fn match_score(scraped_name: &str, regulated_name: &str) -> f64 {
    let norm_scraped = normalize_name(scraped_name);
    let norm_regulated = normalize_name(regulated_name);
    sequence_similarity(&norm_scraped, &norm_regulated)
        + OVERLAP_BONUS * keyword_overlap(&norm_scraped, &norm_regulated)
}

/// Find regulated-catalog candidates for a scraped listing name, best
/// score first. Inactive catalog entries are never matched.
///
/// Direct containment matches short-circuit with score 1.0; otherwise the
/// fuzzy stage runs over the whole active catalog. An empty result means
/// the listing should be recorded as `no_match`.
pub fn find_candidates(scraped_name: &str, catalog: &[RegulatedProduct]) -> Vec<MatchCandidate> {
    let scraped_lower = scraped_name.to_lowercase();
    let active: Vec<&RegulatedProduct> = catalog.iter().filter(|p| p.is_active).collect();

    let direct: Vec<MatchCandidate> = active
        .iter()
        .filter(|p| {
            let name = p.name.to_lowercase();
            scraped_lower.contains(name.trim()) || name.contains(scraped_lower.trim())
        })
        .map(|p| MatchCandidate {
            product: (*p).clone(),
            score: 1.0,
        })
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    let mut candidates: Vec<MatchCandidate> = active
        .iter()
        .filter(|p| is_match(scraped_name, &p.name))
        .map(|p| MatchCandidate {
            product: (*p).clone(),
            score: match_score(scraped_name, &p.name),
        })
        .collect();

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

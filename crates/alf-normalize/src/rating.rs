//! Name-derived ratings for bulk records that carry no trustworthy score, and rewriting of
//! stale rating numbers embedded in scraped prose.
//!
//! The curve starts at 5.0 for the first non-sponsor agency, drops 0.1 per rank, and
//! subtracts a 0.0/0.1/0.2 jitter taken from the name so neighbouring agencies rarely tie.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const RATING_CEILING: f64 = 5.0;
pub const RATING_FLOOR: f64 = 4.0;
pub const RATING_STEP: f64 = 0.1;
pub const JITTER_BUCKETS: u64 = 3;

static RATING_OF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(rating of\s+)\d\.\d\b").expect("valid regex"));
static RATING_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d\.\d(\s+)(rating|stars?)\b").expect("valid regex"));

/// Deterministic rating in `[4.0, 5.0]` with one decimal place.
///
/// `position_index` is the zero-based position among non-sponsor listings.
pub fn synthesize(name: &str, position_index: usize) -> f64 {
    let hash: u64 = name.encode_utf16().map(u64::from).sum();
    let variance = (hash % JITTER_BUCKETS) as f64 * RATING_STEP;
    let base = (RATING_CEILING - position_index as f64 * RATING_STEP - variance).max(RATING_FLOOR);
    (base * 10.0).round() / 10.0
}

pub fn format_rating(rating: f64) -> String {
    format!("{rating:.1}")
}

/// Rewrites "rating of D.D", "D.D rating" and "D.D stars" so the prose agrees with
/// `rating`. The surrounding words and their casing are preserved.
pub fn rewrite_rating_mentions(text: &str, rating: f64) -> String {
    let formatted = format_rating(rating);
    let text = RATING_OF_RE.replace_all(text, |caps: &Captures| {
        format!("{}{}", &caps[1], formatted)
    });
    RATING_SUFFIX_RE
        .replace_all(&text, |caps: &Captures| {
            format!("{}{}{}", formatted, &caps[1], &caps[2])
        })
        .into_owned()
}

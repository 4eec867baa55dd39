//! Repairs free text damaged by the CSV-to-document migration: run-together words,
//! missing sentence spacing, and wall-of-text blurbs that need paragraph breaks.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A sentence longer than this always stands alone as a paragraph.
pub const LONG_SENTENCE_CHARS: usize = 150;
/// Accumulated paragraphs are flushed before they would grow past this.
pub const PARAGRAPH_TARGET_CHARS: usize = 200;

pub const BOLD_OPEN: &str = "**";
pub const BOLD_CLOSE: &str = "**";

/// Major US cities and states bolded inside agency copy.
pub const US_LOCATIONS: &[&str] = &[
    "New York",
    "Los Angeles",
    "San Francisco",
    "San Diego",
    "San Antonio",
    "San Jose",
    "Chicago",
    "Houston",
    "Phoenix",
    "Philadelphia",
    "Dallas",
    "Austin",
    "Seattle",
    "Denver",
    "Boston",
    "Miami",
    "Atlanta",
    "Portland",
    "Nashville",
    "Las Vegas",
    "Washington",
    "California",
    "Texas",
    "Florida",
    "Illinois",
    "Colorado",
    "Georgia",
    "Massachusetts",
];

/// Service categories bolded inside agency copy, longest phrases first.
pub const SERVICE_KEYWORDS: &[&str] = &[
    "mobile app development",
    "web application development",
    "custom software development",
    "software development",
    "web development",
    "app development",
    "digital marketing",
    "content marketing",
    "social media marketing",
    "search engine optimization",
    "UI/UX design",
    "web design",
    "e-commerce",
    "ecommerce",
    "cloud consulting",
    "IT services",
    "branding",
    "SEO",
    "PPC",
];

const CURRENCY_PATTERN: &str =
    r"\$\d[\d,]*(?:\.\d+)?\+?(?:\s*-\s*\$\d[\d,]*(?:\.\d+)?\+?)?(?:\s*/\s*(?:hr|hour))?";
const EMPLOYEES_PATTERN: &str =
    r"(?i)\b\d[\d,]*\s*(?:-|to)\s*\d[\d,]*\s+employees\b|\b\d[\d,]*\+?\s+employees\b";
const RATING_PATTERN: &str =
    r"(?i)\brating of \d(?:\.\d)?\b|\b\d\.\d\s+(?:rating|stars?)\b|\b\d\.\d\s*/\s*5\b";
const FOUNDED_PATTERN: &str = r"(?i)\b(?:founded|established)\s+in\s+\d{4}\b";

static LOWER_UPPER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Ll})(\p{Lu})").expect("valid regex"));
static UPPER_RUN_CAPITALIZED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Lu}{2,})(\p{Lu}\p{Ll})").expect("valid regex"));
static PUNCT_LETTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?])(\p{L})").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static SENTENCE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\s+").expect("valid regex"));
static EXISTING_BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*[^*]+\*\*").expect("valid regex"));

/// Highlight patterns in priority order; an earlier pattern owns any span it matches.
pub static HIGHLIGHT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("currency", Regex::new(CURRENCY_PATTERN).expect("valid regex")),
        ("employees", Regex::new(EMPLOYEES_PATTERN).expect("valid regex")),
        ("rating", Regex::new(RATING_PATTERN).expect("valid regex")),
        ("founded", Regex::new(FOUNDED_PATTERN).expect("valid regex")),
        ("location", alternation(US_LOCATIONS, false)),
        ("service", alternation(SERVICE_KEYWORDS, true)),
    ]
});

fn alternation(words: &[&str], case_insensitive: bool) -> Regex {
    let alt = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let flags = if case_insensitive { "(?i)" } else { "" };
    Regex::new(&format!(r"{flags}\b(?:{alt})\b")).expect("valid regex")
}

/// Single-field cleanup. Idempotent: `clean(&clean(s)) == clean(s)`.
///
/// ```
/// assert_eq!(
///     alf_normalize::clean("DEVELOPMENTLocated in Austin.Our team"),
///     "DEVELOPMENT Located in Austin. Our team"
/// );
/// ```
pub fn clean(text: &str) -> String {
    let spaced = LOWER_UPPER_RE.replace_all(text, "${1} ${2}");
    let spaced = UPPER_RUN_CAPITALIZED_RE.replace_all(&spaced, "${1} ${2}");
    let spaced = PUNCT_LETTER_RE.replace_all(&spaced, "${1} ${2}");
    WHITESPACE_RE.replace_all(&spaced, " ").trim().to_string()
}

/// Splits already-clean text into sentences, keeping terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in SENTENCE_BREAK_RE.find_iter(text) {
        let punct_end = m.start() + m.as_str().trim_end().len();
        push_trimmed(&mut sentences, &text[last..punct_end]);
        last = m.end();
    }
    push_trimmed(&mut sentences, &text[last..]);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

/// Cleans, reflows into paragraphs, and highlights each paragraph.
/// Empty or whitespace-only input yields no paragraphs.
pub fn to_paragraphs(text: &str) -> Vec<String> {
    let cleaned = clean(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for sentence in split_sentences(&cleaned) {
        let sentence_len = sentence.chars().count();
        if sentence_len > LONG_SENTENCE_CHARS {
            flush(&mut paragraphs, &mut current);
            paragraphs.push(sentence);
            continue;
        }
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + 1 + sentence_len > PARAGRAPH_TARGET_CHARS {
            flush(&mut paragraphs, &mut current);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    flush(&mut paragraphs, &mut current);

    paragraphs
        .iter()
        .map(|p| highlight_keywords(p))
        .collect()
}

fn flush(paragraphs: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        paragraphs.push(std::mem::take(current));
    }
}

/// Wraps recognized phrases in bold markup. Spans already in `**...**` are left alone,
/// so running this twice does not nest markers.
pub fn highlight_keywords(text: &str) -> String {
    let mut spans: Vec<(usize, usize, bool)> = EXISTING_BOLD_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end(), false))
        .collect();

    for (_, pattern) in HIGHLIGHT_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let (start, end) = (m.start(), m.end());
            if start == end || text[start..end].trim().is_empty() {
                continue;
            }
            if spans.iter().any(|&(s, e, _)| start < e && s < end) {
                continue;
            }
            spans.push((start, end, true));
        }
    }

    if spans.iter().all(|&(_, _, wrap)| !wrap) {
        return text.to_string();
    }

    spans.sort_by_key(|&(start, _, _)| start);
    let mut out = String::with_capacity(text.len() + spans.len() * 4);
    let mut last = 0;
    for (start, end, wrap) in spans {
        out.push_str(&text[last..start]);
        if wrap {
            out.push_str(BOLD_OPEN);
            out.push_str(&text[start..end]);
            out.push_str(BOLD_CLOSE);
        } else {
            out.push_str(&text[start..end]);
        }
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

/// Removes bold markers where plain text is needed, e.g. the page meta description.
pub fn strip_bold(text: &str) -> String {
    EXISTING_BOLD_RE
        .replace_all(text, |caps: &Captures| {
            let inner = &caps[0];
            inner[BOLD_OPEN.len()..inner.len() - BOLD_CLOSE.len()].to_string()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSY: &[&str] = &[
        "DEVELOPMENTLocated in Austin.Our team",
        "helloWorld",
        "  lots   of\n\nspace\t here ",
        "Wait!What?Yes.",
        "e.g.this and U.S.A",
        "ABCDefGHIjk",
        "ABCdEFGh",
        "Ünïcödé straßeÄpfel",
        "Zürich.Über",
        "$25,000+ budget.Rated 4.9 stars",
        "",
        "...Ok",
        "iOSAndroid apps",
    ];

    #[test]
    fn clean_fixes_run_together_words() {
        assert_eq!(
            clean("DEVELOPMENTLocated in Austin.Our team"),
            "DEVELOPMENT Located in Austin. Our team"
        );
        assert_eq!(clean("helloWorld"), "hello World");
        assert_eq!(clean("Wait!What?Yes."), "Wait! What? Yes.");
    }

    #[test]
    fn clean_spaces_non_ascii_letters_after_punctuation() {
        assert_eq!(clean("Zürich.Über uns"), "Zürich. Über uns");
        assert_eq!(clean("Fertig!Ärger"), "Fertig! Ärger");
    }

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean("  lots   of\n\nspace\t here "), "lots of space here");
        assert_eq!(clean("   "), "");
    }

    #[test]
    fn clean_is_idempotent() {
        for input in MESSY {
            let once = clean(input);
            assert_eq!(clean(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn empty_text_has_no_paragraphs() {
        assert!(to_paragraphs("").is_empty());
        assert!(to_paragraphs(" \n\t ").is_empty());
    }

    #[test]
    fn sentences_keep_their_punctuation() {
        assert_eq!(
            split_sentences("One. Two! Three? Four"),
            vec!["One.", "Two!", "Three?", "Four"]
        );
    }

    #[test]
    fn long_sentence_becomes_its_own_paragraph() {
        let long = format!("{}.", "word ".repeat(40).trim_end());
        assert!(long.chars().count() > LONG_SENTENCE_CHARS);
        let text = format!("Short intro. {long} Short outro.");
        let paragraphs = to_paragraphs(&text);
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0], "Short intro.");
        assert_eq!(paragraphs[1], long);
        assert_eq!(paragraphs[2], "Short outro.");
    }

    #[test]
    fn short_sentences_accumulate_up_to_target() {
        let sentence = "This sentence is exactly fifty characters long ok.";
        assert_eq!(sentence.chars().count(), 50);
        let text = vec![sentence; 6].join(" ");
        let paragraphs = to_paragraphs(&text);
        assert_eq!(paragraphs.len(), 2);
        for p in &paragraphs {
            assert!(p.chars().count() <= PARAGRAPH_TARGET_CHARS);
        }
        assert_eq!(paragraphs[0], vec![sentence; 3].join(" "));
    }

    #[test]
    fn highlights_currency_and_rates() {
        assert_eq!(
            highlight_keywords("Projects from $25,000+ at $25 - $49 / hr."),
            "Projects from **$25,000+** at **$25 - $49 / hr**."
        );
    }

    #[test]
    fn highlights_mixed_patterns_in_one_pass() {
        let out = highlight_keywords(
            "Founded in 2009, the 10 - 49 employees team in Austin holds a 4.8 rating for web development.",
        );
        assert_eq!(
            out,
            "**Founded in 2009**, the **10 - 49 employees** team in **Austin** holds a **4.8 rating** for **web development**."
        );
    }

    #[test]
    fn earlier_pattern_wins_overlap() {
        let out = highlight_keywords("SEO in San Francisco");
        assert_eq!(out, "**SEO** in **San Francisco**");
        let out = highlight_keywords("a rating of 4.9 stars");
        assert_eq!(out, "a **rating of 4.9** stars");
    }

    #[test]
    fn highlighting_does_not_nest_existing_bold() {
        let once = highlight_keywords("Based in Austin with a 4.7 rating.");
        assert_eq!(highlight_keywords(&once), once);
        assert_eq!(strip_bold(&once), "Based in Austin with a 4.7 rating.");
    }

    #[test]
    fn never_panics_on_odd_input() {
        for input in MESSY {
            let _ = to_paragraphs(input);
            let _ = highlight_keywords(input);
        }
        let _ = to_paragraphs("**unterminated bold $ 5 ... !!!");
    }
}

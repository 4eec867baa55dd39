//! Text cleanup and rating synthesis for bulk-imported agency copy.
//!
//! Everything here is pure: no I/O, no shared state, and no input can make it panic.

pub mod rating;
pub mod text;

pub use rating::{format_rating, rewrite_rating_mentions, synthesize};
pub use text::{clean, highlight_keywords, split_sentences, strip_bold, to_paragraphs};

pub const CRATE_NAME: &str = "alf-normalize";

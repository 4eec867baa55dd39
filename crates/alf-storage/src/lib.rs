//! Read paths over the bulk agency store and read/write paths over the curated store.
//!
//! Both stores are plain objects constructed once at startup and shared behind `Arc`;
//! there is no global client.

use std::cmp::Ordering;

use alf_core::{CuratedListing, NewCuratedListing, RawAgencyRecord};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod document;
pub mod memory;
pub mod postgres;

pub use document::record_from_document;
pub use memory::{MemoryAgencyStore, MemoryCuratedStore};
pub use postgres::{connect, PgAgencyStore, PgCuratedStore, MIGRATOR};

pub const CRATE_NAME: &str = "alf-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("rank {rank} is already taken for {service_slug}/{city_slug}")]
    RankConflict {
        service_slug: String,
        city_slug: String,
        rank: u32,
    },
    #[error("rank must be a positive integer, got {0}")]
    InvalidRank(u32),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Sort order applied by the store before `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrder {
    /// `avg_rating` descending, missing ratings last.
    Rating,
    /// `(avg_rating, reviews)` descending, missing values last.
    RatingThenReviews,
}

/// One pass over the bulk store.
///
/// A record matches when its locality contains `locality` (if set) and its services or
/// description contain any of `terms`. All comparisons are case-insensitive substrings.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub locality: Option<String>,
    pub terms: Vec<String>,
    pub exclude_ids: Vec<String>,
    pub order: CandidateOrder,
    pub limit: usize,
}

impl CandidateQuery {
    pub fn matches(&self, record: &RawAgencyRecord) -> bool {
        if self.exclude_ids.iter().any(|id| id == &record.id) {
            return false;
        }
        if let Some(locality) = &self.locality {
            let needle = locality.to_lowercase();
            let haystack = record.locality.as_deref().unwrap_or_default().to_lowercase();
            if !haystack.contains(&needle) {
                return false;
            }
        }
        let services = record.services.as_deref().unwrap_or_default().to_lowercase();
        let description = record.description.as_deref().unwrap_or_default().to_lowercase();
        self.terms
            .iter()
            .map(|term| term.to_lowercase())
            .filter(|term| !term.is_empty())
            .any(|term| services.contains(&term) || description.contains(&term))
    }

    /// Ordering used by in-memory stores; mirrors the SQL `ORDER BY`.
    pub fn compare(&self, a: &RawAgencyRecord, b: &RawAgencyRecord) -> Ordering {
        let by_rating = desc_nulls_last(a.avg_rating, b.avg_rating);
        match self.order {
            CandidateOrder::Rating => by_rating,
            CandidateOrder::RatingThenReviews => by_rating.then_with(|| {
                desc_nulls_last(a.reviews.map(|r| r as f64), b.reviews.map(|r| r as f64))
            }),
        }
    }
}

fn desc_nulls_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Read-only access to the bulk-imported agency collection.
#[async_trait]
pub trait AgencyStore: Send + Sync {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError>;
}

/// Admin-curated override rows.
#[async_trait]
pub trait CuratedStore: Send + Sync {
    /// Active rows for the pair, ordered by rank ascending. Empty when none exist.
    async fn active_listings(
        &self,
        service_slug: &str,
        city_slug: &str,
    ) -> Result<Vec<CuratedListing>, StoreError>;

    /// Inserts a row; a taken (service_slug, city_slug, rank) is `RankConflict`.
    async fn insert(&self, listing: NewCuratedListing) -> Result<CuratedListing, StoreError>;

    /// Inserts every row or none of them. The first taken rank, in input order, is the
    /// reported `RankConflict`.
    async fn insert_many(&self, listings: Vec<NewCuratedListing>) -> Result<Vec<CuratedListing>, StoreError>;

    /// Soft-deletes a row. Returns `false` when no row has that id.
    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Escapes `%`, `_` and `\` and wraps the term for a substring `ILIKE`.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

pub(crate) fn validate_rank(rank: u32) -> Result<i32, StoreError> {
    if rank == 0 {
        return Err(StoreError::InvalidRank(rank));
    }
    i32::try_from(rank).map_err(|_| StoreError::InvalidRank(rank))
}

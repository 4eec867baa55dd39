//! In-memory stores, loadable from fixture files, with the same query semantics as the
//! Postgres stores. Used when no `DATABASE_URL` is configured and throughout the tests.

use std::fs;
use std::path::Path;

use alf_core::{CuratedListing, NewCuratedListing, RawAgencyRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::document::{document_id, record_from_document};
use crate::{validate_rank, AgencyStore, CandidateQuery, CuratedStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryAgencyStore {
    records: Vec<RawAgencyRecord>,
}

impl MemoryAgencyStore {
    pub fn new(records: Vec<RawAgencyRecord>) -> Self {
        Self { records }
    }

    /// Loads a JSON array of raw documents, decoding each leniently.
    pub fn from_documents(docs: &[JsonValue]) -> Self {
        let records = docs
            .iter()
            .enumerate()
            .map(|(idx, doc)| {
                let id = document_id(doc).unwrap_or_else(|| format!("fixture-{idx}"));
                record_from_document(id, doc)
            })
            .collect();
        Self { records }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let docs: Vec<JsonValue> =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::from_documents(&docs))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AgencyStore for MemoryAgencyStore {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError> {
        let mut hits = self
            .records
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect::<Vec<_>>();
        hits.sort_by(|a, b| query.compare(a, b));
        hits.truncate(query.limit);
        Ok(hits)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCuratedStore {
    rows: Mutex<Vec<CuratedListing>>,
}

impl MemoryCuratedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store; fails on the first rank collision among the seeds.
    pub fn with_listings(listings: Vec<NewCuratedListing>) -> Result<Self, StoreError> {
        let mut rows: Vec<CuratedListing> = Vec::with_capacity(listings.len());
        let now = Utc::now();
        for listing in listings {
            validate_rank(listing.rank)?;
            ensure_rank_free(&rows, &listing)?;
            rows.push(listing.into_listing_row(Uuid::new_v4(), now));
        }
        Ok(Self { rows: Mutex::new(rows) })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let listings: Vec<NewCuratedListing> =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Self::with_listings(listings).with_context(|| format!("seeding curated rows from {}", path.display()))
    }
}

fn ensure_rank_free(rows: &[CuratedListing], listing: &NewCuratedListing) -> Result<(), StoreError> {
    let taken = rows.iter().any(|row| {
        row.service_slug == listing.service_slug
            && row.city_slug == listing.city_slug
            && row.rank == listing.rank
    });
    if taken {
        return Err(StoreError::RankConflict {
            service_slug: listing.service_slug.clone(),
            city_slug: listing.city_slug.clone(),
            rank: listing.rank,
        });
    }
    Ok(())
}

#[async_trait]
impl CuratedStore for MemoryCuratedStore {
    async fn active_listings(
        &self,
        service_slug: &str,
        city_slug: &str,
    ) -> Result<Vec<CuratedListing>, StoreError> {
        let rows = self.rows.lock().await;
        let mut out = rows
            .iter()
            .filter(|row| row.is_active && row.service_slug == service_slug && row.city_slug == city_slug)
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by_key(|row| row.rank);
        Ok(out)
    }

    async fn insert(&self, listing: NewCuratedListing) -> Result<CuratedListing, StoreError> {
        validate_rank(listing.rank)?;
        let mut rows = self.rows.lock().await;
        ensure_rank_free(&rows, &listing)?;
        let row = listing.into_listing_row(Uuid::new_v4(), Utc::now());
        rows.push(row.clone());
        Ok(row)
    }

    async fn insert_many(&self, listings: Vec<NewCuratedListing>) -> Result<Vec<CuratedListing>, StoreError> {
        let mut rows = self.rows.lock().await;
        let now = Utc::now();
        let mut staged: Vec<CuratedListing> = Vec::with_capacity(listings.len());
        for listing in listings {
            validate_rank(listing.rank)?;
            ensure_rank_free(&rows, &listing)?;
            ensure_rank_free(&staged, &listing)?;
            staged.push(listing.into_listing_row(Uuid::new_v4(), now));
        }
        rows.extend(staged.iter().cloned());
        Ok(staged)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                row.is_active = false;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

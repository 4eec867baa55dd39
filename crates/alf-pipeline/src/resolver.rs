//! Chooses the data source for a (service, city) page.
//!
//! Active curated rows win outright. An empty curated result and a failing curated store
//! both fall through to the bulk path; the failure is logged with
//! `override_lookup = "unavailable"` so outages stay visible even though the page degrades.

use std::sync::Arc;

use alf_core::{CuratedListing, Listing, ListingRequest, ListingSource, ResolvedListings};
use alf_storage::{CuratedStore, StoreError};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::assembler::{assemble, map_curated};
use crate::catalog::SponsorConfig;
use crate::selector::CandidateSelector;
use crate::PipelineError;

#[derive(Debug)]
pub enum OverrideLookup {
    Found(Vec<CuratedListing>),
    NotFound,
    Unavailable(StoreError),
}

impl OverrideLookup {
    pub fn label(&self) -> &'static str {
        match self {
            OverrideLookup::Found(_) => "found",
            OverrideLookup::NotFound => "not_found",
            OverrideLookup::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Clone)]
pub struct SourceResolver {
    curated: Arc<dyn CuratedStore>,
    selector: CandidateSelector,
    sponsor: SponsorConfig,
}

impl SourceResolver {
    pub fn new(curated: Arc<dyn CuratedStore>, selector: CandidateSelector, sponsor: SponsorConfig) -> Self {
        Self {
            curated,
            selector,
            sponsor,
        }
    }

    pub fn sponsor(&self) -> &SponsorConfig {
        &self.sponsor
    }

    pub async fn lookup_override(&self, request: &ListingRequest) -> OverrideLookup {
        match self
            .curated
            .active_listings(&request.service_slug, &request.city_slug)
            .await
        {
            Ok(rows) if rows.is_empty() => OverrideLookup::NotFound,
            Ok(rows) => OverrideLookup::Found(rows),
            Err(err) => OverrideLookup::Unavailable(err),
        }
    }

    pub async fn resolve(&self, request: &ListingRequest) -> Result<ResolvedListings, PipelineError> {
        let span = info_span!(
            "resolve_listings",
            service = %request.service_slug,
            city = %request.city_slug
        );
        async {
            let lookup = self.lookup_override(request).await;
            let override_lookup = lookup.label();
            let resolved = match lookup {
                OverrideLookup::Found(rows) => ResolvedListings {
                    data: self.map_curated_rows(&rows, request),
                    source: ListingSource::Curated,
                },
                OverrideLookup::NotFound => ResolvedListings {
                    data: self.resolve_bulk(request).await?,
                    source: ListingSource::Bulk,
                },
                OverrideLookup::Unavailable(err) => {
                    warn!(override_lookup, error = %err, "curated store unavailable, serving bulk listings");
                    ResolvedListings {
                        data: self.resolve_bulk(request).await?,
                        source: ListingSource::Bulk,
                    }
                }
            };
            info!(
                source = resolved.source.as_str(),
                override_lookup,
                listings = resolved.data.len(),
                "listings resolved"
            );
            Ok::<_, PipelineError>(resolved)
        }
        .instrument(span)
        .await
    }

    /// Bulk path only: selector then assembler. Ignores curated rows entirely.
    pub async fn resolve_bulk(&self, request: &ListingRequest) -> Result<Vec<Listing>, PipelineError> {
        let candidates = self
            .selector
            .select(
                &request.service_name,
                &request.city_name,
                std::slice::from_ref(&self.sponsor.name),
                &self.sponsor,
            )
            .await
            .map_err(PipelineError::BulkLookupFailed)?;
        Ok(assemble(
            &self.sponsor,
            &candidates,
            &request.service_name,
            &request.city_name,
        ))
    }

    /// Output ranks are renumbered by position so a soft-deleted row leaves no gap.
    fn map_curated_rows(&self, rows: &[CuratedListing], request: &ListingRequest) -> Vec<Listing> {
        rows.iter()
            .zip(1u32..)
            .map(|(row, rank)| {
                if row.rank != rank {
                    debug!(stored_rank = row.rank, rank, name = %row.name, "curated rank renumbered");
                }
                map_curated(row, rank, &request.service_name, &request.city_name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SelectorConfig;
    use alf_core::{NewCuratedListing, RawAgencyRecord};
    use alf_storage::{AgencyStore, CandidateQuery, MemoryAgencyStore, MemoryCuratedStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingStore {
        inner: MemoryAgencyStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AgencyStore for CountingStore {
        async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_candidates(query).await
        }
    }

    struct FailingBulk;

    #[async_trait]
    impl AgencyStore for FailingBulk {
        async fn find_candidates(&self, _: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError> {
            Err(StoreError::Unavailable("bulk offline".into()))
        }
    }

    struct FailingCurated;

    #[async_trait]
    impl CuratedStore for FailingCurated {
        async fn active_listings(&self, _: &str, _: &str) -> Result<Vec<CuratedListing>, StoreError> {
            Err(StoreError::Unavailable("curated offline".into()))
        }

        async fn insert(&self, _: NewCuratedListing) -> Result<CuratedListing, StoreError> {
            Err(StoreError::Unavailable("curated offline".into()))
        }

        async fn insert_many(&self, _: Vec<NewCuratedListing>) -> Result<Vec<CuratedListing>, StoreError> {
            Err(StoreError::Unavailable("curated offline".into()))
        }

        async fn deactivate(&self, _: Uuid) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("curated offline".into()))
        }
    }

    fn bulk_records() -> Vec<RawAgencyRecord> {
        ["Acme Inc", "Beta Labs", "Gamma Works"]
            .iter()
            .enumerate()
            .map(|(i, name)| RawAgencyRecord {
                id: i.to_string(),
                name: Some(name.to_string()),
                locality: Some("Austin, TX".into()),
                services: Some("SEO".into()),
                avg_rating: Some(4.0 + i as f64 / 10.0),
                ..Default::default()
            })
            .collect()
    }

    fn curated_row(rank: u32, name: &str) -> NewCuratedListing {
        NewCuratedListing {
            service_slug: "seo".into(),
            city_slug: "austin".into(),
            rank,
            name: name.into(),
            tagline: Some("Pinned".into()),
            clutch_rating: 4.25,
            website_url: None,
            services: vec!["SEO".into()],
            description: None,
            why_choose: None,
            min_project_size: None,
            hourly_rate: None,
            employees: None,
            founded: None,
            location: None,
            is_featured: false,
        }
    }

    fn request() -> ListingRequest {
        ListingRequest::new("seo", "SEO", "austin", "Austin")
    }

    fn resolver(curated: Arc<dyn CuratedStore>, bulk: Arc<dyn AgencyStore>) -> SourceResolver {
        SourceResolver::new(
            curated,
            CandidateSelector::new(bulk, SelectorConfig::default()),
            SponsorConfig::default(),
        )
    }

    #[tokio::test]
    async fn curated_rows_take_precedence_and_skip_bulk() {
        let bulk = Arc::new(CountingStore {
            inner: MemoryAgencyStore::new(bulk_records()),
            calls: AtomicUsize::new(0),
        });
        let curated = MemoryCuratedStore::with_listings(vec![curated_row(1, "Pinned Co")]).unwrap();
        let resolved = resolver(Arc::new(curated), bulk.clone()).resolve(&request()).await.unwrap();

        assert_eq!(resolved.source, ListingSource::Curated);
        assert_eq!(resolved.data.len(), 1);
        assert_eq!(resolved.data[0].name, "Pinned Co");
        assert_eq!(resolved.data[0].rating, 4.25);
        assert_eq!(bulk.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn curated_gaps_are_renumbered() {
        let curated = MemoryCuratedStore::with_listings(vec![curated_row(2, "Second"), curated_row(5, "Fifth")]).unwrap();
        let resolved = resolver(Arc::new(curated), Arc::new(FailingBulk))
            .resolve(&request())
            .await
            .unwrap();
        assert_eq!(resolved.data.iter().map(|l| l.rank).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(resolved.data[1].name, "Fifth");
    }

    #[tokio::test]
    async fn empty_curated_falls_through_to_bulk() {
        let resolved = resolver(
            Arc::new(MemoryCuratedStore::new()),
            Arc::new(MemoryAgencyStore::new(bulk_records())),
        )
        .resolve(&request())
        .await
        .unwrap();

        assert_eq!(resolved.source, ListingSource::Bulk);
        assert_eq!(resolved.data[0].name, SponsorConfig::default().name);
        assert_eq!(resolved.data[0].rating, 5.0);
        let names = resolved.data[1..].iter().map(|l| l.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Gamma Works", "Beta Labs", "Acme Inc"]);
        let ranks = resolved.data.iter().map(|l| l.rank).collect::<Vec<_>>();
        assert_eq!(ranks, (1..=resolved.data.len() as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn unavailable_curated_store_degrades_to_bulk() {
        let r = resolver(
            Arc::new(FailingCurated),
            Arc::new(MemoryAgencyStore::new(bulk_records())),
        );
        assert!(matches!(
            r.lookup_override(&request()).await,
            OverrideLookup::Unavailable(StoreError::Unavailable(_))
        ));
        let resolved = r.resolve(&request()).await.unwrap();
        assert_eq!(resolved.source, ListingSource::Bulk);
        assert_eq!(resolved.data.len(), 4);
    }

    #[tokio::test]
    async fn bulk_failure_propagates() {
        let err = resolver(Arc::new(MemoryCuratedStore::new()), Arc::new(FailingBulk))
            .resolve(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::BulkLookupFailed(_)));
    }

    #[tokio::test]
    async fn no_matches_yields_sponsor_only() {
        let resolved = resolver(
            Arc::new(MemoryCuratedStore::new()),
            Arc::new(MemoryAgencyStore::default()),
        )
        .resolve(&ListingRequest::new("ai", "AI Consulting", "boise", "Boise"))
        .await
        .unwrap();
        assert_eq!(resolved.source, ListingSource::Bulk);
        assert_eq!(resolved.data.len(), 1);
    }
}

//! Admin import: snapshot the bulk page for a (service, city) into curated rows.

use alf_core::{Listing, ListingRequest, NewCuratedListing};
use alf_storage::{CuratedStore, StoreError};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::resolver::SourceResolver;
use crate::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub service_slug: String,
    pub city_slug: String,
    pub imported: usize,
    pub ids: Vec<Uuid>,
}

fn to_curated(listing: &Listing, request: &ListingRequest) -> NewCuratedListing {
    NewCuratedListing {
        service_slug: request.service_slug.clone(),
        city_slug: request.city_slug.clone(),
        rank: listing.rank,
        name: listing.name.clone(),
        tagline: Some(listing.tagline.clone()),
        clutch_rating: listing.rating,
        website_url: Some(listing.website_url.clone()).filter(|url| url != "#"),
        services: listing.services.clone(),
        description: Some(listing.description.clone()),
        why_choose: Some(listing.why_choose.to_text()),
        min_project_size: Some(listing.min_project_size.clone()),
        hourly_rate: Some(listing.hourly_rate.clone()),
        employees: Some(listing.employees.clone()),
        founded: Some(listing.founded.clone()),
        location: Some(listing.location.clone()),
        is_featured: listing.is_featured,
    }
}

fn write_error(err: StoreError) -> PipelineError {
    match err {
        StoreError::RankConflict {
            service_slug,
            city_slug,
            rank,
        } => PipelineError::RankConflict {
            service_slug,
            city_slug,
            rank,
        },
        other => PipelineError::CuratedWriteFailed(other),
    }
}

/// Persists every listing of the bulk page, sponsor included, at its displayed rank.
///
/// Existing rows, active or not, are never overwritten: a taken rank fails the whole import
/// with `RankConflict` and nothing is written. Bold markup in `why_choose` is kept so the
/// curated page renders the same highlights as the bulk page.
pub async fn import_bulk_into_curated(
    resolver: &SourceResolver,
    curated: &dyn CuratedStore,
    request: &ListingRequest,
) -> Result<ImportSummary, PipelineError> {
    let span = info_span!(
        "import_bulk_into_curated",
        service = %request.service_slug,
        city = %request.city_slug
    );
    async {
        let listings = resolver.resolve_bulk(request).await?;
        let rows = curated
            .insert_many(listings.iter().map(|listing| to_curated(listing, request)).collect())
            .await
            .map_err(write_error)?;
        let ids = rows.iter().map(|row| row.id).collect::<Vec<_>>();
        info!(imported = ids.len(), "bulk listings imported into curated store");
        Ok::<_, PipelineError>(ImportSummary {
            service_slug: request.service_slug.clone(),
            city_slug: request.city_slug.clone(),
            imported: ids.len(),
            ids,
        })
    }
    .instrument(span)
    .await
}

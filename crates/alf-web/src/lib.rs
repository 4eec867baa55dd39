//! Axum JSON API and Askama listing page over the listing pipeline.

use std::sync::Arc;

use alf_core::{Listing, ListingSource};
use alf_normalize::{format_rating, strip_bold};
use alf_pipeline::{AppConfig, ListingService, PipelineError};
use askama::Template;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const CRATE_NAME: &str = "alf-web";

const META_DESCRIPTION_CHARS: usize = 160;

#[derive(Clone)]
pub struct AppState {
    pub listings: Arc<ListingService>,
}

impl AppState {
    pub fn new(listings: ListingService) -> Self {
        Self {
            listings: Arc::new(listings),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ListingsQuery {
    service: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImportBody {
    service: String,
    city: String,
}

/// A run of paragraph text; `bold` runs came from `**...**` markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    pub bold: bool,
    pub text: String,
}

/// Splits `**bold**` markup into segments. An unmatched marker is kept as literal text.
pub fn bold_segments(text: &str) -> Vec<TextSegment> {
    let parts = text.split("**").collect::<Vec<_>>();
    let unmatched_tail = parts.len() % 2 == 0;
    let mut segments = Vec::with_capacity(parts.len());
    for (idx, part) in parts.iter().enumerate() {
        let is_tail = idx == parts.len() - 1;
        let (bold, text) = if unmatched_tail && is_tail {
            (false, format!("**{part}"))
        } else {
            (idx % 2 == 1, part.to_string())
        };
        if !text.is_empty() {
            segments.push(TextSegment { bold, text });
        }
    }
    segments
}

#[derive(Debug, Clone)]
struct ListingCard {
    rank: u32,
    name: String,
    tagline: String,
    rating: String,
    website_url: String,
    services_text: String,
    description: String,
    paragraphs: Vec<Vec<TextSegment>>,
    min_project_size: String,
    hourly_rate: String,
    employees: String,
    founded: String,
    location: String,
    is_featured: bool,
}

impl From<&Listing> for ListingCard {
    fn from(listing: &Listing) -> Self {
        Self {
            rank: listing.rank,
            name: listing.name.clone(),
            tagline: listing.tagline.clone(),
            rating: format_rating(listing.rating),
            website_url: listing.website_url.clone(),
            services_text: listing.services.join(", "),
            description: listing.description.clone(),
            paragraphs: listing
                .why_choose
                .paragraphs()
                .into_iter()
                .map(bold_segments)
                .collect(),
            min_project_size: listing.min_project_size.clone(),
            hourly_rate: listing.hourly_rate.clone(),
            employees: listing.employees.clone(),
            founded: listing.founded.clone(),
            location: listing.location.clone(),
            is_featured: listing.is_featured,
        }
    }
}

#[derive(Template)]
#[template(path = "listings.html")]
struct ListingsPageTemplate {
    service_name: String,
    city_name: String,
    source: String,
    meta_description: String,
    cards: Vec<ListingCard>,
    no_agencies: bool,
}

#[derive(Template)]
#[template(path = "unavailable.html")]
struct UnavailableTemplate {
    service_name: String,
    city_name: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/listings", get(listings_api_handler))
        .route("/api/admin/import", post(import_handler))
        .route("/agencies/{service}/{city}", get(listings_page_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let listings = ListingService::from_config(config).await?;
    let listener = TcpListener::bind(("0.0.0.0", config.web_port)).await?;
    info!(port = config.web_port, "listening");
    axum::serve(listener, app(AppState::new(listings))).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(&AppConfig::from_env()).await
}

async fn healthz_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn listings_api_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingsQuery>,
) -> Response {
    let (Some(service), Some(city)) = (non_blank(query.service), non_blank(query.city)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "data": [], "error": "service and city are required" })),
        )
            .into_response();
    };
    match state.listings.resolve(&service, &city).await {
        Ok(resolved) => Json(resolved).into_response(),
        Err(err) => pipeline_error_json(&err),
    }
}

async fn listings_page_handler(
    State(state): State<Arc<AppState>>,
    AxumPath((service, city)): AxumPath<(String, String)>,
) -> Response {
    let request = state.listings.catalog().request(&service, &city);
    match state.listings.resolve(&service, &city).await {
        Ok(resolved) => {
            let agencies = match resolved.source {
                ListingSource::Curated => resolved.data.len(),
                ListingSource::Bulk => resolved.data.len().saturating_sub(1),
            };
            let meta_description = meta_description(&resolved.data, &request.service_name, &request.city_name);
            render_html(ListingsPageTemplate {
                service_name: request.service_name,
                city_name: request.city_name,
                source: resolved.source.as_str().to_string(),
                meta_description,
                cards: resolved.data.iter().map(ListingCard::from).collect(),
                no_agencies: agencies == 0,
            })
        }
        Err(err) => {
            error!(error = %err, service = %service, city = %city, "listing page failed");
            let mut resp = render_html(UnavailableTemplate {
                service_name: request.service_name,
                city_name: request.city_name,
            });
            *resp.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            resp
        }
    }
}

async fn import_handler(State(state): State<Arc<AppState>>, Json(body): Json<ImportBody>) -> Response {
    match state.listings.import(&body.service, &body.city).await {
        Ok(summary) => (
            StatusCode::CREATED,
            Json(json!({
                "imported": summary.imported,
                "service": summary.service_slug,
                "city": summary.city_slug,
            })),
        )
            .into_response(),
        Err(err) => pipeline_error_json(&err),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn pipeline_error_json(err: &PipelineError) -> Response {
    let status = match err {
        PipelineError::RankConflict { .. } => StatusCode::CONFLICT,
        PipelineError::BulkLookupFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::CuratedWriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if err.is_conflict() {
        warn!(error = %err, "rejected curated write");
    } else {
        error!(error = %err, "pipeline request failed");
    }
    (status, Json(json!({ "data": [], "error": err.to_string() }))).into_response()
}

fn meta_description(listings: &[Listing], service_name: &str, city_name: &str) -> String {
    let fallback = format!("Compare the top {service_name} agencies in {city_name}.");
    let Some(first) = listings
        .iter()
        .filter(|listing| !listing.is_featured)
        .find_map(|listing| listing.why_choose.paragraphs().first().map(|p| strip_bold(p)))
    else {
        return fallback;
    };
    if first.chars().count() <= META_DESCRIPTION_CHARS {
        first
    } else {
        let mut cut = first.chars().take(META_DESCRIPTION_CHARS - 3).collect::<String>();
        cut.push_str("...");
        cut
    }
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}

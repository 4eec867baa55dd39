//! Core domain model for the agency listing finder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "alf-core";

/// Maximum number of listings on one page, sponsor included.
pub const PAGE_SIZE: usize = 10;

/// Agency record from the bulk import. Every display field is optional because the
/// migrated documents are inconsistent; defaults are applied at assembly time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawAgencyRecord {
    pub id: String,
    pub name: Option<String>,
    pub website_url: Option<String>,
    pub services: Option<String>,
    pub description: Option<String>,
    pub generated_desc: Option<String>,
    pub locality: Option<String>,
    pub avg_rating: Option<f64>,
    pub reviews: Option<u64>,
    pub min_project_size: Option<String>,
    pub hourly_rate: Option<String>,
    pub employees_count: Option<String>,
    pub year_founded: Option<String>,
    pub clutch_url: Option<String>,
}

impl RawAgencyRecord {
    /// Trimmed, non-empty name. Records without one are never listed.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// De-duplication key: the only identity the bulk store offers besides its opaque id.
    pub fn name_key(&self) -> Option<String> {
        self.display_name().map(name_key)
    }
}

/// Case-insensitive trimmed agency name used as the uniqueness key.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Admin-authored override row pinning an agency at a rank for a (service, city) page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedListing {
    pub id: Uuid,
    pub service_slug: String,
    pub city_slug: String,
    pub rank: u32,
    pub name: String,
    pub tagline: Option<String>,
    pub clutch_rating: f64,
    pub website_url: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub description: Option<String>,
    pub why_choose: Option<String>,
    pub min_project_size: Option<String>,
    pub hourly_rate: Option<String>,
    pub employees: Option<String>,
    pub founded: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a curated row; ids and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCuratedListing {
    pub service_slug: String,
    pub city_slug: String,
    pub rank: u32,
    pub name: String,
    pub tagline: Option<String>,
    pub clutch_rating: f64,
    pub website_url: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub description: Option<String>,
    pub why_choose: Option<String>,
    pub min_project_size: Option<String>,
    pub hourly_rate: Option<String>,
    pub employees: Option<String>,
    pub founded: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl NewCuratedListing {
    pub fn into_listing_row(self, id: Uuid, now: DateTime<Utc>) -> CuratedListing {
        CuratedListing {
            id,
            service_slug: self.service_slug,
            city_slug: self.city_slug,
            rank: self.rank,
            name: self.name,
            tagline: self.tagline,
            clutch_rating: self.clutch_rating,
            website_url: self.website_url,
            services: self.services,
            description: self.description,
            why_choose: self.why_choose,
            min_project_size: self.min_project_size,
            hourly_rate: self.hourly_rate,
            employees: self.employees,
            founded: self.founded,
            location: self.location,
            is_active: true,
            is_featured: self.is_featured,
            created_at: now,
            updated_at: now,
        }
    }
}

/// "Why choose" copy: verbatim text for curated rows, reflowed paragraphs for bulk rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhyChoose {
    Text(String),
    Paragraphs(Vec<String>),
}

impl WhyChoose {
    pub fn to_text(&self) -> String {
        match self {
            WhyChoose::Text(text) => text.clone(),
            WhyChoose::Paragraphs(paragraphs) => paragraphs.join("\n\n"),
        }
    }

    pub fn paragraphs(&self) -> Vec<&str> {
        match self {
            WhyChoose::Text(text) => text
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect(),
            WhyChoose::Paragraphs(paragraphs) => paragraphs.iter().map(String::as_str).collect(),
        }
    }
}

/// Uniform listing shape handed to renderers. No field is ever null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub rank: u32,
    pub name: String,
    pub tagline: String,
    pub rating: f64,
    pub website_url: String,
    pub services: Vec<String>,
    pub description: String,
    pub why_choose: WhyChoose,
    pub min_project_size: String,
    pub hourly_rate: String,
    pub employees: String,
    pub founded: String,
    pub reviews: String,
    pub location: String,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSource {
    Curated,
    Bulk,
}

impl ListingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingSource::Curated => "curated",
            ListingSource::Bulk => "bulk",
        }
    }
}

/// Pipeline output: `{ "data": [...], "source": "curated" | "bulk" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedListings {
    pub data: Vec<Listing>,
    pub source: ListingSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityEntry {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// A (service, city) page request with display names already resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRequest {
    pub service_slug: String,
    pub service_name: String,
    pub city_slug: String,
    pub city_name: String,
}

impl ListingRequest {
    pub fn new(
        service_slug: impl Into<String>,
        service_name: impl Into<String>,
        city_slug: impl Into<String>,
        city_name: impl Into<String>,
    ) -> Self {
        Self {
            service_slug: service_slug.into(),
            service_name: service_name.into(),
            city_slug: city_slug.into(),
            city_name: city_name.into(),
        }
    }
}

/// Title-cases a slug: `"new-york"` becomes `"New York"`.
pub fn display_name_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut word = String::new();
                    word.extend(first.to_uppercase());
                    word.push_str(chars.as_str());
                    word
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

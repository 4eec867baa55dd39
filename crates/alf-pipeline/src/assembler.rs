//! Maps bulk candidates and curated rows into the uniform `Listing` shape.

use std::collections::HashSet;

use alf_core::{name_key, CuratedListing, Listing, RawAgencyRecord, WhyChoose, PAGE_SIZE};
use alf_normalize::{clean, rewrite_rating_mentions, synthesize, to_paragraphs};

use crate::catalog::SponsorConfig;

/// Placeholders for display fields the source record does not carry.
///
/// Templates accept `{name}`, `{service}` and `{city}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayDefaults {
    pub min_project_size: &'static str,
    pub hourly_rate: &'static str,
    pub employees: &'static str,
    pub founded: &'static str,
    pub reviews: &'static str,
    pub website_url: &'static str,
    pub tagline: &'static str,
    pub description: &'static str,
    pub why_choose: &'static str,
}

pub const DISPLAY_DEFAULTS: DisplayDefaults = DisplayDefaults {
    min_project_size: "Varies",
    hourly_rate: "Contact for pricing",
    employees: "10+",
    founded: "N/A",
    reviews: "N/A",
    website_url: "#",
    tagline: "{service} experts in {city}",
    description: "{name} is a {service} agency serving clients in {city}.",
    why_choose: "{name} delivers {service} projects for businesses in {city}. Reach out for a free consultation.",
};

fn fill(template: &str, name: &str, service_name: &str, city_name: &str) -> String {
    template
        .replace("{name}", name)
        .replace("{service}", service_name)
        .replace("{city}", city_name)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn or_default(value: Option<&str>, fallback: &str) -> String {
    non_blank(value).unwrap_or(fallback).to_string()
}

/// Strips stray whitespace and encoded spaces left by the import.
pub fn clean_url(raw: Option<&str>) -> String {
    let Some(raw) = non_blank(raw) else {
        return DISPLAY_DEFAULTS.website_url.to_string();
    };
    let url = raw
        .replace("%20", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    if url.is_empty() {
        DISPLAY_DEFAULTS.website_url.to_string()
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else {
        format!("https://{url}")
    }
}

fn split_services(raw: Option<&str>, service_name: &str) -> Vec<String> {
    let services = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect::<Vec<_>>();
    if services.is_empty() {
        vec![service_name.to_string()]
    } else {
        services
    }
}

/// Maps one bulk record. `position_index` is its zero-based slot after the sponsor.
///
/// Returns `None` for records without a usable name.
pub fn map_candidate(
    record: &RawAgencyRecord,
    position_index: usize,
    service_name: &str,
    city_name: &str,
) -> Option<Listing> {
    let name = record.display_name()?;
    let rating = synthesize(name, position_index);
    let d = &DISPLAY_DEFAULTS;

    let description = match non_blank(record.description.as_deref()) {
        Some(text) => clean(text),
        None => fill(d.description, name, service_name, city_name),
    };
    let why_source = match non_blank(record.generated_desc.as_deref()) {
        Some(text) => clean(text),
        None => fill(d.why_choose, name, service_name, city_name),
    };

    Some(Listing {
        rank: u32::try_from(position_index + 2).unwrap_or(u32::MAX),
        name: name.to_string(),
        tagline: fill(d.tagline, name, service_name, city_name),
        rating,
        website_url: clean_url(record.website_url.as_deref()),
        services: split_services(record.services.as_deref(), service_name),
        description: rewrite_rating_mentions(&description, rating),
        why_choose: WhyChoose::Paragraphs(to_paragraphs(&rewrite_rating_mentions(&why_source, rating))),
        min_project_size: or_default(record.min_project_size.as_deref(), d.min_project_size),
        hourly_rate: or_default(record.hourly_rate.as_deref(), d.hourly_rate),
        employees: or_default(record.employees_count.as_deref(), d.employees),
        founded: or_default(record.year_founded.as_deref(), d.founded),
        reviews: record
            .reviews
            .map(|r| r.to_string())
            .unwrap_or_else(|| d.reviews.to_string()),
        location: or_default(record.locality.as_deref(), city_name),
        is_featured: false,
    })
}

/// Curated rows are authoritative: rating and copy are passed through untouched.
pub fn map_curated(row: &CuratedListing, rank: u32, service_name: &str, city_name: &str) -> Listing {
    let d = &DISPLAY_DEFAULTS;
    Listing {
        rank,
        name: row.name.clone(),
        tagline: or_default(row.tagline.as_deref(), &fill(d.tagline, &row.name, service_name, city_name)),
        rating: row.clutch_rating,
        website_url: or_default(row.website_url.as_deref(), d.website_url),
        services: if row.services.is_empty() {
            vec![service_name.to_string()]
        } else {
            row.services.clone()
        },
        description: row.description.clone().unwrap_or_default(),
        why_choose: WhyChoose::Text(row.why_choose.clone().unwrap_or_default()),
        min_project_size: or_default(row.min_project_size.as_deref(), d.min_project_size),
        hourly_rate: or_default(row.hourly_rate.as_deref(), d.hourly_rate),
        employees: or_default(row.employees.as_deref(), d.employees),
        founded: or_default(row.founded.as_deref(), d.founded),
        reviews: d.reviews.to_string(),
        location: or_default(row.location.as_deref(), city_name),
        is_featured: row.is_featured,
    }
}

/// Sponsor at rank 1, then mapped candidates at ranks 2.., capped at `PAGE_SIZE`.
///
/// Nameless records, repeated names and sponsor look-alikes are skipped without using up
/// a rank, so ranks stay dense.
pub fn assemble(
    sponsor: &SponsorConfig,
    candidates: &[RawAgencyRecord],
    service_name: &str,
    city_name: &str,
) -> Vec<Listing> {
    let mut listings = Vec::with_capacity(PAGE_SIZE);
    listings.push(sponsor.listing(service_name, city_name));
    let mut seen = HashSet::from([name_key(&sponsor.name)]);

    for record in candidates {
        if listings.len() >= PAGE_SIZE {
            break;
        }
        let Some(name) = record.display_name() else {
            continue;
        };
        if sponsor.matches_brand(name) || !seen.insert(name_key(name)) {
            continue;
        }
        if let Some(listing) = map_candidate(record, listings.len() - 1, service_name, city_name) {
            listings.push(listing);
        }
    }
    listings
}

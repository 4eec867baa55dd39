//! Static service/city catalog and the sponsor entry, loaded from `catalog.yaml`.

use std::path::Path;

use alf_core::{display_name_from_slug, CityEntry, Listing, ListingRequest, ServiceEntry, WhyChoose};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    #[serde(default)]
    pub cities: Vec<CityEntry>,
    #[serde(default)]
    pub sponsor: SponsorConfig,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn service(&self, slug: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|entry| entry.slug == slug)
    }

    pub fn city(&self, slug: &str) -> Option<&CityEntry> {
        self.cities.iter().find(|entry| entry.slug == slug)
    }

    /// Membership is not enforced; unknown slugs get title-cased display names.
    pub fn request(&self, service_slug: &str, city_slug: &str) -> ListingRequest {
        let service_name = self
            .service(service_slug)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| display_name_from_slug(service_slug));
        let city_name = self
            .city(city_slug)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| display_name_from_slug(city_slug));
        ListingRequest::new(service_slug, service_name, city_slug, city_name)
    }
}

/// Fixed listing injected at rank 1 on every bulk page.
///
/// `{service}` and `{city}` placeholders in the text fields are filled per request. The
/// rating is always the maximum and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SponsorConfig {
    pub name: String,
    /// Candidates whose name contains this (case-insensitive) are dropped as duplicates.
    pub brand_token: String,
    pub tagline: String,
    pub website_url: String,
    pub services: Vec<String>,
    pub description: String,
    pub why_choose: Vec<String>,
    pub min_project_size: String,
    pub hourly_rate: String,
    pub employees: String,
    pub founded: String,
    pub reviews: String,
    pub location: String,
}

pub const SPONSOR_RATING: f64 = 5.0;

impl Default for SponsorConfig {
    fn default() -> Self {
        Self {
            name: "Northwind Digital".into(),
            brand_token: "northwind".into(),
            tagline: "Top-rated {service} partner".into(),
            website_url: "https://northwind.example".into(),
            services: vec![
                "Web Development".into(),
                "Mobile App Development".into(),
                "Digital Marketing".into(),
            ],
            description: "Northwind Digital builds {service} projects for companies in {city} and across the US."
                .into(),
            why_choose: vec![
                "A senior team that has shipped hundreds of **{service}** projects.".into(),
                "Fixed-scope proposals and weekly demos for every client in **{city}**.".into(),
            ],
            min_project_size: "$10,000+".into(),
            hourly_rate: "$50 - $99 / hr".into(),
            employees: "50 - 249".into(),
            founded: "2012".into(),
            reviews: "120+".into(),
            location: "Nationwide".into(),
        }
    }
}

impl SponsorConfig {
    pub fn matches_brand(&self, name: &str) -> bool {
        let token = self.brand_token.trim().to_lowercase();
        !token.is_empty() && name.to_lowercase().contains(&token)
    }

    pub fn listing(&self, service_name: &str, city_name: &str) -> Listing {
        let fill = |template: &str| template.replace("{service}", service_name).replace("{city}", city_name);
        Listing {
            rank: 1,
            name: self.name.clone(),
            tagline: fill(&self.tagline),
            rating: SPONSOR_RATING,
            website_url: self.website_url.clone(),
            services: if self.services.is_empty() {
                vec![service_name.to_string()]
            } else {
                self.services.clone()
            },
            description: fill(&self.description),
            why_choose: WhyChoose::Paragraphs(self.why_choose.iter().map(|p| fill(p)).collect()),
            min_project_size: self.min_project_size.clone(),
            hourly_rate: self.hourly_rate.clone(),
            employees: self.employees.clone(),
            founded: self.founded.clone(),
            reviews: self.reviews.clone(),
            location: self.location.clone(),
            is_featured: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CATALOG: &str = r#"
services:
  - name: Mobile App Development
    slug: mobile-app-development
  - name: SEO
    slug: seo
cities:
  - name: New York City
    slug: nyc
    state: NY
  - name: Austin
    slug: austin
sponsor:
  name: Brightpath Studio
  brand_token: brightpath
  tagline: "Best {service} in {city}"
"#;

    #[test]
    fn parses_catalog_and_partial_sponsor() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        assert_eq!(catalog.services.len(), 2);
        assert_eq!(catalog.city("nyc").and_then(|c| c.state.as_deref()), Some("NY"));
        assert_eq!(catalog.city("austin").unwrap().state, None);
        assert_eq!(catalog.sponsor.name, "Brightpath Studio");
        // Unset sponsor fields keep their defaults.
        assert_eq!(catalog.sponsor.hourly_rate, SponsorConfig::default().hourly_rate);
    }

    #[test]
    fn request_uses_catalog_names_then_slug_fallback() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let known = catalog.request("seo", "nyc");
        assert_eq!(known.service_name, "SEO");
        assert_eq!(known.city_name, "New York City");

        let unknown = catalog.request("web-design", "salt-lake-city");
        assert_eq!(unknown.service_name, "Web Design");
        assert_eq!(unknown.city_name, "Salt Lake City");
        assert_eq!(unknown.city_slug, "salt-lake-city");
    }

    #[test]
    fn sponsor_listing_fills_templates() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let listing = catalog.sponsor.listing("SEO", "Austin");
        assert_eq!(listing.rank, 1);
        assert_eq!(listing.rating, 5.0);
        assert_eq!(listing.tagline, "Best SEO in Austin");
        assert!(listing.is_featured);
        assert!(listing.why_choose.to_text().contains("**SEO**"));
    }

    #[test]
    fn brand_token_match_is_case_insensitive() {
        let sponsor = SponsorConfig::default();
        assert!(sponsor.matches_brand("NorthWind Digital LLC"));
        assert!(!sponsor.matches_brand("Southwind Apps"));
        let blank = SponsorConfig {
            brand_token: "  ".into(),
            ..SponsorConfig::default()
        };
        assert!(!blank.matches_brand("anything"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().expect("tempdir");
        let err = Catalog::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}

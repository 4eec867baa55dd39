//! Candidate selection over the bulk store: a local pass, a nationwide widening pass when
//! the city is sparse, then de-dup by name and removal of sponsor look-alikes.

use std::collections::HashSet;
use std::sync::Arc;

use alf_core::{name_key, RawAgencyRecord};
use alf_storage::{AgencyStore, CandidateOrder, CandidateQuery, StoreError};
use tracing::{debug, info_span, Instrument};

use crate::catalog::SponsorConfig;
use crate::SelectorConfig;

/// Platform or vendor words mapped to the broad category they belong to.
pub const PLATFORM_SYNONYMS: &[(&str, &str)] = &[
    ("iphone", "mobile"),
    ("android", "mobile"),
    ("ios", "mobile"),
    ("ipad", "mobile"),
    ("flutter", "mobile"),
    ("react", "mobile"),
    ("kotlin", "mobile"),
    ("swift", "mobile"),
    ("angular", "web"),
    ("vue", "web"),
    ("node", "web"),
    ("php", "web"),
    ("laravel", "web"),
    ("aws", "cloud"),
    ("azure", "cloud"),
    ("google", "cloud"),
];

/// First word longer than two characters, lower-cased. Falls back to the whole name.
pub fn primary_term(service_name: &str) -> String {
    service_name
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|word| word.chars().count() > 2)
        .unwrap_or_else(|| service_name.trim())
        .to_lowercase()
}

pub fn broad_term(primary: &str) -> String {
    PLATFORM_SYNONYMS
        .iter()
        .find(|(platform, _)| *platform == primary)
        .map(|(_, broad)| broad.to_string())
        .unwrap_or_else(|| primary.to_string())
}

/// Keeps the first record per name key, skipping nameless records and excluded keys.
pub fn dedupe_by_name(records: Vec<RawAgencyRecord>, exclude_keys: &HashSet<String>) -> Vec<RawAgencyRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| match record.name_key() {
            Some(key) => !exclude_keys.contains(&key) && seen.insert(key),
            None => false,
        })
        .collect()
}

fn unique_terms(terms: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim().to_string();
        if !term.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
            out.push(term);
        }
    }
    out
}

#[derive(Clone)]
pub struct CandidateSelector {
    store: Arc<dyn AgencyStore>,
    config: SelectorConfig,
}

impl CandidateSelector {
    pub fn new(store: Arc<dyn AgencyStore>, config: SelectorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> SelectorConfig {
        self.config
    }

    /// Store errors propagate; there is nothing further to fall back to.
    pub async fn select(
        &self,
        service_name: &str,
        city_name: &str,
        exclude_names: &[String],
        sponsor: &SponsorConfig,
    ) -> Result<Vec<RawAgencyRecord>, StoreError> {
        let primary = primary_term(service_name);
        let broad = broad_term(&primary);
        let span = info_span!("select_candidates", service = service_name, city = city_name, primary = %primary);

        async {
            let local_query = CandidateQuery {
                locality: Some(city_name.trim().to_string()).filter(|c| !c.is_empty()),
                terms: unique_terms([primary.clone(), service_name.to_string()]),
                exclude_ids: vec![],
                order: CandidateOrder::Rating,
                limit: self.config.local_limit,
            };
            let mut hits = self.store.find_candidates(&local_query).await?;
            let local_count = hits.len();

            if local_count < self.config.widen_threshold {
                let nationwide_query = CandidateQuery {
                    locality: None,
                    terms: unique_terms([primary.clone(), broad.clone(), service_name.to_string()]),
                    exclude_ids: hits.iter().map(|r| r.id.clone()).collect(),
                    order: CandidateOrder::RatingThenReviews,
                    limit: self.config.nationwide_limit,
                };
                let nationwide = self.store.find_candidates(&nationwide_query).await?;
                debug!(local = local_count, nationwide = nationwide.len(), "widened to nationwide pass");
                hits.extend(nationwide);
            }

            let exclude_keys = exclude_names.iter().map(|n| name_key(n)).collect::<HashSet<_>>();
            let mut candidates = dedupe_by_name(hits, &exclude_keys);
            candidates.retain(|record| {
                record
                    .display_name()
                    .map(|name| !sponsor.matches_brand(name))
                    .unwrap_or(false)
            });
            candidates.truncate(self.config.max_candidates);
            debug!(local = local_count, selected = candidates.len(), "candidates selected");
            Ok::<_, StoreError>(candidates)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alf_storage::MemoryAgencyStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn agency(id: &str, name: &str, locality: &str, services: &str, rating: f64) -> RawAgencyRecord {
        RawAgencyRecord {
            id: id.into(),
            name: Some(name.into()),
            locality: Some(locality.into()),
            services: Some(services.into()),
            avg_rating: Some(rating),
            ..Default::default()
        }
    }

    /// Records every query it receives and answers from an in-memory store.
    struct RecordingStore {
        inner: MemoryAgencyStore,
        queries: Mutex<Vec<CandidateQuery>>,
    }

    #[async_trait]
    impl AgencyStore for RecordingStore {
        async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError> {
            self.queries.lock().unwrap().push(query.clone());
            self.inner.find_candidates(query).await
        }
    }

    fn recording(records: Vec<RawAgencyRecord>) -> Arc<RecordingStore> {
        Arc::new(RecordingStore {
            inner: MemoryAgencyStore::new(records),
            queries: Mutex::new(vec![]),
        })
    }

    #[test]
    fn primary_term_skips_short_words() {
        assert_eq!(primary_term("Mobile App Development"), "mobile");
        assert_eq!(primary_term("UI Design"), "design");
        assert_eq!(primary_term("iPhone App Development"), "iphone");
        assert_eq!(primary_term("IT"), "it");
    }

    #[test]
    fn broad_term_maps_platforms() {
        assert_eq!(broad_term("iphone"), "mobile");
        assert_eq!(broad_term("laravel"), "web");
        assert_eq!(broad_term("aws"), "cloud");
        assert_eq!(broad_term("seo"), "seo");
    }

    #[tokio::test]
    async fn sparse_city_widens_to_nationwide() {
        let store = recording(vec![
            agency("1", "Local One", "Austin, TX", "Web Development", 4.2),
            agency("2", "Local Two", "Austin, TX", "Web Development", 4.8),
            agency("3", "Local Three", "Austin, TX", "web design", 4.5),
            agency("4", "Far Away", "Denver, CO", "Web Development", 4.9),
        ]);
        let selector = CandidateSelector::new(store.clone(), SelectorConfig::default());
        let picked = selector
            .select("Web Development", "Austin", &[], &SponsorConfig::default())
            .await
            .unwrap();

        let names = picked.iter().filter_map(|r| r.name.as_deref()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Local Two", "Local Three", "Local One", "Far Away"]);

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].locality.as_deref(), Some("Austin"));
        assert_eq!(queries[0].limit, 20);
        assert_eq!(queries[1].locality, None);
        assert_eq!(queries[1].limit, 10);
        assert_eq!(queries[1].order, CandidateOrder::RatingThenReviews);
        assert_eq!(queries[1].exclude_ids.len(), 3);
    }

    #[tokio::test]
    async fn three_local_matches_still_try_nationwide_even_if_empty() {
        let store = recording(vec![
            agency("1", "A", "Austin", "SEO", 4.0),
            agency("2", "B", "Austin", "SEO", 4.1),
            agency("3", "C", "Austin", "SEO", 4.2),
        ]);
        let selector = CandidateSelector::new(store.clone(), SelectorConfig::default());
        let picked = selector.select("SEO", "Austin", &[], &SponsorConfig::default()).await.unwrap();
        assert_eq!(picked.len(), 3);
        assert_eq!(store.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dense_city_skips_nationwide() {
        let records = (0..6)
            .map(|i| agency(&i.to_string(), &format!("Agency {i}"), "Miami, FL", "SEO", 4.0))
            .collect();
        let store = recording(records);
        let selector = CandidateSelector::new(store.clone(), SelectorConfig::default());
        selector.select("SEO", "Miami", &[], &SponsorConfig::default()).await.unwrap();
        assert_eq!(store.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn broad_term_used_only_nationwide() {
        let store = recording(vec![agency("1", "Droid Shop", "Boise", "Mobile apps", 4.4)]);
        let selector = CandidateSelector::new(store.clone(), SelectorConfig::default());
        let picked = selector
            .select("Android App Development", "Austin", &[], &SponsorConfig::default())
            .await
            .unwrap();
        assert_eq!(picked.len(), 1);
        let queries = store.queries.lock().unwrap();
        assert!(!queries[0].terms.contains(&"mobile".to_string()));
        assert!(queries[1].terms.contains(&"mobile".to_string()));
    }

    #[tokio::test]
    async fn case_variant_names_keep_the_local_record() {
        let store = recording(vec![
            agency("local", "Acme Inc", "Austin, TX", "SEO", 4.1),
            agency("far", "acme inc ", "Boston, MA", "SEO", 5.0),
        ]);
        let selector = CandidateSelector::new(store, SelectorConfig::default());
        let picked = selector.select("SEO", "Austin", &[], &SponsorConfig::default()).await.unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "local");
    }

    #[tokio::test]
    async fn drops_nameless_excluded_and_sponsor_lookalikes_then_truncates() {
        let mut records = vec![
            agency("nameless", "  ", "Austin", "SEO", 5.0),
            agency("sponsor", "Northwind Digital Austin", "Austin", "SEO", 5.0),
            agency("excluded", "Already Listed", "Austin", "SEO", 5.0),
        ];
        records.extend((0..15).map(|i| agency(&format!("a{i}"), &format!("Agency {i}"), "Austin", "SEO", 4.0)));
        let selector = CandidateSelector::new(recording(records), SelectorConfig::default());
        let picked = selector
            .select("SEO", "Austin", &["already listed".to_string()], &SponsorConfig::default())
            .await
            .unwrap();
        assert_eq!(picked.len(), 9);
        assert!(picked.iter().all(|r| r.id.starts_with('a') && r.id != "nameless"));
    }

    #[tokio::test]
    async fn output_never_repeats_a_name_key() {
        let records = (0..30)
            .map(|i| agency(&i.to_string(), if i % 2 == 0 { "Twin" } else { " TWIN" }, "Austin", "SEO", 4.0))
            .collect();
        let selector = CandidateSelector::new(recording(records), SelectorConfig::default());
        let picked = selector.select("SEO", "Austin", &[], &SponsorConfig::default()).await.unwrap();
        let keys = picked.iter().filter_map(|r| r.name_key()).collect::<HashSet<_>>();
        assert_eq!(keys.len(), picked.len());
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        struct Down;
        #[async_trait]
        impl AgencyStore for Down {
            async fn find_candidates(&self, _: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError> {
                Err(StoreError::Unavailable("bulk store down".into()))
            }
        }
        let selector = CandidateSelector::new(Arc::new(Down), SelectorConfig::default());
        let err = selector.select("SEO", "Austin", &[], &SponsorConfig::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}

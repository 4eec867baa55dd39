//! Listing resolution pipeline: curated overrides first, bulk candidates otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use alf_core::ResolvedListings;
use alf_storage::{
    AgencyStore, CuratedStore, MemoryAgencyStore, MemoryCuratedStore, PgAgencyStore, PgCuratedStore, StoreError,
};
use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

pub mod assembler;
pub mod catalog;
pub mod import;
pub mod resolver;
pub mod selector;

pub use assembler::{assemble, map_candidate, map_curated, DisplayDefaults, DISPLAY_DEFAULTS};
pub use catalog::{Catalog, SponsorConfig};
pub use import::{import_bulk_into_curated, ImportSummary};
pub use resolver::{OverrideLookup, SourceResolver};
pub use selector::{broad_term, dedupe_by_name, primary_term, CandidateSelector, PLATFORM_SYNONYMS};

pub const CRATE_NAME: &str = "alf-pipeline";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The bulk store failed; there is no further fallback.
    #[error("bulk agency lookup failed: {0}")]
    BulkLookupFailed(#[source] StoreError),
    /// A curated row already holds this rank. Correctable by the operator.
    #[error("rank {rank} is already taken for {service_slug}/{city_slug}")]
    RankConflict {
        service_slug: String,
        city_slug: String,
        rank: u32,
    },
    #[error("curated store write failed: {0}")]
    CuratedWriteFailed(#[source] StoreError),
}

impl PipelineError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, PipelineError::RankConflict { .. })
    }
}

/// Widening and page-size knobs for the candidate selector.
///
/// Defaults reproduce the production behaviour exactly; the numbers have no documented
/// business rationale and may be tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorConfig {
    pub local_limit: usize,
    pub nationwide_limit: usize,
    /// The nationwide pass runs when the local pass returns fewer records than this.
    pub widen_threshold: usize,
    /// Candidates kept after de-dup; one page slot is reserved for the sponsor.
    pub max_candidates: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            local_limit: 20,
            nationwide_limit: 10,
            widen_threshold: 5,
            max_candidates: alf_core::PAGE_SIZE - 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub catalog_path: PathBuf,
    pub fixtures_dir: PathBuf,
    pub web_port: u16,
    pub selector: SelectorConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            db_max_connections: std::env::var("ALF_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            catalog_path: std::env::var("ALF_CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("catalog.yaml")),
            fixtures_dir: std::env::var("ALF_FIXTURES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("fixtures")),
            web_port: std::env::var("ALF_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            selector: SelectorConfig::default(),
        }
    }
}

/// Store handles built once at startup and shared by every request.
#[derive(Clone)]
pub struct Stores {
    pub agencies: Arc<dyn AgencyStore>,
    pub curated: Arc<dyn CuratedStore>,
}

impl Stores {
    /// Postgres when `DATABASE_URL` is set, otherwise the fixture files.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        if let Some(url) = &config.database_url {
            let pool = alf_storage::connect(url, config.db_max_connections)
                .await
                .context("connecting to postgres")?;
            info!(max_connections = config.db_max_connections, "using postgres stores");
            return Ok(Self {
                agencies: Arc::new(PgAgencyStore::new(pool.clone())),
                curated: Arc::new(PgCuratedStore::new(pool)),
            });
        }

        let agencies_path = config.fixtures_dir.join("agencies.json");
        let curated_path = config.fixtures_dir.join("curated.json");
        let agencies = if agencies_path.exists() {
            MemoryAgencyStore::from_json_file(&agencies_path)?
        } else {
            warn!(
                path = %agencies_path.display(),
                "agency fixture file missing, every page will list only the sponsor"
            );
            MemoryAgencyStore::default()
        };
        let curated = if curated_path.exists() {
            MemoryCuratedStore::from_json_file(&curated_path)?
        } else {
            MemoryCuratedStore::new()
        };
        info!(
            fixtures_dir = %config.fixtures_dir.display(),
            agencies = agencies.len(),
            "using fixture stores"
        );
        Ok(Self {
            agencies: Arc::new(agencies),
            curated: Arc::new(curated),
        })
    }
}

/// Slug-level entry point used by the web handlers and the CLI.
pub struct ListingService {
    catalog: Catalog,
    resolver: SourceResolver,
    curated: Arc<dyn CuratedStore>,
}

impl ListingService {
    pub fn new(catalog: Catalog, stores: Stores, selector: SelectorConfig) -> Self {
        let resolver = SourceResolver::new(
            stores.curated.clone(),
            CandidateSelector::new(stores.agencies, selector),
            catalog.sponsor.clone(),
        );
        Self {
            catalog,
            resolver,
            curated: stores.curated,
        }
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let catalog = Catalog::load(&config.catalog_path)?;
        let stores = Stores::from_config(config).await?;
        Ok(Self::new(catalog, stores, config.selector))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub async fn resolve(&self, service_slug: &str, city_slug: &str) -> Result<ResolvedListings, PipelineError> {
        let request = self.catalog.request(service_slug, city_slug);
        self.resolver.resolve(&request).await
    }

    pub async fn import(&self, service_slug: &str, city_slug: &str) -> Result<ImportSummary, PipelineError> {
        let request = self.catalog.request(service_slug, city_slug);
        import_bulk_into_curated(&self.resolver, self.curated.as_ref(), &request).await
    }
}

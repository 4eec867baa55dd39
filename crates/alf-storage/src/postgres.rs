//! Postgres-backed stores.
//!
//! Bulk agencies live in `raw_agencies` as untouched JSONB documents so the migrated
//! shape survives as-is; filters and sorts coerce string-typed numbers in SQL.

use alf_core::{CuratedListing, NewCuratedListing, RawAgencyRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::document::record_from_document;
use crate::{like_pattern, validate_rank, AgencyStore, CandidateOrder, CandidateQuery, CuratedStore, StoreError};

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

const RATING_EXPR: &str = r#"
    CASE
        WHEN jsonb_typeof(doc->'avg_rating') = 'number' THEN (doc->>'avg_rating')::float8
        WHEN doc->>'avg_rating' ~ '^\s*[0-9]+(\.[0-9]+)?\s*$' THEN btrim(doc->>'avg_rating')::float8
    END"#;

const REVIEWS_EXPR: &str = r#"
    CASE
        WHEN jsonb_typeof(doc->'reviews') = 'number' THEN (doc->>'reviews')::numeric
        ELSE NULLIF(regexp_replace(COALESCE(doc->>'reviews', ''), '[^0-9]', '', 'g'), '')::numeric
    END"#;

const CURATED_COLUMNS: &str = r#"
    id, service_slug, city_slug, rank, name, tagline, clutch_rating, website_url,
    services, description, why_choose, min_project_size, hourly_rate, employees,
    founded, location, is_active, is_featured, created_at, updated_at"#;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(database_url)
        .await?;
    Ok(pool)
}

fn candidate_sql(order: CandidateOrder) -> String {
    let order_by = match order {
        CandidateOrder::Rating => format!("{RATING_EXPR} DESC NULLS LAST"),
        CandidateOrder::RatingThenReviews => {
            format!("{RATING_EXPR} DESC NULLS LAST, {REVIEWS_EXPR} DESC NULLS LAST")
        }
    };
    format!(
        r#"
        SELECT id::text AS id, doc
          FROM raw_agencies
         WHERE ($1::text IS NULL OR COALESCE(doc->>'locality', '') ILIKE $1)
           AND EXISTS (
                SELECT 1
                  FROM unnest($2::text[]) AS t(pattern)
                 WHERE COALESCE(doc->>'services', '') ILIKE t.pattern
                    OR COALESCE(doc->>'description', '') ILIKE t.pattern
           )
           AND NOT (id::text = ANY($3::text[]))
         ORDER BY {order_by}, id
         LIMIT $4
        "#
    )
}

#[derive(Debug, Clone)]
pub struct PgAgencyStore {
    pool: PgPool,
}

impl PgAgencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bulk-loads raw documents as-is in one transaction. Returns the number inserted.
    pub async fn insert_documents(&self, docs: &[serde_json::Value]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for doc in docs {
            inserted += sqlx::query("INSERT INTO raw_agencies (doc) VALUES ($1)")
                .bind(Json(doc))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        debug!(inserted, "raw agency documents loaded");
        Ok(inserted)
    }
}

#[async_trait]
impl AgencyStore for PgAgencyStore {
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<RawAgencyRecord>, StoreError> {
        let locality = query.locality.as_deref().map(like_pattern);
        let patterns = query
            .terms
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| like_pattern(t))
            .collect::<Vec<_>>();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let span = info_span!(
            "bulk_candidate_query",
            locality = query.locality.as_deref().unwrap_or("*"),
            terms = patterns.len(),
            limit
        );

        let rows = sqlx::query(&candidate_sql(query.order))
            .bind(locality)
            .bind(&patterns)
            .bind(&query.exclude_ids)
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let doc: serde_json::Value = row.try_get("doc")?;
            out.push(record_from_document(id, &doc));
        }
        debug!(rows = out.len(), "bulk candidate query finished");
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct PgCuratedStore {
    pool: PgPool,
}

impl PgCuratedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn curated_from_row(row: &PgRow) -> Result<CuratedListing, StoreError> {
    let rank: i32 = row.try_get("rank")?;
    let services: Json<Vec<String>> = row.try_get("services")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    Ok(CuratedListing {
        id: row.try_get("id")?,
        service_slug: row.try_get("service_slug")?,
        city_slug: row.try_get("city_slug")?,
        rank: u32::try_from(rank).unwrap_or_default(),
        name: row.try_get("name")?,
        tagline: row.try_get("tagline")?,
        clutch_rating: row.try_get("clutch_rating")?,
        website_url: row.try_get("website_url")?,
        services: services.0,
        description: row.try_get("description")?,
        why_choose: row.try_get("why_choose")?,
        min_project_size: row.try_get("min_project_size")?,
        hourly_rate: row.try_get("hourly_rate")?,
        employees: row.try_get("employees")?,
        founded: row.try_get("founded")?,
        location: row.try_get("location")?,
        is_active: row.try_get("is_active")?,
        is_featured: row.try_get("is_featured")?,
        created_at,
        updated_at,
    })
}

async fn insert_row(conn: &mut PgConnection, listing: NewCuratedListing) -> Result<CuratedListing, StoreError> {
    let rank = validate_rank(listing.rank)?;
    let row = listing.into_listing_row(Uuid::new_v4(), Utc::now());
    let result = sqlx::query(
        r#"
        INSERT INTO curated_listings (
            id, service_slug, city_slug, rank, name, tagline, clutch_rating, website_url,
            services, description, why_choose, min_project_size, hourly_rate, employees,
            founded, location, is_active, is_featured, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
        )
        "#,
    )
    .bind(row.id)
    .bind(&row.service_slug)
    .bind(&row.city_slug)
    .bind(rank)
    .bind(&row.name)
    .bind(&row.tagline)
    .bind(row.clutch_rating)
    .bind(&row.website_url)
    .bind(Json(&row.services))
    .bind(&row.description)
    .bind(&row.why_choose)
    .bind(&row.min_project_size)
    .bind(&row.hourly_rate)
    .bind(&row.employees)
    .bind(&row.founded)
    .bind(&row.location)
    .bind(row.is_active)
    .bind(row.is_featured)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(row),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::RankConflict {
            service_slug: row.service_slug,
            city_slug: row.city_slug,
            rank: row.rank,
        }),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl CuratedStore for PgCuratedStore {
    async fn active_listings(
        &self,
        service_slug: &str,
        city_slug: &str,
    ) -> Result<Vec<CuratedListing>, StoreError> {
        let sql = format!(
            r#"
            SELECT {CURATED_COLUMNS}
              FROM curated_listings
             WHERE service_slug = $1
               AND city_slug = $2
               AND is_active = TRUE
             ORDER BY rank ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(service_slug)
            .bind(city_slug)
            .fetch_all(&self.pool)
            .instrument(info_span!("curated_lookup", service_slug, city_slug))
            .await?;
        rows.iter().map(curated_from_row).collect()
    }

    async fn insert(&self, listing: NewCuratedListing) -> Result<CuratedListing, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_row(&mut conn, listing).await
    }

    async fn insert_many(&self, listings: Vec<NewCuratedListing>) -> Result<Vec<CuratedListing>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(listings.len());
        for listing in listings {
            rows.push(insert_row(&mut tx, listing).await?);
        }
        tx.commit().await?;
        debug!(rows = rows.len(), "curated rows inserted");
        Ok(rows)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE curated_listings
               SET is_active = FALSE,
                   updated_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

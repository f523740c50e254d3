use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use crate::models::{ProximityCandidate, ServiceLocation};

/// Errors that can occur when reading the service-location registry
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Read-only accessor over the service-location registry.
///
/// The registry is owned by its own ingestion process; the matching path
/// never mutates it. Callers are expected to swallow failures from
/// `find_exact` and `list_with_coordinates` and proceed with "no data", but
/// a `fetch_by_id` failure after a candidate was already selected signals
/// referential inconsistency and must be surfaced.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Single-row lookup on a normalized 5-digit ZIP. When several rows share
    /// a ZIP, the lowest id wins so repeated calls stay deterministic.
    async fn find_exact(&self, zip: &str) -> Result<Option<ServiceLocation>, StoreError>;

    /// Every location carrying both coordinates, as the slim proximity
    /// projection. Fetched once per run and held immutable for its duration.
    async fn list_with_coordinates(&self) -> Result<Vec<ProximityCandidate>, StoreError>;

    /// Re-hydrate full display fields for a location selected during
    /// proximity search.
    async fn fetch_by_id(&self, id: i64) -> Result<Option<ServiceLocation>, StoreError>;
}

/// PostgreSQL-backed registry accessor
pub struct PgLocationStore {
    pool: PgPool,
}

impl PgLocationStore {
    /// Connect and run pending migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn location_from_row(row: &sqlx::postgres::PgRow) -> ServiceLocation {
    ServiceLocation {
        id: row.get("id"),
        location_name: row.get("location_name"),
        zip: row.get("zip"),
        state: row.get("state"),
        email: row.get("email"),
        cni_status: row.get("cni_status"),
        source: row.get("source"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
    }
}

#[async_trait]
impl LocationStore for PgLocationStore {
    async fn find_exact(&self, zip: &str) -> Result<Option<ServiceLocation>, StoreError> {
        let query = r#"
            SELECT id, location_name, zip, state, email, cni_status, source, latitude, longitude
            FROM service_locations
            WHERE zip = $1
            ORDER BY id
            LIMIT 1
        "#;

        let row = sqlx::query(query)
            .bind(zip)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(location_from_row))
    }

    async fn list_with_coordinates(&self) -> Result<Vec<ProximityCandidate>, StoreError> {
        let query = r#"
            SELECT id, location_name, zip, latitude, longitude
            FROM service_locations
            WHERE latitude IS NOT NULL AND longitude IS NOT NULL
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let candidates = rows
            .iter()
            .map(|row| ProximityCandidate {
                id: row.get("id"),
                location_name: row.get("location_name"),
                zip: row.get("zip"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
            })
            .collect();

        Ok(candidates)
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<ServiceLocation>, StoreError> {
        let query = r#"
            SELECT id, location_name, zip, state, email, cni_status, source, latitude, longitude
            FROM service_locations
            WHERE id = $1
            LIMIT 1
        "#;

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(location_from_row))
    }
}

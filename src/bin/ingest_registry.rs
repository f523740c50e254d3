//! Registry ingestion tool: loads the master service-location CSV, geocodes
//! each row, and inserts it into the registry database.
//!
//! Usage: `ingest-registry [path-to-master-csv]` (defaults to
//! `service_locations.csv` in the working directory).

use std::fs::File;
use std::sync::Arc;

use cni_matcher::config::Settings;
use cni_matcher::services::{GoogleGeocoder, PgLocationStore, RegistryIngestor};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "service_locations.csv".to_string());

    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    let store = PgLocationStore::connect(
        &settings.database.url,
        settings.database.max_connections.unwrap_or(5),
        settings.database.min_connections.unwrap_or(1),
    )
    .await
    .unwrap_or_else(|e| {
        error!("Failed to connect to the registry database: {}", e);
        std::process::exit(1);
    });

    let geocoder = Arc::new(GoogleGeocoder::new(
        settings.google.geocode_url.clone(),
        settings.google.api_key.clone(),
    ));

    let file = File::open(&path).unwrap_or_else(|e| {
        error!("Failed to open master CSV {}: {}", path, e);
        std::process::exit(1);
    });

    info!("Ingesting service locations from {}", path);

    let ingestor = RegistryIngestor::new(store.pool().clone(), geocoder);
    match ingestor.ingest_csv(file).await {
        Ok(summary) => {
            info!(
                "Ingestion finished: read {}, inserted {}, skipped {}, geocode failures {}",
                summary.rows_read,
                summary.inserted,
                summary.skipped_invalid,
                summary.geocode_failures
            );
        }
        Err(e) => {
            error!("Ingestion failed: {}", e);
            std::process::exit(1);
        }
    }
}

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;

use crate::core::filters::normalize_zip;
use crate::services::Geocoder;

/// Master-file column names.
const COL_LOCATION_NAME: &str = "Location name";
const COL_ZIP_CODE: &str = "Zip Code";
const COL_STATE: &str = "State";
const COL_EMAIL: &str = "Email";
const COL_CNI_STATUS: &str = "CNI Status";
const COL_SOURCE: &str = "Source";

/// Placeholder ZIP that shows up in master files and is never geocodable.
const IGNORED_ZIP: &str = "00000";

/// Pause between geocoding calls to respect provider rate limits.
const GEOCODE_PAUSE: Duration = Duration::from_millis(150);

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read master CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Counters reported after an ingestion run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub inserted: usize,
    pub skipped_invalid: usize,
    pub geocode_failures: usize,
}

/// Loads the master service-location file into the registry.
///
/// Each row's ZIP is normalized and geocoded best-effort before insert; rows
/// that fail geocoding are stored without coordinates so they stay eligible
/// for exact matches. This is the only writer the registry has; the
/// matching path is strictly read-only.
pub struct RegistryIngestor {
    pool: PgPool,
    geocoder: Arc<dyn Geocoder>,
}

impl RegistryIngestor {
    pub fn new(pool: PgPool, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { pool, geocoder }
    }

    /// Ingest a master CSV. Rows are geocoded and inserted one at a time,
    /// with a fixed pause between provider calls.
    pub async fn ingest_csv<R: Read>(&self, input: R) -> Result<IngestSummary, IngestError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

        let headers = reader.headers()?.clone();
        let name_index = column_index(&headers, COL_LOCATION_NAME)
            .ok_or(IngestError::MissingColumn(COL_LOCATION_NAME))?;
        let zip_index = column_index(&headers, COL_ZIP_CODE)
            .ok_or(IngestError::MissingColumn(COL_ZIP_CODE))?;
        let state_index = column_index(&headers, COL_STATE);
        let email_index = column_index(&headers, COL_EMAIL);
        let status_index = column_index(&headers, COL_CNI_STATUS);
        let source_index = column_index(&headers, COL_SOURCE);

        let mut summary = IngestSummary::default();

        for record in reader.records() {
            let record = record?;
            summary.rows_read += 1;

            let location_name = record.get(name_index).unwrap_or("").trim();
            if location_name.is_empty() {
                tracing::warn!("skipping row {}: missing location name", summary.rows_read);
                summary.skipped_invalid += 1;
                continue;
            }

            let raw_zip = record.get(zip_index).unwrap_or("");
            let zip = match normalize_zip(raw_zip) {
                Some(zip) if zip != IGNORED_ZIP => zip,
                _ => {
                    tracing::warn!(
                        "skipping row {} ({}): invalid or ignored ZIP {:?}",
                        summary.rows_read,
                        location_name,
                        raw_zip
                    );
                    summary.skipped_invalid += 1;
                    continue;
                }
            };

            let coords = self.geocoder.geocode(&zip).await;
            tokio::time::sleep(GEOCODE_PAUSE).await;

            if coords.is_none() {
                summary.geocode_failures += 1;
                tracing::warn!(
                    "failed to geocode ZIP {} for {}; inserting without coordinates",
                    zip,
                    location_name
                );
            }

            let result = sqlx::query(
                r#"
                INSERT INTO service_locations
                    (location_name, zip, state, email, cni_status, source, latitude, longitude)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (location_name, zip) DO NOTHING
                "#,
            )
            .bind(location_name)
            .bind(&zip)
            .bind(optional_field(&record, state_index))
            .bind(optional_field(&record, email_index))
            .bind(optional_field(&record, status_index))
            .bind(optional_field(&record, source_index))
            .bind(coords.map(|c| c.lat))
            .bind(coords.map(|c| c.lng))
            .execute(&self.pool)
            .await?;

            summary.inserted += result.rows_affected() as usize;

            if summary.rows_read % 100 == 0 {
                tracing::info!(
                    "checked {} rows: inserted {}, skipped {}, geocode failures {}",
                    summary.rows_read,
                    summary.inserted,
                    summary.skipped_invalid,
                    summary.geocode_failures
                );
            }
        }

        Ok(summary)
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn optional_field(record: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_is_exact() {
        let headers = csv::StringRecord::from(vec!["Location name", "Zip Code", "State"]);
        assert_eq!(column_index(&headers, "Zip Code"), Some(1));
        assert_eq!(column_index(&headers, "zip code"), None);
    }

    #[test]
    fn test_optional_field_drops_blanks() {
        let record = csv::StringRecord::from(vec!["Asheville", "28801", "  "]);
        assert_eq!(
            optional_field(&record, Some(0)).as_deref(),
            Some("Asheville")
        );
        assert_eq!(optional_field(&record, Some(2)), None);
        assert_eq!(optional_field(&record, None), None);
    }
}

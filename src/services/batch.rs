use std::io;

use thiserror::Error;

use crate::core::matcher::{MatchEngine, MatchEngineError};
use crate::models::{MatchResult, ProximityCandidate};

/// Lead-file column names recognized as the ZIP column, in priority order.
const ZIP_HEADERS: [&str; 3] = ["Zip Code", "zip", "Zip"];

/// Columns appended to every processed row.
const OUTPUT_COLUMNS: [&str; 13] = [
    "cni_location_name",
    "cni_matched_zip",
    "cni_state",
    "cni_email",
    "cni_status",
    "cni_source",
    "cni_latitude",
    "cni_longitude",
    "cni_match_type",
    "cni_distance_miles",
    "cni_distance_text",
    "cni_duration_text",
    "matched_cni_db_id",
];

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read lead CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("lead file is empty or contains no data rows")]
    EmptyInput,

    #[error("no ZIP column found (tried: {tried}); found headers: {found}")]
    MissingZipColumn { tried: String, found: String },

    #[error(transparent)]
    Engine(#[from] MatchEngineError),

    #[error("failed to write processed CSV: {0}")]
    Io(#[from] io::Error),
}

/// Result of one bulk run: the processed CSV plus a row count for reporting.
#[derive(Debug)]
pub struct BatchOutcome {
    pub csv: Vec<u8>,
    pub processed: usize,
}

/// Iterates a lead file sequentially, invoking the engine once per row and
/// merging each match result into the row's original fields.
///
/// Rows are processed strictly one after another, with no overlap, so a run
/// never exceeds the routing provider's rate limits. One lead failing to
/// match never aborts the batch; only fatal engine errors propagate.
#[derive(Clone)]
pub struct BatchRunner {
    engine: MatchEngine,
}

impl BatchRunner {
    pub fn new(engine: MatchEngine) -> Self {
        Self { engine }
    }

    /// Process an uploaded lead CSV against the given candidate snapshot.
    ///
    /// The ZIP column is located dynamically among the recognized header
    /// names; every original column is carried through to the output.
    pub async fn process_csv(
        &self,
        input: &[u8],
        pool: &[ProximityCandidate],
    ) -> Result<BatchOutcome, BatchError> {
        let mut reader = csv::Reader::from_reader(input);
        let headers = reader.headers()?.clone();
        let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;

        if records.is_empty() {
            return Err(BatchError::EmptyInput);
        }

        let zip_index = find_zip_column(&headers).ok_or_else(|| BatchError::MissingZipColumn {
            tried: ZIP_HEADERS.join(", "),
            found: headers.iter().collect::<Vec<_>>().join(", "),
        })?;
        tracing::info!(
            "processing {} leads using ZIP column {:?}",
            records.len(),
            &headers[zip_index]
        );

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut output_headers: Vec<String> = headers.iter().map(str::to_string).collect();
        output_headers.extend(OUTPUT_COLUMNS.iter().map(|column| column.to_string()));
        writer.write_record(&output_headers)?;

        let mut matched = 0usize;
        for (index, record) in records.iter().enumerate() {
            let lead_zip = record.get(zip_index).unwrap_or("");
            let result = self.engine.match_lead(lead_zip, pool).await?;
            if result.match_type.is_match() {
                matched += 1;
            }

            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.extend(match_columns(&result));
            writer.write_record(&row)?;

            if (index + 1) % 50 == 0 {
                tracing::info!("processed {} of {} leads", index + 1, records.len());
            }
        }
        tracing::info!("matched {} of {} leads", matched, records.len());

        let csv = writer
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        Ok(BatchOutcome {
            csv,
            processed: records.len(),
        })
    }
}

fn find_zip_column(headers: &csv::StringRecord) -> Option<usize> {
    ZIP_HEADERS
        .iter()
        .find_map(|name| headers.iter().position(|header| header == *name))
}

fn match_columns(result: &MatchResult) -> Vec<String> {
    vec![
        opt_str(&result.location_name),
        opt_str(&result.matched_zip),
        opt_str(&result.state),
        opt_str(&result.email),
        opt_str(&result.cni_status),
        opt_str(&result.source),
        opt_display(result.latitude),
        opt_display(result.longitude),
        result.match_type.to_string(),
        opt_display(result.distance_miles),
        opt_str(&result.distance_text),
        opt_str(&result.duration_text),
        opt_display(result.matched_cni_id),
    ]
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_display<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::MatchEngine;
use crate::models::{
    ErrorResponse, HealthResponse, Lead, MatchedLead, ProximityCandidate, SingleLookupRequest,
    SingleLookupResponse,
};
use crate::services::{BatchError, BatchRunner, PgLocationStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PgLocationStore>,
    pub engine: MatchEngine,
    pub batch: BatchRunner,
}

/// Configure all matching-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/lookup-single", web::post().to(lookup_single))
        .route("/process-csv", web::post().to(process_csv));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db_healthy = state.store.health_check().await.unwrap_or(false);
    let status = if db_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Fetch the candidate snapshot for one request. A listing failure degrades
/// to an empty pool rather than failing the request.
async fn candidate_pool(state: &AppState) -> Vec<ProximityCandidate> {
    match state.store.list_with_coordinates().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!("failed to list candidate locations, proceeding without: {}", e);
            Vec::new()
        }
    }
}

/// Single lookup endpoint
///
/// POST /api/lookup-single
///
/// Request body:
/// ```json
/// {
///   "zip": "28801",
///   "leadName": "string",
///   "leadId": "string"
/// }
/// ```
///
/// Malformed ZIPs still produce a classified result (`invalid_lead_zip`);
/// only a missing body field is a request error.
async fn lookup_single(
    state: web::Data<AppState>,
    req: web::Json<SingleLookupRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let lead = Lead {
        zip: req.zip.clone(),
        name: req.lead_name.clone(),
        id: req.lead_id.clone(),
    };

    tracing::info!("single lookup for ZIP {}", lead.zip);

    let pool = candidate_pool(&state).await;

    match state.engine.match_lead(&lead.zip, &pool).await {
        Ok(result) => {
            tracing::info!("single lookup for {} classified as {}", lead.zip, result.match_type);
            HttpResponse::Ok().json(SingleLookupResponse {
                success: true,
                matched: MatchedLead {
                    lead_name: lead.name.unwrap_or_default(),
                    lead_id: lead.id.unwrap_or_default(),
                    zip: lead.zip,
                    result,
                },
            })
        }
        Err(e) => {
            tracing::error!("single lookup for {} failed: {}", req.zip, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Lookup failed".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

/// Bulk CSV endpoint
///
/// POST /api/process-csv
///
/// The request body is the raw lead CSV; the response is the processed CSV
/// with one match result merged into each row.
async fn process_csv(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    if body.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Empty upload".to_string(),
            message: "No CSV content was provided".to_string(),
            status_code: 400,
        });
    }

    let pool = candidate_pool(&state).await;
    tracing::info!(
        "processing uploaded lead file against {} candidate locations",
        pool.len()
    );

    match state.batch.process_csv(&body, &pool).await {
        Ok(outcome) => {
            tracing::info!("successfully processed {} leads", outcome.processed);
            let filename = format!(
                "leads-processed-{}.csv",
                chrono::Utc::now().format("%Y%m%d%H%M%S")
            );
            HttpResponse::Ok()
                .content_type("text/csv")
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", filename),
                ))
                .body(outcome.csv)
        }
        Err(e @ (BatchError::Csv(_) | BatchError::EmptyInput | BatchError::MissingZipColumn { .. })) => {
            HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid lead file".to_string(),
                message: e.to_string(),
                status_code: 400,
            })
        }
        Err(e) => {
            tracing::error!("bulk processing failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to process CSV file".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_response() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
        };

        assert_eq!(response.status, "healthy");
    }
}

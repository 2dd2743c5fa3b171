use crate::db_storage::KycStore;
use crate::errors::{AppError, ResultExt};
use crate::extraction::extract_identity;
use crate::models::{
    ExtractRequest, ExtractedIdentity, KycQuery, KycRecord, KycVerificationRequest,
    KycVerificationResponse,
};
use crate::notify::Notifier;
use crate::verification::verify_and_record_workflow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    /// Where finished verifications are recorded.
    pub store: Arc<dyn KycStore>,
    /// Outbound report channels, attempted in order.
    pub notifiers: Vec<Arc<dyn Notifier>>,
    /// Request fingerprint -> checksummed response, for idempotent resubmission.
    pub recent_verifications: Cache<String, String>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-kyc-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/kyc/verify
///
/// Runs the full verification for one applicant. Mismatched uploads are
/// rejected with 400 and the list of issues.
pub async fn verify_kyc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<KycVerificationRequest>,
) -> Result<Json<KycVerificationResponse>, AppError> {
    tracing::info!(
        "POST /kyc/verify - phone provided: {}, face signal: {}",
        request.phone.is_some(),
        request.face.is_some()
    );

    let response = verify_and_record_workflow(&state, &request)
        .await
        .context("KYC verification")?;

    Ok(Json(response))
}

/// POST /api/v1/kyc/extract
///
/// Extracts identity fields from one recognized text without storing anything.
pub async fn extract_fields(
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractedIdentity>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }

    let identity = extract_identity(&request.text);
    tracing::debug!(
        "POST /kyc/extract - id_number: {}, dob: {}, tax_id: {}, gender: {}",
        identity.id_number.is_some(),
        identity.date_of_birth.is_some(),
        identity.tax_id.is_some(),
        identity.gender.is_some()
    );

    Ok(Json(identity))
}

/// GET /api/v1/kyc/:email
///
/// Returns the latest stored verification for an email address.
pub async fn get_kyc(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<KycRecord>, AppError> {
    let email = email.trim().to_string();
    if email.is_empty() {
        return Err(AppError::BadRequest("email is required".to_string()));
    }

    let record = state
        .store
        .find(&KycQuery::by_email(email.clone()))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No KYC record for {}", email)))?;

    Ok(Json(record))
}

/// KYC API routes without transport layers (rate limiting, tracing, CORS).
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/kyc/verify", post(verify_kyc))
        .route("/api/v1/kyc/extract", post(extract_fields))
        .route("/api/v1/kyc/:email", get(get_kyc))
}

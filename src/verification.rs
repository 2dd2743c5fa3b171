//! End-to-end KYC verification workflow
//!
//! `evaluate` is the pure pipeline (extract, slot-check, score, fuse).
//! `verify_and_record_workflow` wraps it with resubmission caching,
//! persistence and notification.

use crate::cache_validator::{request_fingerprint, ValidatedCacheEntry};
use crate::decision::decide;
use crate::deepfake::score_deepfake;
use crate::errors::AppError;
use crate::extraction::{age_is_at_least_18, extract_identity, extract_tax_id};
use crate::handlers::AppState;
use crate::models::{
    DeepfakeAnalysis, FaceSignal, KycRecord, KycVerificationRequest, KycVerificationResponse,
    SlotIssues, VerificationVerdict,
};
use crate::notify::notify_all;
use crate::slot_validation::{validate_slots, SlotFields};
use std::sync::Arc;
use uuid::Uuid;

/// Runs extraction, slot validation, deepfake scoring and fusion for one request.
///
/// Returns the slot issues instead of a verdict when any upload is in the wrong slot.
pub fn evaluate(request: &KycVerificationRequest) -> Result<VerificationVerdict, SlotIssues> {
    let id_fields = extract_identity(&request.id_document_text);
    let tax_id = extract_tax_id(&request.tax_document_text);

    let issues = validate_slots(
        SlotFields {
            id_number: id_fields.id_number.as_deref(),
            date_of_birth: id_fields.date_of_birth.as_deref(),
            tax_id: tax_id.as_deref(),
        },
        &request.selfie_text,
        request.selfie_has_face,
    );
    if !issues.is_empty() {
        return Err(issues);
    }

    let age_verified = id_fields
        .date_of_birth
        .as_deref()
        .is_some_and(age_is_at_least_18);

    let face = request.face.unwrap_or_else(FaceSignal::no_face);
    let deepfake = score_deepfake(&request.metrics);
    let final_status = decide(&face, &deepfake, age_verified);

    Ok(VerificationVerdict {
        id_number: id_fields.id_number,
        tax_id,
        date_of_birth: id_fields.date_of_birth,
        gender: id_fields.gender,
        age_verified,
        face,
        deepfake,
        final_status,
    })
}

/// Builds the outward report for a verdict. `stored` and `notifications` are filled in later.
pub fn build_response(
    verification_id: Uuid,
    request: &KycVerificationRequest,
    verdict: &VerificationVerdict,
) -> KycVerificationResponse {
    KycVerificationResponse {
        verification_id,
        id_number: verdict.id_number.clone(),
        tax_id: verdict.tax_id.clone(),
        date_of_birth: verdict.date_of_birth.clone(),
        gender: verdict.gender,
        age_verified: verdict.age_verified,
        similarity: verdict.face.similarity_percent,
        face_match: verdict.face.is_match,
        deepfake_analysis: DeepfakeAnalysis::new(&verdict.deepfake, &request.metrics),
        final_status: verdict.final_status,
        email: request.email.trim().to_string(),
        phone: request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        stored: false,
        notifications: Vec::new(),
    }
}

/// Verifies a request, stores the record and sends notifications.
///
/// Identical resubmissions within the cache TTL return the first response,
/// including ones that arrive while the first is still being recorded.
/// Storage and notification failures are reported in the response, never as errors.
pub async fn verify_and_record_workflow(
    state: &Arc<AppState>,
    request: &KycVerificationRequest,
) -> Result<KycVerificationResponse, AppError> {
    if request.email.trim().is_empty() {
        return Err(AppError::BadRequest("email is required".to_string()));
    }

    // 1. Resubmission cache
    let fingerprint = request_fingerprint(request);
    if let Some(cached) = state.recent_verifications.get(&fingerprint).await {
        if let Some(response) = ValidatedCacheEntry::restore_response(&cached) {
            tracing::info!(
                "Returning cached verification {} for resubmitted request",
                response.verification_id
            );
            return Ok(response);
        }
        state.recent_verifications.invalidate(&fingerprint).await;
    }

    // 2. Pure evaluation
    let verdict = evaluate(request).map_err(AppError::SlotMismatch)?;

    // 3. Record once per fingerprint; concurrent duplicates wait for this entry
    let entry = state
        .recent_verifications
        .try_get_with(fingerprint, record_and_notify(state, request, &verdict))
        .await
        .map_err(|e| AppError::InternalError(format!("Could not cache verification: {}", e)))?;

    ValidatedCacheEntry::restore_response(&entry).ok_or_else(|| {
        AppError::InternalError("Cached verification failed its integrity check".to_string())
    })
}

/// Stores and notifies one fresh verdict, returning the checksummed cache entry.
async fn record_and_notify(
    state: &Arc<AppState>,
    request: &KycVerificationRequest,
    verdict: &VerificationVerdict,
) -> Result<String, serde_json::Error> {
    let verification_id = Uuid::new_v4();
    tracing::info!(
        "Verification {}: final_status={}, age_verified={}, deepfake={}",
        verification_id,
        verdict.final_status,
        verdict.age_verified,
        verdict.deepfake.is_deepfake
    );

    let mut response = build_response(verification_id, request, verdict);

    let record = KycRecord::from_verdict(
        verification_id,
        &response.email,
        response.phone.as_deref(),
        verdict,
    );
    response.stored = match state.store.insert(&record).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Failed to store verification {}: {}", verification_id, e);
            false
        }
    };

    response.notifications = notify_all(&state.notifiers, &response).await;
    let sent = response.notifications.iter().filter(|n| n.sent).count();
    tracing::info!(
        "Verification {}: {}/{} notification(s) sent",
        verification_id,
        sent,
        response.notifications.len()
    );

    ValidatedCacheEntry::from_response(&response).map(|entry| entry.serialize())
}

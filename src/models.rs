use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Identity Models ============

/// Gender as printed on the ID document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

/// Structured fields recovered from one document's recognized text.
///
/// Every field is optional: a pattern that is not found is absent, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedIdentity {
    /// 12-digit national ID number, separators stripped.
    pub id_number: Option<String>,
    /// Date of birth in `DD/MM/YYYY` form.
    pub date_of_birth: Option<String>,
    /// 10-character tax ID (5 letters, 4 digits, 1 letter).
    pub tax_id: Option<String>,
    /// Gender, when printed literally as "Male" / "Female".
    pub gender: Option<Gender>,
}

/// Ordered list of slot-swap issues. Empty means every slot passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotIssues(Vec<String>);

impl SlotIssues {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, issue: impl Into<String>) {
        self.0.push(issue.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn issues(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for SlotIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

// ============ Face & Deepfake Signals ============

/// Cosine threshold above which two face embeddings are considered the same person.
pub const DEFAULT_FACE_MATCH_THRESHOLD: f64 = 0.6;

/// Result of the external face-comparison step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceSignal {
    /// Similarity in percent, 0..=100.
    pub similarity_percent: f64,
    /// Whether the comparison engine considers the faces a match.
    #[serde(rename = "match")]
    pub is_match: bool,
    /// Raw cosine similarity of the two embeddings, -1..=1.
    pub cosine: f64,
}

impl FaceSignal {
    /// Builds the signal from a raw cosine similarity.
    pub fn from_cosine(cosine: f64, threshold: f64) -> Self {
        let similarity = ((cosine + 1.0) / 2.0) * 100.0;
        Self {
            similarity_percent: round2(similarity),
            is_match: cosine >= threshold,
            cosine: (cosine * 10_000.0).round() / 10_000.0,
        }
    }

    /// Signal used when no face could be compared (no face found in either image).
    pub fn no_face() -> Self {
        Self {
            similarity_percent: 0.0,
            is_match: false,
            cosine: -1.0,
        }
    }
}

/// Raw image metrics supplied by the external image-metrics collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepfakeMetrics {
    /// Laplacian variance of the grayscale image.
    #[serde(default)]
    pub sharpness: f64,
    /// Standard deviation of grayscale intensity.
    #[serde(default)]
    pub noise_level: f64,
    /// Mean high-frequency DCT magnitude.
    #[serde(default)]
    pub artifact_score: f64,
    /// Eye-consistency score, 0..=1.
    #[serde(default)]
    pub consistency_score: f64,
    /// Mean per-channel HSV standard deviation.
    #[serde(default)]
    pub color_variance: f64,
}

impl DeepfakeMetrics {
    /// Maps the number of eyes detected inside the face region to a consistency score.
    pub fn consistency_from_eye_count(eyes_detected: u32) -> f64 {
        match eyes_detected {
            2 => 1.0,
            0 => 0.0,
            _ => 0.5,
        }
    }
}

/// Output of the deepfake heuristic scorer. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeepfakeVerdict {
    /// Manipulation probability, 0..=100.
    pub probability: f64,
    pub is_deepfake: bool,
    /// Confidence in the flag, 0..=100.
    pub confidence: f64,
}

impl DeepfakeVerdict {
    pub fn authenticity_score(&self) -> f64 {
        100.0 - self.probability
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_deepfake {
            "SUSPICIOUS - Potential Deepfake"
        } else {
            "AUTHENTIC - Real Image"
        }
    }

    pub fn recommendation(&self) -> &'static str {
        if self.is_deepfake {
            "Manual review required"
        } else {
            "Proceed with verification"
        }
    }
}

// ============ Verdict ============

/// Terminal outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    Verified,
    Review,
    RejectedDeepfake,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Verified => "VERIFIED",
            FinalStatus::Review => "REVIEW",
            FinalStatus::RejectedDeepfake => "REJECTED_DEEPFAKE",
        }
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FinalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VERIFIED" => Ok(FinalStatus::Verified),
            "REVIEW" => Ok(FinalStatus::Review),
            "REJECTED_DEEPFAKE" => Ok(FinalStatus::RejectedDeepfake),
            other => Err(format!("unknown final status: {}", other)),
        }
    }
}

/// Aggregated result of one verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub id_number: Option<String>,
    pub tax_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub age_verified: bool,
    pub face: FaceSignal,
    pub deepfake: DeepfakeVerdict,
    pub final_status: FinalStatus,
}

// ============ API Request/Response Models ============

/// Body of `POST /api/v1/kyc/verify`.
///
/// Carries the outputs of the external recognition, face and image-metric steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycVerificationRequest {
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Recognized text of the national-ID document.
    #[serde(default)]
    pub id_document_text: String,
    /// Recognized text of the tax-ID document.
    #[serde(default)]
    pub tax_document_text: String,
    /// Recognized text of the selfie.
    #[serde(default)]
    pub selfie_text: String,
    pub selfie_has_face: bool,
    /// Face comparison between the tax document photo and the selfie; absent when it failed.
    #[serde(default)]
    pub face: Option<FaceSignal>,
    #[serde(default)]
    pub metrics: DeepfakeMetrics,
}

/// Body of `POST /api/v1/kyc/extract`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

/// Rounded view of the deepfake verdict used in reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepfakeAnalysis {
    pub is_deepfake: bool,
    pub deepfake_probability: f64,
    pub authenticity_score: f64,
    pub confidence: f64,
    pub status: String,
    pub recommendation: String,
    pub metrics: DeepfakeMetricsReport,
}

/// Rounded raw metrics, with consistency expressed in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepfakeMetricsReport {
    pub image_sharpness: f64,
    pub noise_level: f64,
    pub compression_artifacts: f64,
    pub face_consistency: f64,
    pub color_variance: f64,
}

impl DeepfakeAnalysis {
    pub fn new(verdict: &DeepfakeVerdict, metrics: &DeepfakeMetrics) -> Self {
        Self {
            is_deepfake: verdict.is_deepfake,
            deepfake_probability: round2(verdict.probability),
            authenticity_score: round2(verdict.authenticity_score()),
            confidence: round2(verdict.confidence),
            status: verdict.status_label().to_string(),
            recommendation: verdict.recommendation().to_string(),
            metrics: DeepfakeMetricsReport {
                image_sharpness: round2(metrics.sharpness),
                noise_level: round2(metrics.noise_level),
                compression_artifacts: round2(metrics.artifact_score),
                face_consistency: round2(metrics.consistency_score * 100.0),
                color_variance: round2(metrics.color_variance),
            },
        }
    }
}

/// Outcome of one notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    /// Channel name ("email", "sms").
    pub channel: String,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl NotificationOutcome {
    pub fn sent(channel: &str, detail: Option<String>) -> Self {
        Self {
            channel: channel.to_string(),
            sent: true,
            detail,
        }
    }

    pub fn failed(channel: &str, detail: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            sent: false,
            detail: Some(detail.into()),
        }
    }
}

/// Response of `POST /api/v1/kyc/verify`; also the report handed to notifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycVerificationResponse {
    pub verification_id: Uuid,
    pub id_number: Option<String>,
    pub tax_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub age_verified: bool,
    pub similarity: f64,
    pub face_match: bool,
    pub deepfake_analysis: DeepfakeAnalysis,
    pub final_status: FinalStatus,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub stored: bool,
    #[serde(default)]
    pub notifications: Vec<NotificationOutcome>,
}

// ============ Persistence Models ============

/// Persisted verification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycRecord {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub id_number: Option<String>,
    pub tax_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub age_verified: bool,
    pub face_similarity: f64,
    pub face_match: bool,
    pub deepfake_probability: f64,
    pub is_deepfake: bool,
    pub final_status: FinalStatus,
    pub created_at: DateTime<Utc>,
}

impl KycRecord {
    pub fn from_verdict(
        id: Uuid,
        email: &str,
        phone: Option<&str>,
        verdict: &VerificationVerdict,
    ) -> Self {
        Self {
            id,
            email: email.to_string(),
            phone: phone.map(str::to_string),
            id_number: verdict.id_number.clone(),
            tax_id: verdict.tax_id.clone(),
            date_of_birth: verdict.date_of_birth.clone(),
            gender: verdict.gender,
            age_verified: verdict.age_verified,
            face_similarity: verdict.face.similarity_percent,
            face_match: verdict.face.is_match,
            deepfake_probability: round2(verdict.deepfake.probability),
            is_deepfake: verdict.deepfake.is_deepfake,
            final_status: verdict.final_status,
            created_at: Utc::now(),
        }
    }
}

/// Lookup filter for stored records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KycQuery {
    pub email: Option<String>,
    pub id: Option<Uuid>,
}

impl KycQuery {
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            id: None,
        }
    }

    pub fn matches(&self, record: &KycRecord) -> bool {
        self.email.as_ref().map_or(true, |e| *e == record.email)
            && self.id.map_or(true, |id| id == record.id)
    }
}

/// Rounds to two decimals for reporting.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

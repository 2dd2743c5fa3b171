//! Decision fusion: face similarity, deepfake flag and age into one final status
//!
//! Priority order:
//! 1. Deepfake flagged -> REJECTED_DEEPFAKE, regardless of everything else
//! 2. Similarity strictly above 75% and age verified -> VERIFIED
//! 3. Anything else -> REVIEW
//!
//! Slot-validation failures never reach this point; they reject upstream.

use crate::models::{DeepfakeVerdict, FaceSignal, FinalStatus};

/// Similarity (percent) that must be exceeded for automatic verification.
pub const VERIFIED_SIMILARITY_PERCENT: f64 = 75.0;

pub fn decide(face: &FaceSignal, deepfake: &DeepfakeVerdict, age_verified: bool) -> FinalStatus {
    if deepfake.is_deepfake {
        return FinalStatus::RejectedDeepfake;
    }

    if face.similarity_percent > VERIFIED_SIMILARITY_PERCENT && age_verified {
        FinalStatus::Verified
    } else {
        FinalStatus::Review
    }
}

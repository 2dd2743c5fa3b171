use crate::models::{KycVerificationRequest, KycVerificationResponse};
use sha2::{Digest, Sha256};

/// Integrity-checked entries for the recent-verification cache
///
/// A resubmitted request (same fingerprint) is answered from the cache instead
/// of producing a second record and a second round of notifications. Entries
/// carry a SHA-256 checksum of the serialized response; an entry that fails
/// validation is treated as a miss and the request is evaluated again.

/// Cached verification response plus its checksum.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// Serialized `KycVerificationResponse` (JSON string)
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded)
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = sha256_hex(data.as_bytes());
        Self { data, checksum }
    }

    /// Builds an entry from a finished verification.
    pub fn from_response(response: &KycVerificationResponse) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_string(response)?))
    }

    /// Returns true if the checksum matches, false if tampered
    pub fn is_valid(&self) -> bool {
        sha256_hex(self.data.as_bytes()) == self.checksum
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Returns Some(data) if valid, None if corrupted or invalid JSON
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }

    /// Validates a serialized entry and decodes the cached response.
    pub fn restore_response(serialized: &str) -> Option<KycVerificationResponse> {
        let data = Self::deserialize_and_validate(serialized)?;
        match serde_json::from_str(&data) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!("Cached verification could not be decoded: {}", e);
                None
            }
        }
    }
}

/// Stable key for a verification request: SHA-256 over its canonical JSON form.
///
/// Two submissions with the same contact details, texts, face signal and metrics
/// share a fingerprint.
pub fn request_fingerprint(request: &KycVerificationRequest) -> String {
    let canonical = serde_json::to_vec(request).unwrap_or_default();
    sha256_hex(&canonical)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

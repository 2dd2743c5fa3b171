//! Slot-swap detection for the three uploads
//!
//! Guards against a document uploaded into the wrong slot using weak signals:
//! the fields each document is expected to yield and how "document-like" the
//! selfie's recognized text is. Every rule is evaluated; issues accumulate.

use crate::extraction::{ID_NUMBER_RE, TAX_ID_RE};
use crate::models::SlotIssues;

/// Alphanumeric characters in a selfie's recognized text at which it counts as a document photo.
pub const SELFIE_TEXT_ALNUM_LIMIT: usize = 35;

pub const ID_SLOT_ISSUE: &str =
    "ID document upload does not look like an ID card (ID number/date of birth not detected).";
pub const TAX_SLOT_ISSUE: &str =
    "Tax document upload does not look like a tax ID card (tax ID number not detected).";
pub const SELFIE_NO_FACE_ISSUE: &str =
    "Selfie upload must be a clear face photo (no face detected).";
pub const SELFIE_DOCUMENT_ISSUE: &str = "Selfie upload looks like an ID/document photo (text/ID patterns detected). Please upload a real face selfie.";

/// Fields the slot rules look at, borrowed from the extraction results.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotFields<'a> {
    pub id_number: Option<&'a str>,
    pub date_of_birth: Option<&'a str>,
    pub tax_id: Option<&'a str>,
}

/// Checks all three slots and returns every triggered issue, in rule order.
///
/// A non-empty result must stop the verification before fusion.
pub fn validate_slots(fields: SlotFields<'_>, selfie_text: &str, selfie_has_face: bool) -> SlotIssues {
    let mut issues = SlotIssues::new();

    if fields.id_number.is_none() || fields.date_of_birth.is_none() {
        issues.push(ID_SLOT_ISSUE);
    }

    if fields.tax_id.is_none() {
        issues.push(TAX_SLOT_ISSUE);
    }

    if !selfie_has_face {
        issues.push(SELFIE_NO_FACE_ISSUE);
    }

    if selfie_looks_like_document(selfie_text) {
        issues.push(SELFIE_DOCUMENT_ISSUE);
    }

    if !issues.is_empty() {
        tracing::warn!("Slot validation failed with {} issue(s)", issues.len());
    }

    issues
}

/// True when the text contains a tax-ID pattern once uppercased.
pub fn looks_like_tax_id_text(text: &str) -> bool {
    !text.is_empty() && TAX_ID_RE.is_match(&text.to_uppercase())
}

/// True when the text contains a spaced or bare 12-digit ID number.
pub fn looks_like_id_number_text(text: &str) -> bool {
    !text.is_empty() && ID_NUMBER_RE.is_match(text)
}

/// A genuine face photo yields little machine-readable text; a card yields a lot.
pub fn selfie_looks_like_document(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    let upper = text.to_uppercase();
    if looks_like_tax_id_text(&upper) || looks_like_id_number_text(&upper) {
        return true;
    }

    alnum_len(&upper) >= SELFIE_TEXT_ALNUM_LIMIT
}

fn alnum_len(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).count()
}

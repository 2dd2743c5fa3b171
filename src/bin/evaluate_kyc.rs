//! Offline evaluator: runs one verification request file through the pure
//! pipeline and prints the verdict as JSON. Nothing is stored or sent.
//!
//! Usage: `evaluate_kyc <request.json>`

use anyhow::Context;
use rust_kyc_api::core::models::KycVerificationRequest;
use rust_kyc_api::core::verification::evaluate;
use serde_json::json;
use std::env;

fn main() -> anyhow::Result<()> {
    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: evaluate_kyc <request.json>"))?;

    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let request: KycVerificationRequest =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;

    let output = match evaluate(&request) {
        Ok(verdict) => json!({ "verdict": verdict }),
        Err(issues) => json!({
            "error": "Invalid / mismatched uploads",
            "issues": issues,
        }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

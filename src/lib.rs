//! KYC Verification API Library
//!
//! Identity-verification core for KYC onboarding: field extraction from
//! recognized document text, slot-swap detection, heuristic deepfake scoring
//! and decision fusion, plus the HTTP service around them.
//!
//! # Modules
//!
//! - `api`: HTTP surface (handlers, errors).
//! - `core`: Pure verification logic.
//! - `integrations`: Storage and notification collaborators.
//! - `cache_validator`: Checksummed cache entries and request fingerprints.
//! - `circuit_breaker`: Circuit breaker for outbound notifications.
//! - `config`: Configuration management.
//! - `db`: Database connection and store selection.
//! - `db_storage`: KYC record persistence.
//! - `decision`: Final status fusion.
//! - `deepfake`: Heuristic deepfake scoring.
//! - `errors`: Error handling types.
//! - `extraction`: Field extraction from recognized text.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `notify`: Email and SMS notifiers.
//! - `slot_validation`: Upload slot-swap detection.
//! - `verification`: End-to-end verification workflow.

pub mod api;
pub mod core;
pub mod integrations;

pub mod cache_validator;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod decision;
pub mod deepfake;
pub mod errors;
pub mod extraction;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod slot_validation;
pub mod verification;

//! MediSync server
//!
//! HTTP service around the terminology core:
//! - CSV ingestion into versioned, append-only CodeSystems
//! - Ranked search, `$lookup` and CodeSystem reads over the latest versions
//! - Bundle upload with per-entry dual-coding validation and write-through
//! - Optional ICD-11 classification authority lookups

#![allow(clippy::large_enum_variant)]

pub mod api;
pub mod classification;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod request_context;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;

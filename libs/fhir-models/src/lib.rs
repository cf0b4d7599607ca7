//! FHIR data models for the MediSync terminology service
//!
//! Strongly-typed shapes for the resources that cross the service boundary:
//! CodeSystem (ingestion output), ValueSet expansions (search output), Bundle
//! (clinical uploads and their responses), OperationOutcome and Parameters.
//!
//! # Design Philosophy
//!
//! - **Version-agnostic core**: only fields shared by FHIR R4 and R5
//! - **Extensible**: a flattened `extensions` map keeps unknown properties
//! - **Compatible**: every model converts to and from `serde_json::Value`
//!
//! # Example
//!
//! ```rust
//! use medisync_models::common::{Bundle, BundleType};
//! use serde_json::json;
//!
//! let bundle: Bundle = serde_json::from_value(json!({
//!     "resourceType": "Bundle",
//!     "type": "collection",
//!     "entry": []
//! }))
//! .unwrap();
//! assert_eq!(bundle.bundle_type, BundleType::Collection);
//! ```

pub mod common;

// Re-export commonly used types
pub use common::*;

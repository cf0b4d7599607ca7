//! Request handlers
//!
//! Handlers extract and check request parameters, call a service and shape
//! the response; all business rules live in the services.

pub mod bundle;
pub mod ingest;
pub mod metrics;
pub mod terminology;

//! Business services behind the HTTP handlers

pub mod audit;
pub mod bundle;
pub mod ingestion;
pub mod terminology;

pub use audit::AuditService;
pub use bundle::{BundleService, BundleSettings, StoreSink};
pub use ingestion::IngestionService;
pub use terminology::TerminologyService;

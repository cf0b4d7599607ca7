//! Records persisted by the terminology store

pub mod audit;
pub mod code_system;

pub use audit::AuditRecord;
pub use code_system::StoredCodeSystem;

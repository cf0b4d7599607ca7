//! Persistence for code system versions, accepted clinical entries and audit rows

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::TerminologyStore;

//! Terminology core for MediSync
//!
//! The pieces, leaf first:
//!
//! - [`normalize`]: tabular rows to canonical [`CodeEntry`] records
//! - [`builder`]: normalized entries to an immutable, versioned [`CodeSystemSnapshot`]
//! - [`index`]: token/prefix search over the latest snapshot of every code system,
//!   published through a swappable [`IndexHandle`]
//! - [`resolver`]: the `resolve(system, code)` capability used by validation
//! - [`validator`]: per-entry checks of dual-coded clinical records
//! - [`processor`]: whole-bundle orchestration with per-entry results
//! - [`ingest`]: the CSV pipeline chaining header parsing, normalization and building
//!
//! Nothing in this crate performs HTTP or database I/O; persistence and remote
//! lookups reach it through the [`EntrySink`] and [`CodeResolver`] traits.
//!
//! # Example
//!
//! ```rust
//! use medisync_terminology::{ingest, IngestRequest, SearchIndex};
//!
//! let csv = "code,display\nNAM001,Vataja Jvara\nNAM002,Kasa\n";
//! let request = IngestRequest::new("NAMASTE", "http://terminology.india.gov.in/namaste");
//! let report = ingest(csv.as_bytes(), &request, 0).unwrap();
//! assert_eq!(report.code_system.count(), 2);
//!
//! let index = SearchIndex::build([report.code_system.into()]);
//! let page = index.search("jva", 20, 0);
//! assert_eq!(page.total, 1);
//! ```

pub mod builder;
pub mod clinical;
pub mod error;
pub mod index;
pub mod ingest;
pub mod normalize;
pub mod processor;
pub mod resolver;
pub mod text;
pub mod validator;

pub use builder::{build, CodeSystemSnapshot};
pub use clinical::ClinicalEntry;
pub use error::{BuildError, FatalMalformation, IngestError, ProcessError, SinkError};
pub use index::{IndexHandle, MatchRank, SearchHit, SearchIndex, SearchLimits, SearchPage};
pub use ingest::{ingest, parse_delimiter, IngestRequest, IngestionReport};
pub use normalize::{
    normalize, normalize_rows, CodeEntry, Column, Header, NormalizedBatch, RawRow, RowError,
    RowReason, RowWarning,
};
pub use processor::{
    bundle_entries, BundleProcessor, DiscardSink, EntryResult, EntrySink, ProcessSummary,
    ProcessedBundle,
};
pub use resolver::{CodeResolver, Resolution};
pub use validator::{
    EntryValidator, TransactionOutcome, ValidationIssue, ValidationMode, Verdict,
    DEFAULT_CLASSIFICATION_SYSTEMS,
};

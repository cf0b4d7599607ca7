//! Version-agnostic FHIR models
//!
//! Types that work across FHIR R4, R4B, and R5

pub mod bundle;
pub mod code_system;
pub mod complex;
pub mod error;
pub mod operation_outcome;
pub mod parameters;
pub mod value_set;

// Re-export commonly used types
pub use bundle::*;
pub use code_system::*;
pub use complex::*;
pub use error::{Error, Result};
pub use operation_outcome::*;
pub use parameters::*;
pub use value_set::*;

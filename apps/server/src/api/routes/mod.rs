//! Route tables, one per API area

pub mod bundle;
pub mod metrics;
pub mod terminology;

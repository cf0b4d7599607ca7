//! Code resolution capability
//!
//! The validator never looks codes up itself; it is handed a [`CodeResolver`].
//! Local codes resolve against the search index, classification codes may
//! resolve against a remote authority.

use crate::index::{IndexHandle, SearchIndex};
use crate::normalize::CodeEntry;
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome of resolving one `(system, code)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(CodeEntry),
    /// The system answered and does not know the code
    NotFound,
    /// The system could not be asked; carries the reason
    Unreachable(String),
}

#[async_trait]
pub trait CodeResolver: Send + Sync {
    async fn resolve(&self, system: &str, code: &str) -> Resolution;
}

#[async_trait]
impl CodeResolver for SearchIndex {
    async fn resolve(&self, system: &str, code: &str) -> Resolution {
        match self.lookup(system, code) {
            Some(entry) => Resolution::Found(entry.clone()),
            None => Resolution::NotFound,
        }
    }
}

/// Resolves against whichever index is installed at call time
#[async_trait]
impl CodeResolver for IndexHandle {
    async fn resolve(&self, system: &str, code: &str) -> Resolution {
        self.snapshot().resolve(system, code).await
    }
}

#[async_trait]
impl<T: CodeResolver + ?Sized> CodeResolver for Arc<T> {
    async fn resolve(&self, system: &str, code: &str) -> Resolution {
        (**self).resolve(system, code).await
    }
}

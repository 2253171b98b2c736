//! Products: the files and relations Tasks materialize. Each Product is
//! owned by exactly one Task and knows only how to identify, probe, and
//! persist metadata for itself — outdatedness (comparing that metadata
//! against upstream and the task's current source) is a Dag-level decision
//! (§4.4, §4.8), not something a Product judges on its own.

pub mod file;
pub mod meta;
pub mod relation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifier::Identifier;
use crate::params::Params;

pub use file::FileProduct;
pub use meta::MetaProduct;
pub use relation::RelationProduct;

/// The persisted bookkeeping a Product carries alongside its data: when it
/// was last built, and the source code that built it. Absent fields (a
/// Product that has never been built) are `None`, never a sentinel value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: Option<f64>,
    pub stored_source_code: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.stored_source_code.is_none()
    }
}

#[async_trait]
pub trait Product: Send + Sync {
    fn identifier(&self) -> &Identifier;
    fn identifier_mut(&mut self) -> &mut Identifier;

    /// Whether the underlying file/relation is currently present in its
    /// backend. A missing Product is always data-outdated regardless of
    /// metadata (§4.4 edge case).
    async fn exists(&self) -> Result<bool>;

    /// Reads this Product's persisted metadata. Returns
    /// [`Metadata::default`] (both fields `None`) if none has ever been
    /// saved, never an error.
    async fn fetch_metadata(&self) -> Result<Metadata>;

    /// Persists `metadata`, overwriting whatever was stored before. Called
    /// only after a Task's `run()` succeeds (§4.6).
    async fn save_metadata(&self, metadata: &Metadata) -> Result<()>;

    /// Removes the underlying file/relation and its metadata. Idempotent:
    /// deleting an already-absent Product is not an error. `force` lets a
    /// caller insist on removal even when the backend would otherwise
    /// refuse (e.g. a relation with dependents); backends with no such
    /// distinction ignore it.
    async fn delete(&self, force: bool) -> Result<()>;

    /// Renders this Product's identifier against `params`. The default
    /// implementation simply renders the identifier; composite Products
    /// (e.g. [`MetaProduct`]) override it to fan out to their members.
    fn render(&mut self, params: &mut Params) -> Result<()> {
        self.identifier_mut().render(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metadata_is_empty() {
        assert!(Metadata::default().is_empty());
    }

    #[test]
    fn metadata_with_timestamp_is_not_empty() {
        let m = Metadata {
            timestamp: Some(1.0),
            stored_source_code: None,
        };
        assert!(!m.is_empty());
    }
}

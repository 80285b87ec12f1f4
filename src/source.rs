//! Citation source adapters.
//!
//! A loader is configured with a list of sources. Each one fetches and normalizes the
//! citations of a paper; its [`Requirement`] decides whether a failure aborts the load.

use crate::error::Result;
use crate::merge::KeyedCitation;
use crate::table::Provenance;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait CitationSource: Send + Sync {
    /// Provenance recorded on rows this source contributes
    fn provenance(&self) -> Provenance;

    /// Normalized citations of the paper identified by `paper_doi`
    async fn fetch(&self, paper_doi: &str) -> Result<Vec<KeyedCitation>>;
}

/// What a source's failure means for the whole load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Failure aborts the load
    Required,
    /// Failure is logged and the source contributes nothing
    Optional,
}

#[derive(Clone)]
pub struct SourceSlot {
    pub source: Arc<dyn CitationSource>,
    pub requirement: Requirement,
}

impl SourceSlot {
    pub fn required(source: impl CitationSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            requirement: Requirement::Required,
        }
    }

    pub fn optional(source: impl CitationSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            requirement: Requirement::Optional,
        }
    }
}

impl fmt::Debug for SourceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSlot")
            .field("source", &self.source.provenance())
            .field("requirement", &self.requirement)
            .finish()
    }
}

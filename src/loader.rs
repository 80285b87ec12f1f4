//! Citation loading.
//!
//! Reads the cache unless a refresh is forced, otherwise fetches every configured source
//! concurrently, merges the batches and writes the result back to the cache. A failed
//! load never touches the cache.

use crate::cache::{cache_key, CacheStore};
use crate::config::{DashboardConfig, SourceMode};
use crate::error::{DashboardError, Result};
use crate::merge::{merge_batches, SourceBatch};
use crate::openalex::{OpenAlexClient, OpenAlexSource};
use crate::semanticscholar::{SemanticScholarClient, SemanticScholarSource};
use crate::source::{Requirement, SourceSlot};
use crate::table::CitationTable;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Where a loaded table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOrigin {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub table: CitationTable,
    pub origin: LoadOrigin,
    /// When the table was cached; `None` for a fresh network load
    pub cached_at: Option<DateTime<Utc>>,
}

pub struct CitationLoader {
    paper_doi: String,
    sources: Vec<SourceSlot>,
    cache: Arc<dyn CacheStore>,
    // Serializes loads so a forced refresh cannot race an in-flight one
    in_flight: Mutex<()>,
}

impl CitationLoader {
    /// `sources[0]` is the primary source: its rows win on identity collisions.
    pub fn new(
        paper_doi: impl Into<String>,
        sources: Vec<SourceSlot>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(DashboardError::Config("at least one citation source is required".to_string()));
        }
        Ok(Self {
            paper_doi: paper_doi.into(),
            sources,
            cache,
            in_flight: Mutex::new(()),
        })
    }

    /// OpenAlex (required), plus Semantic Scholar in dual mode.
    pub fn from_config(config: &DashboardConfig, cache: Arc<dyn CacheStore>) -> Result<Self> {
        let mut sources = vec![SourceSlot::required(OpenAlexSource::new(OpenAlexClient::new(config)?))];

        if config.source_mode == SourceMode::Dual {
            let secondary = SemanticScholarSource::new(SemanticScholarClient::new(config)?);
            sources.push(if config.require_semantic_scholar {
                SourceSlot::required(secondary)
            } else {
                SourceSlot::optional(secondary)
            });
        }

        Self::new(config.paper_doi.clone(), sources, cache)
    }

    pub fn paper_doi(&self) -> &str {
        &self.paper_doi
    }

    /// `Single` when only one source is configured
    pub fn source_mode(&self) -> SourceMode {
        if self.sources.len() == 1 {
            SourceMode::Single
        } else {
            SourceMode::Dual
        }
    }

    pub fn cache_key(&self) -> String {
        cache_key(&self.paper_doi, self.source_mode())
    }

    /// Load the citation table, bypassing the cache read when `force_refresh` is set.
    pub async fn load(&self, force_refresh: bool) -> Result<LoadOutcome> {
        let _guard = self.in_flight.lock().await;
        let key = self.cache_key();

        if !force_refresh {
            match self.cache.get(&key) {
                Ok(Some(entry)) => {
                    info!(key = %key, rows = entry.table.len(), "Cache hit");
                    return Ok(LoadOutcome {
                        table: entry.table,
                        origin: LoadOrigin::Cache,
                        cached_at: Some(entry.stored_at),
                    });
                }
                Ok(None) => debug!(key = %key, "Cache miss"),
                Err(e) => warn!(key = %key, error = %e, "Ignoring unreadable cache entry"),
            }
        }

        info!(paper = %self.paper_doi, sources = self.sources.len(), force_refresh, "Loading citations");

        let batches = self.fetch_all().await?;
        let table = merge_batches(batches);
        let table = if self.source_mode() == SourceMode::Single {
            table.into_single_source()
        } else {
            table
        };

        if let Err(e) = self.cache.set(&key, &table) {
            warn!(key = %key, error = %e, "Failed to cache citations");
        }

        info!(rows = table.len(), "Citations loaded");
        Ok(LoadOutcome {
            table,
            origin: LoadOrigin::Network,
            cached_at: None,
        })
    }

    async fn fetch_all(&self) -> Result<Vec<SourceBatch>> {
        let doi = self.paper_doi.as_str();

        try_join_all(self.sources.iter().map(|slot| async move {
            let provenance = slot.source.provenance();
            match slot.source.fetch(doi).await {
                Ok(citations) => Ok(SourceBatch::new(provenance, citations)),
                Err(e) if slot.requirement == Requirement::Optional => {
                    warn!(source = %provenance, error = %e, "Optional source failed, continuing without it");
                    Ok(SourceBatch::empty(provenance))
                }
                Err(e) => {
                    error!(source = %provenance, error = %e, "Required source failed");
                    Err(e)
                }
            }
        }))
        .await
    }
}

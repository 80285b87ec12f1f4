//! Dashboard configuration.
//!
//! Defaults match the hosted dashboard. A JSON file (`--config`) can override any field;
//! command-line flags override the file.

use crate::error::{DashboardError, Result};
use crate::openalex::OPENALEX_API_BASE;
use crate::paginate::{PageOptions, DEFAULT_MAX_PAGES};
use crate::semanticscholar::SS_API_BASE;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paper tracked when none is configured
pub const DEFAULT_PAPER_DOI: &str = "10.48550/arXiv.2309.08532";

/// Contact address sent to OpenAlex for the polite pool
pub const DEFAULT_MAILTO: &str = "citedash@example.com";

/// Which APIs feed the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// OpenAlex and Semantic Scholar, merged
    #[default]
    Dual,
    /// OpenAlex only
    Single,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub paper_doi: String,
    pub mailto: String,
    pub openalex_base_url: String,
    pub semantic_scholar_base_url: String,
    pub semantic_scholar_api_key: Option<String>,
    /// Pause between OpenAlex pages
    pub page_delay_ms: u64,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub source_mode: SourceMode,
    /// Make a Semantic Scholar failure abort the load instead of being skipped
    pub require_semantic_scholar: bool,
    /// Cache file; `None` uses `~/.citedash_cache.json`
    pub cache_path: Option<PathBuf>,
    /// Candidate URLs for the CSV variant, tried in order
    pub csv_candidates: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            paper_doi: DEFAULT_PAPER_DOI.to_string(),
            mailto: DEFAULT_MAILTO.to_string(),
            openalex_base_url: OPENALEX_API_BASE.to_string(),
            semantic_scholar_base_url: SS_API_BASE.to_string(),
            semantic_scholar_api_key: None,
            page_delay_ms: 100,
            max_pages: DEFAULT_MAX_PAGES,
            timeout_secs: 30,
            source_mode: SourceMode::Dual,
            require_semantic_scholar: false,
            cache_path: None,
            csv_candidates: Vec::new(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file; missing fields take their defaults. Call [`Self::validate`]
    /// once overrides are applied.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| DashboardError::Config(format!("Invalid config {:?}: {}", path, e)))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let doi_regex = Regex::new(r"^10\.\d{4,9}/\S+$").map_err(|e| DashboardError::Config(e.to_string()))?;
        if !doi_regex.is_match(self.paper_doi.trim()) {
            return Err(DashboardError::Config(format!("Invalid paper DOI: {:?}", self.paper_doi)));
        }
        if self.max_pages == 0 {
            return Err(DashboardError::Config("max_pages must be at least 1".to_string()));
        }
        for base in [&self.openalex_base_url, &self.semantic_scholar_base_url] {
            url::Url::parse(base)
                .map_err(|e| DashboardError::Config(format!("Invalid base URL {}: {}", base, e)))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_options(&self) -> PageOptions {
        PageOptions {
            page_delay: Duration::from_millis(self.page_delay_ms),
            max_pages: self.max_pages,
        }
    }
}

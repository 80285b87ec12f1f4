//! # citedash
//!
//! Citation dashboard for a single paper: who cites it, merged from OpenAlex and Semantic Scholar
//!
//! ## Modules
//!
//! - [`openalex`] - OpenAlex work lookup and cursor-paginated citing works
//! - [`semanticscholar`] - Semantic Scholar citation list
//! - [`merge`] - Identity keys and provenance-aware merging
//! - [`loader`] - Cache-aside loading over the configured sources
//! - [`cache`] - Memory and JSON-file cache stores
//! - [`csv_table`] - Pre-built CSV table fallback and CSV export
//! - [`bibtex`] - BibTeX export
//! - [`server`] - JSON HTTP API
//! - [`lenient`] - Tolerant decoding of API payloads
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use citedash::{cache::MemoryStore, config::DashboardConfig, loader::CitationLoader};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DashboardConfig::default();
//!     let loader = CitationLoader::from_config(&config, Arc::new(MemoryStore::new()))?;
//!     let outcome = loader.load(false).await?;
//!     println!("Found {} citations", outcome.table.len());
//!     Ok(())
//! }
//! ```

pub mod bibtex;
pub mod cache;
pub mod config;
pub mod csv_table;
pub mod error;
pub mod lenient;
pub mod loader;
pub mod merge;
pub mod openalex;
pub mod paginate;
pub mod semanticscholar;
pub mod server;
pub mod source;
pub mod table;

pub use error::{DashboardError, Result};

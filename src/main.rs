//! citedash - Citation Dashboard
//!
//! Collects the papers citing one DOI from OpenAlex and Semantic Scholar, merges them
//! into a single table and exports citations as BibTeX.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! citedash fetch --refresh
//! citedash search "language model"
//! citedash bibtex --doi 10.1/x --title "Paper X" --year 2020
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! citedash serve --port 3000
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use citedash::{
    bibtex,
    cache::{cache_key, CacheStore, FileStore},
    config::{DashboardConfig, SourceMode},
    csv_table,
    loader::{CitationLoader, LoadOrigin, LoadOutcome},
    server::{self, AppState},
    table::CitationTable,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Citation dashboard - merged OpenAlex and Semantic Scholar citations for a paper
#[derive(Parser)]
#[command(name = "citedash")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// JSON config file (flags override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// DOI of the cited paper
    #[arg(long, global = true)]
    doi: Option<String>,

    /// Contact email for the OpenAlex polite pool
    #[arg(long, global = true)]
    mailto: Option<String>,

    /// Only use OpenAlex
    #[arg(long, global = true)]
    single_source: bool,

    /// Fail the load when Semantic Scholar fails instead of skipping it
    #[arg(long, global = true)]
    require_semantic_scholar: bool,

    /// Semantic Scholar API key
    #[arg(long, global = true)]
    s2_api_key: Option<String>,

    /// Stop paginating OpenAlex after this many pages
    #[arg(long, global = true)]
    max_pages: Option<usize>,

    /// Cache file (default: ~/.citedash_cache.json)
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the citation table
    Fetch {
        /// Ignore the cache and re-fetch
        #[arg(long)]
        refresh: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show citations whose title contains a term
    Search {
        /// Case-insensitive title substring
        term: String,

        /// Ignore the cache and re-fetch
        #[arg(long)]
        refresh: bool,
    },

    /// Summarize the citation table
    Stats {
        /// Ignore the cache and re-fetch
        #[arg(long)]
        refresh: bool,
    },

    /// Write a BibTeX file for one citation
    Bibtex {
        /// DOI of the citing paper (may be empty)
        #[arg(long, default_value = "")]
        doi: String,

        /// Title of the citing paper
        #[arg(long)]
        title: String,

        /// Publication year
        #[arg(long, default_value = "-")]
        year: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Load a pre-built CSV table from the first reachable URL
    Csv {
        /// Candidate URL, tried in the order given
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Manage the citation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Drop the cached table of the configured paper
    Clear {
        /// Delete the whole cache file
        #[arg(long)]
        all: bool,
    },
    /// Show cache file path
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.log_json);

    let config = build_config(&cli)?;
    let store = Arc::new(open_store(&config)?);

    match cli.command {
        Commands::Fetch {
            refresh,
            format,
            output,
        } => {
            let outcome = load(&config, store, refresh).await?;
            print_origin(&outcome);
            emit(&outcome.table, format, output.as_deref())
        }
        Commands::Search { term, refresh } => {
            let outcome = load(&config, store, refresh).await?;
            let filtered = outcome.table.filter_by_title(&term);
            println!("{} of {} citations match {:?}", filtered.len(), outcome.table.len(), term);
            emit(&filtered, OutputFormat::Table, None)
        }
        Commands::Stats { refresh } => {
            let outcome = load(&config, store, refresh).await?;
            print_stats(&config, &outcome);
            Ok(())
        }
        Commands::Bibtex {
            doi,
            title,
            year,
            output_dir,
        } => write_bibtex(&doi, &title, &year, &output_dir),
        Commands::Csv { urls, format } => {
            let candidates = if urls.is_empty() { config.csv_candidates.clone() } else { urls };
            let client = reqwest::Client::builder()
                .timeout(config.timeout())
                .build()
                .context("Failed to build HTTP client")?;
            let table = csv_table::fetch_first_available(&client, &candidates)
                .await
                .context("Failed to load CSV table")?;
            emit(&table, format, None)
        }
        Commands::Cache { action } => handle_cache(action, &config, &store),
        Commands::Serve { port, host } => run_server(&config, store, host, port).await,
    }
}

fn init_logging(debug: bool, json: bool) {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }
}

/// Defaults, then the config file, then command-line flags
fn build_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => DashboardConfig::default(),
    };

    let args = &cli.sources;
    if let Some(doi) = &args.doi {
        config.paper_doi = doi.clone();
    }
    if let Some(mailto) = &args.mailto {
        config.mailto = mailto.clone();
    }
    if args.single_source {
        config.source_mode = SourceMode::Single;
    }
    if args.require_semantic_scholar {
        config.require_semantic_scholar = true;
    }
    if let Some(key) = &args.s2_api_key {
        config.semantic_scholar_api_key = Some(key.clone());
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(path) = &args.cache_file {
        config.cache_path = Some(path.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_store(config: &DashboardConfig) -> Result<FileStore> {
    match &config.cache_path {
        Some(path) => Ok(FileStore::with_path(path.clone())),
        None => FileStore::new().context("Failed to locate cache file"),
    }
}

async fn load(config: &DashboardConfig, store: Arc<FileStore>, refresh: bool) -> Result<LoadOutcome> {
    let loader = CitationLoader::from_config(config, store)?;
    loader
        .load(refresh)
        .await
        .context("Failed to load citations")
}

fn print_origin(outcome: &LoadOutcome) {
    match (outcome.origin, outcome.cached_at) {
        (LoadOrigin::Cache, Some(at)) => eprintln!("Loaded from cache (stored {})", at.format("%Y-%m-%d %H:%M:%S UTC")),
        (LoadOrigin::Cache, None) => eprintln!("Loaded from cache"),
        (LoadOrigin::Network, _) => eprintln!("Fetched {} citations", outcome.table.len()),
    }
}

// ============================================================================
// Output
// ============================================================================

fn emit(table: &CitationTable, format: OutputFormat, output: Option<&std::path::Path>) -> Result<()> {
    let rendered = match format {
        OutputFormat::Table => render_table(table),
        OutputFormat::Json => serde_json::to_string_pretty(table).context("Failed to serialize table")?,
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            csv_table::write_table(table, &mut buf).context("Failed to write CSV")?;
            String::from_utf8(buf).context("CSV output is not UTF-8")?
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved: {:?}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Plain-text table; the link column is left out to keep rows readable
fn render_table(table: &CitationTable) -> String {
    let columns: Vec<&String> = table.headers.iter().filter(|h| h.as_str() != "link").collect();

    let mut widths: Vec<usize> = columns.iter().map(|h| h.len()).collect();
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|h| truncate(&row.field(h), 80))
                .collect()
        })
        .collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_line = |values: Vec<String>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(columns.iter().map(|h| capitalize(h)).collect())];
    lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    lines.extend(cells.into_iter().map(format_line));
    lines.join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max - 3).collect();
        format!("{}...", cut)
    }
}

fn print_stats(config: &DashboardConfig, outcome: &LoadOutcome) {
    let stats = outcome.table.stats();
    let years: Vec<&str> = stats.years.keys().map(String::as_str).collect();
    let updated = outcome.cached_at.unwrap_or_else(chrono::Utc::now);

    println!("Citation Analysis for {}", config.paper_doi);
    println!("Total Citations: {}", stats.total);
    if config.source_mode == SourceMode::Dual {
        println!("Peer-reviewed: {} | Pre-prints: {}", stats.peer_reviewed, stats.preprints);
    }
    println!("Years: {}", years.join(", "));
    println!("Last Updated: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    match config.source_mode {
        SourceMode::Dual => println!("Data sources: OpenAlex API + Semantic Scholar API"),
        SourceMode::Single => println!("Data source: OpenAlex API"),
    }
}

fn write_bibtex(doi: &str, title: &str, year: &str, output_dir: &std::path::Path) -> Result<()> {
    let export = bibtex::export(doi, title, year);
    std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;
    let path = output_dir.join(&export.filename);
    std::fs::write(&path, &export.contents).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved: {:?}", path);
    Ok(())
}

// ============================================================================
// Cache Management
// ============================================================================

fn handle_cache(action: CacheAction, config: &DashboardConfig, store: &FileStore) -> Result<()> {
    match action {
        CacheAction::Clear { all: true } => {
            store.clear()?;
            println!("Cache cleared.");
        }
        CacheAction::Clear { all: false } => {
            for mode in [SourceMode::Dual, SourceMode::Single] {
                store.remove(&cache_key(&config.paper_doi, mode))?;
            }
            println!("Cleared cached citations for {}.", config.paper_doi);
        }
        CacheAction::Path => {
            println!("Cache file: {:?}", store.path());
        }
    }
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(config: &DashboardConfig, store: Arc<FileStore>, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, paper = %config.paper_doi, "Starting HTTP server");

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let loader = CitationLoader::from_config(config, store)?;
    let state = Arc::new(AppState::new(loader));

    println!("Listening on http://{}", addr);
    server::run(addr, state).await.context("Server error")
}

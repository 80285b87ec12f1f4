//! JSON HTTP API for dashboard front-ends.
//!
//! Routes:
//! - `GET /health`
//! - `GET /citations?refresh=true` - merged table (cached unless refreshed)
//! - `GET /citations/search?q=term` - rows whose title contains `term`
//! - `GET /citations/stats` - totals, status and year counts
//! - `GET /bibtex?doi=&title=&year=` - `.bib` download

use crate::bibtex;
use crate::error::{DashboardError, Result};
use crate::loader::{CitationLoader, LoadOrigin, LoadOutcome};
use crate::table::{CitationTable, TableStats};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared server state
pub struct AppState {
    loader: CitationLoader,
    // Last successfully loaded table, returned alongside load errors
    last_table: RwLock<Option<CitationTable>>,
}

impl AppState {
    pub fn new(loader: CitationLoader) -> Self {
        Self {
            loader,
            last_table: RwLock::new(None),
        }
    }

    async fn load(&self, force_refresh: bool) -> std::result::Result<LoadOutcome, ApiError> {
        match self.loader.load(force_refresh).await {
            Ok(outcome) => {
                *self.last_table.write().await = Some(outcome.table.clone());
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Error loading citations");
                Err(ApiError {
                    message: format!("Failed to load citations: {}", e),
                    previous: self.last_table.read().await.clone(),
                })
            }
        }
    }
}

/// Load failure; the previously served table is left intact and echoed back
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(rename = "error")]
    message: String,
    previous: Option<CitationTable>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, Json(self)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CitationsParams {
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct BibtexParams {
    #[serde(default)]
    doi: String,
    title: String,
    #[serde(default)]
    year: String,
}

#[derive(Debug, Serialize)]
struct CitationsResponse {
    paper: String,
    origin: LoadOrigin,
    cached_at: Option<DateTime<Utc>>,
    count: usize,
    #[serde(flatten)]
    table: CitationTable,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    paper: String,
    last_updated: DateTime<Utc>,
    #[serde(flatten)]
    stats: TableStats,
}

/// Build the router with tracing and permissive CORS for browser front-ends
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/citations", get(citations_handler))
        .route("/citations/search", get(search_handler))
        .route("/citations/stats", get(stats_handler))
        .route("/bibtex", get(bibtex_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the process is stopped
pub async fn run(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");
    axum::serve(listener, router(state))
        .await
        .map_err(DashboardError::Io)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn citations_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CitationsParams>,
) -> std::result::Result<Json<CitationsResponse>, ApiError> {
    info!(refresh = params.refresh, "Citations request");
    let outcome = state.load(params.refresh).await?;

    Ok(Json(CitationsResponse {
        paper: state.loader.paper_doi().to_string(),
        origin: outcome.origin,
        cached_at: outcome.cached_at,
        count: outcome.table.len(),
        table: outcome.table,
    }))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<CitationTable>, ApiError> {
    let outcome = state.load(false).await?;
    Ok(Json(outcome.table.filter_by_title(&params.q)))
}

async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<StatsResponse>, ApiError> {
    let outcome = state.load(false).await?;
    Ok(Json(StatsResponse {
        paper: state.loader.paper_doi().to_string(),
        last_updated: outcome.cached_at.unwrap_or_else(Utc::now),
        stats: outcome.table.stats(),
    }))
}

async fn bibtex_handler(Query(params): Query<BibtexParams>) -> impl IntoResponse {
    let export = bibtex::export(&params.doi, &params.title, &params.year);
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.contents,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::merge::{identity_key, KeyedCitation};
    use crate::source::{CitationSource, SourceSlot};
    use crate::table::{CitationRecord, Provenance, PublicationStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ToggleSource {
        failing: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CitationSource for ToggleSource {
        fn provenance(&self) -> Provenance {
            Provenance::OpenAlex
        }

        async fn fetch(&self, _paper_doi: &str) -> Result<Vec<KeyedCitation>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DashboardError::Api {
                    code: 503,
                    message: "OpenAlex HTTP 503".to_string(),
                });
            }
            Ok(["Graph Paper", "Language Paper"]
                .into_iter()
                .enumerate()
                .map(|(i, title)| {
                    let doi = format!("10.1/{}", i);
                    KeyedCitation {
                        key: identity_key(&doi, Some(title)),
                        record: CitationRecord {
                            year: Some(2024),
                            title: title.to_string(),
                            link: format!("https://doi.org/{}", doi),
                            doi,
                            status: Some(PublicationStatus::PeerReviewed),
                            source: Some(Provenance::OpenAlex),
                        },
                    }
                })
                .collect())
        }
    }

    async fn spawn_server() -> (SocketAddr, Arc<AtomicBool>) {
        let failing = Arc::new(AtomicBool::new(false));
        let loader = CitationLoader::new(
            "10.1/paper",
            vec![SourceSlot::required(ToggleSource { failing: failing.clone() })],
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let state = Arc::new(AppState::new(loader));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        (addr, failing)
    }

    #[tokio::test]
    async fn test_citations_search_and_stats() {
        let (addr, _) = spawn_server().await;

        let body: serde_json::Value = reqwest::get(format!("http://{}/citations", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["count"], 2);
        assert_eq!(body["origin"], "network");
        assert_eq!(body["headers"][0], "year");

        let search: CitationTable = reqwest::get(format!("http://{}/citations/search?q=language", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search.rows[0].title, "Language Paper");

        let stats: serde_json::Value = reqwest::get(format!("http://{}/citations/stats", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["total"], 2);
        assert_eq!(stats["years"]["2024"], 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_returns_previous_table() {
        let (addr, failing) = spawn_server().await;

        let ok = reqwest::get(format!("http://{}/citations", addr)).await.unwrap();
        assert!(ok.status().is_success());

        failing.store(true, Ordering::SeqCst);
        let failed = reqwest::get(format!("http://{}/citations?refresh=true", addr)).await.unwrap();
        assert_eq!(failed.status(), reqwest::StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = failed.json().await.unwrap();
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("Failed to load citations"));
        assert!(message.contains("503"));
        assert_eq!(body["previous"]["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bibtex_download() {
        let (addr, _) = spawn_server().await;

        let response = reqwest::get(format!("http://{}/bibtex?doi=10.1/ab:c&title=Paper&year=2020", addr))
            .await
            .unwrap();
        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(disposition, "attachment; filename=\"citation_10_1_ab_c.bib\"");

        let text = response.text().await.unwrap();
        assert!(text.starts_with("@article{10_1_ab_c_2020,"));
    }
}

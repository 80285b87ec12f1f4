//! OpenAlex API Client
//!
//! Resolves a paper by DOI and walks every work citing it using cursor pagination.
//!
//! API Best Practices (per OpenAlex docs):
//! - Use `mailto=email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Use `per_page=200` for maximum results per page
//! - Use `cursor=*` paging for result sets beyond 10,000 works

use crate::config::DashboardConfig;
use crate::error::{DashboardError, OptionExt, Result};
use crate::lenient;
use crate::merge::{identity_key, KeyedCitation};
use crate::paginate::{collect_pages, CursorPage, PageOptions};
use crate::source::CitationSource;
use crate::table::{doi_path_segment, doi_url, normalize_doi, CitationRecord, Provenance, PublicationStatus, UNTITLED};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// OpenAlex API base URL
pub const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Maximum results per page (OpenAlex limit)
const MAX_PER_PAGE: usize = 200;

/// A citing work as returned by `/works`. Every field is optional; a field of the wrong
/// type reads as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexWork {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub publication_year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub primary_location: Option<OpenAlexLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAlexLocation {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub landing_page_url: Option<String>,
}

/// `/works/doi:{doi}` response; only the identifier is needed
#[derive(Debug, Deserialize)]
struct WorkInfo {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorksPage {
    #[serde(default, deserialize_with = "lenient::items_or_default")]
    results: Vec<OpenAlexWork>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    next_cursor: Option<String>,
}

/// Map an OpenAlex work onto the canonical row.
///
/// Link preference: DOI URL, then the primary location's landing page, then the work id.
pub fn normalize_work(work: &OpenAlexWork) -> KeyedCitation {
    let doi = work.doi.as_deref().map(normalize_doi).unwrap_or_default();
    let title = work.display_name.as_deref().filter(|t| !t.is_empty());

    let link = if !doi.is_empty() {
        doi_url(&doi)
    } else {
        work.primary_location
            .as_ref()
            .and_then(|loc| loc.landing_page_url.clone())
            .filter(|url| !url.is_empty())
            .or_else(|| work.id.clone())
            .unwrap_or_default()
    };

    KeyedCitation {
        key: identity_key(&doi, title),
        record: CitationRecord {
            year: work.publication_year.filter(|y| *y != 0),
            title: title.unwrap_or(UNTITLED).to_string(),
            doi,
            link,
            status: Some(PublicationStatus::PeerReviewed),
            source: Some(Provenance::OpenAlex),
        },
    }
}

/// Short form of an OpenAlex id URL (`https://openalex.org/W123` -> `W123`)
fn short_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// OpenAlex API client
pub struct OpenAlexClient {
    client: Client,
    base_url: String,
    mailto: String,
    paging: PageOptions,
}

impl OpenAlexClient {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("citedash/0.1 (mailto:{})", config.mailto))
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.openalex_base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            paging: config.page_options(),
        })
    }

    /// Look up a work by DOI and return its short id
    pub async fn resolve_work_id(&self, doi: &str) -> Result<String> {
        let url = format!("{}/works/doi:{}", self.base_url, doi_path_segment(doi));
        debug!(url = %url, "Resolving OpenAlex work");

        let response = self
            .client
            .get(&url)
            .query(&[("mailto", self.mailto.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::http("OpenAlex", status));
        }

        let info: WorkInfo = response.json().await.map_err(|e| {
            DashboardError::Parse(format!("Failed to parse OpenAlex work: {}", e))
        })?;
        let id = info.id.ok_or_parse("OpenAlex work has no id")?;

        Ok(short_id(&id).to_string())
    }

    /// Every work citing `work_id`, in API order
    pub async fn citing_works(&self, work_id: &str) -> Result<Vec<OpenAlexWork>> {
        info!(work = work_id, "Fetching OpenAlex citing works");
        collect_pages(&self.paging, |cursor| self.fetch_page(work_id, cursor)).await
    }

    async fn fetch_page(&self, work_id: &str, cursor: String) -> Result<CursorPage<OpenAlexWork>> {
        let filter = format!("cites:{}", work_id);
        let per_page = MAX_PER_PAGE.to_string();

        let response = self
            .client
            .get(format!("{}/works", self.base_url))
            .query(&[
                ("filter", filter.as_str()),
                ("per_page", per_page.as_str()),
                ("cursor", cursor.as_str()),
                ("mailto", self.mailto.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::http("OpenAlex", status));
        }

        let page: WorksPage = response.json().await.map_err(|e| {
            DashboardError::Parse(format!("Failed to parse OpenAlex response: {}", e))
        })?;

        Ok(CursorPage {
            results: page.results,
            next_cursor: page.meta.and_then(|m| m.next_cursor),
        })
    }
}

/// OpenAlex as a citation source
pub struct OpenAlexSource {
    client: OpenAlexClient,
}

impl OpenAlexSource {
    pub fn new(client: OpenAlexClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CitationSource for OpenAlexSource {
    fn provenance(&self) -> Provenance {
        Provenance::OpenAlex
    }

    async fn fetch(&self, paper_doi: &str) -> Result<Vec<KeyedCitation>> {
        let work_id = self.client.resolve_work_id(paper_doi).await?;
        let works = self.client.citing_works(&work_id).await?;
        info!(total = works.len(), "OpenAlex citations fetched");
        Ok(works.iter().map(normalize_work).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn test_config(base_url: &str) -> DashboardConfig {
        DashboardConfig {
            openalex_base_url: base_url.to_string(),
            mailto: "tests@example.com".to_string(),
            page_delay_ms: 0,
            ..Default::default()
        }
    }

    fn page_query(cursor: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("filter".to_string(), "cites:W42".to_string()),
            Matcher::UrlEncoded("per_page".to_string(), "200".to_string()),
            Matcher::UrlEncoded("cursor".to_string(), cursor.to_string()),
            Matcher::UrlEncoded("mailto".to_string(), "tests@example.com".to_string()),
        ])
    }

    #[test]
    fn test_normalize_work_link_preference() {
        let with_doi: OpenAlexWork = serde_json::from_value(json!({
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.1/x",
            "display_name": "X",
            "publication_year": 2023,
            "primary_location": { "landing_page_url": "https://publisher/x" }
        }))
        .unwrap();
        let keyed = normalize_work(&with_doi);
        assert_eq!(keyed.key, "10.1/x");
        assert_eq!(keyed.record.doi, "10.1/x");
        assert_eq!(keyed.record.link, "https://doi.org/10.1/x");
        assert_eq!(keyed.record.year, Some(2023));

        let landing: OpenAlexWork = serde_json::from_value(json!({
            "id": "https://openalex.org/W2",
            "display_name": "Y",
            "primary_location": { "landing_page_url": "https://publisher/y" }
        }))
        .unwrap();
        assert_eq!(normalize_work(&landing).record.link, "https://publisher/y");
        assert_eq!(normalize_work(&landing).key, "Y");

        let bare: OpenAlexWork = serde_json::from_value(json!({ "id": "https://openalex.org/W3" })).unwrap();
        let keyed = normalize_work(&bare);
        assert_eq!(keyed.record.link, "https://openalex.org/W3");
        assert_eq!(keyed.record.title, UNTITLED);
        assert_eq!(keyed.record.year, None);
        assert!(keyed.key.is_empty());
    }

    #[test]
    fn test_only_zero_year_is_unknown() {
        let zero = OpenAlexWork {
            publication_year: Some(0),
            ..Default::default()
        };
        assert_eq!(normalize_work(&zero).record.year, None);

        let ancient = OpenAlexWork {
            publication_year: Some(-350),
            ..Default::default()
        };
        assert_eq!(normalize_work(&ancient).record.year, Some(-350));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("https://openalex.org/W2741809807"), "W2741809807");
        assert_eq!(short_id("W1"), "W1");
    }

    #[tokio::test]
    async fn test_paginates_cursor_sequence() {
        let mut server = Server::new_async().await;

        let lookup = server
            .mock("GET", "/works/doi:10.1/paper")
            .match_query(Matcher::UrlEncoded("mailto".to_string(), "tests@example.com".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "https://openalex.org/W42"}"#)
            .create_async()
            .await;

        let first = server
            .mock("GET", "/works")
            .match_query(page_query("*"))
            .with_status(200)
            .with_body(r#"{"meta": {"next_cursor": "c1"}, "results": [{"display_name": "P1"}, {"display_name": "P2"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/works")
            .match_query(page_query("c1"))
            .with_status(200)
            .with_body(r#"{"meta": {"next_cursor": "c2"}, "results": [{"display_name": "P3"}]}"#)
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("GET", "/works")
            .match_query(page_query("c2"))
            .with_status(200)
            .with_body(r#"{"meta": {"next_cursor": null}, "results": [{"display_name": "P4"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let source = OpenAlexSource::new(OpenAlexClient::new(&test_config(&server.url())).unwrap());
        let citations = source.fetch("10.1/paper").await.unwrap();

        let titles: Vec<_> = citations.iter().map(|c| c.record.title.as_str()).collect();
        assert_eq!(titles, vec!["P1", "P2", "P3", "P4"]);

        lookup.assert_async().await;
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn test_page_failure_is_fatal() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/works")
            .match_query(page_query("*"))
            .with_status(200)
            .with_body(r#"{"meta": {"next_cursor": "c1"}, "results": [{"display_name": "P1"}]}"#)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/works")
            .match_query(page_query("c1"))
            .with_status(503)
            .create_async()
            .await;

        let client = OpenAlexClient::new(&test_config(&server.url())).unwrap();
        let err = client.citing_works("W42").await.unwrap_err();
        assert!(matches!(err, DashboardError::Api { code: 503, .. }));
        assert!(err.to_string().contains("OpenAlex HTTP 503"));
    }

    #[tokio::test]
    async fn test_lookup_failure_reports_status() {
        let mut server = Server::new_async().await;
        let _lookup = server
            .mock("GET", "/works/doi:10.1/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = OpenAlexClient::new(&test_config(&server.url())).unwrap();
        let err = client.resolve_work_id("10.1/missing").await.unwrap_err();
        assert!(matches!(err, DashboardError::Api { code: 404, .. }));
    }

    #[tokio::test]
    async fn test_lookup_encodes_reserved_doi_characters() {
        let mut server = Server::new_async().await;
        let lookup = server
            .mock("GET", "/works/doi:10.1/a%23b%3Fc")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": "https://openalex.org/W7"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = OpenAlexClient::new(&test_config(&server.url())).unwrap();
        assert_eq!(client.resolve_work_id("10.1/a#b?c").await.unwrap(), "W7");
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn test_mistyped_work_fields_are_defaulted() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/works")
            .match_query(page_query("*"))
            .with_status(200)
            .with_body(
                json!({
                    "meta": { "next_cursor": null },
                    "results": [
                        { "display_name": "Good", "doi": "https://doi.org/10.9/a", "publication_year": 2021 },
                        { "display_name": "Bad", "doi": 123, "publication_year": "2021" },
                        null
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAlexClient::new(&test_config(&server.url())).unwrap();
        let works = client.citing_works("W42").await.unwrap();
        assert_eq!(works.len(), 3);

        let good = normalize_work(&works[0]);
        assert_eq!(good.record.doi, "10.9/a");
        assert_eq!(good.record.year, Some(2021));

        let bad = normalize_work(&works[1]);
        assert_eq!(bad.key, "Bad");
        assert_eq!(bad.record.doi, "");
        assert_eq!(bad.record.year, None);

        assert!(normalize_work(&works[2]).key.is_empty());
    }
}

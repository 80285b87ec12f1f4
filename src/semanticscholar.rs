//! Semantic Scholar API Client
//!
//! Lists the papers citing a DOI and classifies each as peer-reviewed or pre-print.
//!
//! API Details:
//! - Citations endpoint: GET /graph/v1/paper/DOI:{doi}/citations
//! - Max 1000 citations per request
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use crate::lenient;
use crate::merge::{identity_key, KeyedCitation};
use crate::source::CitationSource;
use crate::table::{doi_path_segment, doi_url, normalize_doi, CitationRecord, Provenance, PublicationStatus, UNTITLED};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Semantic Scholar API base URL
pub const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Paper detail page used when a citing paper has no DOI
const SS_PAPER_URL: &str = "https://www.semanticscholar.org/paper";

/// Maximum citations per request
const MAX_CITATIONS: usize = 1000;

/// Fields requested for each citing paper
const CITATION_FIELDS: &str = "title,year,authors,venue,publicationTypes,publicationDate,citationCount,influentialCitationCount,isOpenAccess,openAccessPdf,fieldsOfStudy,s2FieldsOfStudy,publicationVenue,externalIds";

/// One entry of the `data` array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CitationEdge {
    #[serde(rename = "citingPaper", default, deserialize_with = "lenient::or_default")]
    pub citing_paper: Option<SSPaper>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SSPaper {
    #[serde(rename = "paperId", default, deserialize_with = "lenient::or_default")]
    pub paper_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub venue: Option<String>,
    #[serde(rename = "publicationTypes", default, deserialize_with = "lenient::or_default")]
    pub publication_types: Option<Vec<String>>,
    #[serde(rename = "publicationVenue", default, deserialize_with = "lenient::or_default")]
    pub publication_venue: Option<SSVenue>,
    #[serde(rename = "externalIds", default, deserialize_with = "lenient::or_default")]
    pub external_ids: Option<SSExternalIds>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SSVenue {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SSExternalIds {
    #[serde(rename = "DOI", default, deserialize_with = "lenient::or_default")]
    pub doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CitationsResponse {
    #[serde(default, deserialize_with = "lenient::items_or_default")]
    data: Vec<CitationEdge>,
}

fn mentions_arxiv(name: Option<&str>) -> bool {
    name.map(|n| n.to_lowercase().contains("arxiv")).unwrap_or(false)
}

/// Pre-print if typed `Preprint`, or if either venue name mentions arXiv.
pub fn classify_status(paper: &SSPaper) -> PublicationStatus {
    let typed_preprint = paper
        .publication_types
        .as_ref()
        .map(|types| types.iter().any(|t| t == "Preprint"))
        .unwrap_or(false);
    let venue_name = paper.publication_venue.as_ref().and_then(|v| v.name.as_deref());

    if typed_preprint || mentions_arxiv(paper.venue.as_deref()) || mentions_arxiv(venue_name) {
        PublicationStatus::PrePrint
    } else {
        PublicationStatus::PeerReviewed
    }
}

/// Map a citing paper onto the canonical row.
///
/// Link preference: DOI URL, then the Semantic Scholar paper page.
pub fn normalize_paper(paper: &SSPaper) -> KeyedCitation {
    let doi = paper
        .external_ids
        .as_ref()
        .and_then(|ids| ids.doi.as_deref())
        .map(normalize_doi)
        .unwrap_or_default();
    let title = paper.title.as_deref().filter(|t| !t.is_empty());

    let link = if !doi.is_empty() {
        doi_url(&doi)
    } else {
        format!("{}/{}", SS_PAPER_URL, paper.paper_id.as_deref().unwrap_or_default())
    };

    KeyedCitation {
        key: identity_key(&doi, title),
        record: CitationRecord {
            year: paper.year.filter(|y| *y != 0),
            title: title.unwrap_or(UNTITLED).to_string(),
            doi,
            link,
            status: Some(classify_status(paper)),
            source: Some(Provenance::SemanticScholar),
        },
    }
}

/// Semantic Scholar API client
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.semantic_scholar_base_url.trim_end_matches('/').to_string(),
            api_key: config.semantic_scholar_api_key.clone(),
        })
    }

    /// Papers citing `doi` (single request, up to [`MAX_CITATIONS`])
    pub async fn citations(&self, doi: &str) -> Result<Vec<CitationEdge>> {
        let url = format!("{}/paper/DOI:{}/citations", self.base_url, doi_path_segment(doi));
        let limit = MAX_CITATIONS.to_string();

        debug!(url = %url, "Fetching Semantic Scholar citations");

        let mut request = self
            .client
            .get(&url)
            .query(&[("fields", CITATION_FIELDS), ("limit", limit.as_str())]);

        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), error = %error_text, "API error");
            return Err(DashboardError::http("Semantic Scholar", status));
        }

        let body: CitationsResponse = response.json().await.map_err(|e| {
            DashboardError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })?;

        Ok(body.data)
    }
}

/// Semantic Scholar as a citation source
pub struct SemanticScholarSource {
    client: SemanticScholarClient,
}

impl SemanticScholarSource {
    pub fn new(client: SemanticScholarClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CitationSource for SemanticScholarSource {
    fn provenance(&self) -> Provenance {
        Provenance::SemanticScholar
    }

    async fn fetch(&self, paper_doi: &str) -> Result<Vec<KeyedCitation>> {
        let edges = self.client.citations(paper_doi).await?;
        let citations: Vec<KeyedCitation> = edges
            .iter()
            .filter_map(|edge| edge.citing_paper.as_ref())
            .map(normalize_paper)
            .collect();
        info!(total = citations.len(), "Semantic Scholar citations fetched");
        Ok(citations)
    }
}

//! Citation table model.
//!
//! The canonical row shape shared by every source, the `{headers, rows}` table handed to
//! the CLI and HTTP layers, and the statistics/search helpers computed over it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// URL prefix stripped from DOIs returned by the APIs
pub const DOI_URL_PREFIX: &str = "https://doi.org/";

/// Title used when a source has none
pub const UNTITLED: &str = "Untitled";

/// Rendering of an unknown year
pub const UNKNOWN_YEAR: &str = "-";

/// Column order when both sources contribute
pub const DUAL_SOURCE_HEADERS: &[&str] = &["year", "title", "doi", "link", "status", "source"];

/// Column order for the OpenAlex-only table
pub const SINGLE_SOURCE_HEADERS: &[&str] = &["year", "title", "doi", "link"];

/// Strip the `https://doi.org/` prefix. Applying it twice is a no-op.
pub fn normalize_doi(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(DOI_URL_PREFIX)
        .unwrap_or(trimmed)
        .to_string()
}

/// Resolvable URL for a bare DOI
pub fn doi_url(doi: &str) -> String {
    format!("{}{}", DOI_URL_PREFIX, doi)
}

/// DOI for use inside a URL path: percent-encoded except for `/`, so `#` or `?` in
/// SICI-style DOIs cannot cut the path short
pub fn doi_path_segment(doi: &str) -> String {
    urlencoding::encode(doi).replace("%2F", "/")
}

/// Peer-review status of a citing paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicationStatus {
    #[serde(rename = "Peer-reviewed")]
    PeerReviewed,
    #[serde(rename = "Pre-print")]
    PrePrint,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerReviewed => "Peer-reviewed",
            Self::PrePrint => "Pre-print",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Peer-reviewed" => Ok(Self::PeerReviewed),
            "Pre-print" => Ok(Self::PrePrint),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Which API(s) reported a citation. Describes provenance, not authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "OpenAlex")]
    OpenAlex,
    #[serde(rename = "Semantic Scholar")]
    SemanticScholar,
    #[serde(rename = "OpenAlex + Semantic Scholar")]
    Both,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAlex => "OpenAlex",
            Self::SemanticScholar => "Semantic Scholar",
            Self::Both => "OpenAlex + Semantic Scholar",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "OpenAlex" => Ok(Self::OpenAlex),
            "Semantic Scholar" => Ok(Self::SemanticScholar),
            "OpenAlex + Semantic Scholar" | "Both" => Ok(Self::Both),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// One row of the citation table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationRecord {
    /// Publication year, `None` when unknown
    #[serde(default)]
    pub year: Option<i32>,
    pub title: String,
    /// Bare DOI (no URL prefix), empty when unknown
    #[serde(default)]
    pub doi: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Provenance>,
}

impl CitationRecord {
    /// Year as displayed in the table and used in BibTeX keys
    pub fn year_label(&self) -> String {
        self.year
            .map(|y| y.to_string())
            .unwrap_or_else(|| UNKNOWN_YEAR.to_string())
    }

    /// Value of a named column, as rendered for display or CSV
    pub fn field(&self, header: &str) -> String {
        match header {
            "year" => self.year_label(),
            "title" => self.title.clone(),
            "doi" => self.doi.clone(),
            "link" => self.link.clone(),
            "status" => self.status.map(|s| s.to_string()).unwrap_or_default(),
            "source" => self.source.map(|s| s.to_string()).unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// Ordered header list paired with ordered rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationTable {
    pub headers: Vec<String>,
    pub rows: Vec<CitationRecord>,
}

/// Summary numbers shown above the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub total: usize,
    pub peer_reviewed: usize,
    pub preprints: usize,
    /// Rows per year label, keys sorted
    pub years: BTreeMap<String, usize>,
}

impl CitationTable {
    pub fn new(headers: &[&str], rows: Vec<CitationRecord>) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop the dual-source columns (`status`, `source`).
    pub fn into_single_source(self) -> Self {
        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                row.status = None;
                row.source = None;
                row
            })
            .collect();
        Self::new(SINGLE_SOURCE_HEADERS, rows)
    }

    /// Rows whose title contains `term`, ignoring case. Headers are kept.
    pub fn filter_by_title(&self, term: &str) -> Self {
        let needle = term.to_lowercase();
        Self {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row.title.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        }
    }

    pub fn stats(&self) -> TableStats {
        let mut years = BTreeMap::new();
        let mut peer_reviewed = 0;
        let mut preprints = 0;

        for row in &self.rows {
            *years.entry(row.year_label()).or_insert(0) += 1;
            match row.status {
                Some(PublicationStatus::PeerReviewed) => peer_reviewed += 1,
                Some(PublicationStatus::PrePrint) => preprints += 1,
                None => {}
            }
        }

        TableStats {
            total: self.rows.len(),
            peer_reviewed,
            preprints,
            years,
        }
    }
}

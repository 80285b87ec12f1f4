//! Flat CSV citation tables.
//!
//! The CSV variant of the dashboard reads a pre-built table from the first reachable
//! candidate URL. The same column layout is used when exporting a table.

use crate::error::{DashboardError, Result};
use crate::table::{CitationRecord, CitationTable, UNTITLED};
use reqwest::Client;
use serde::Deserialize;
use std::io::Write;
use tracing::{debug, info, warn};

/// Known columns; any other column is kept in the headers but ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    year: String,
    title: String,
    doi: String,
    link: String,
    status: String,
    source: String,
}

impl From<CsvRow> for CitationRecord {
    fn from(row: CsvRow) -> Self {
        let title = row.title.trim();
        CitationRecord {
            year: row.year.trim().parse().ok(),
            title: if title.is_empty() { UNTITLED } else { title }.to_string(),
            doi: row.doi.trim().to_string(),
            link: row.link.trim().to_string(),
            status: row.status.parse().ok(),
            source: row.source.parse().ok(),
        }
    }
}

/// Parse CSV text with a header row into a table
pub fn parse_table(text: &str) -> Result<CitationTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    if headers.is_empty() {
        return Err(DashboardError::Parse("CSV has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.deserialize::<CsvRow>() {
        rows.push(CitationRecord::from(record?));
    }

    Ok(CitationTable { headers, rows })
}

async fn fetch_candidate(client: &Client, url: &str) -> Result<CitationTable> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DashboardError::http("CSV", status));
    }
    let text = response.text().await?;
    parse_table(&text)
}

/// Try each candidate in order; the first one that downloads and parses wins.
pub async fn fetch_first_available(client: &Client, candidates: &[String]) -> Result<CitationTable> {
    let mut failures = Vec::new();

    for url in candidates {
        debug!(url = %url, "Trying CSV candidate");
        match fetch_candidate(client, url).await {
            Ok(table) => {
                info!(url = %url, rows = table.len(), "Loaded CSV table");
                return Ok(table);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "CSV candidate failed");
                failures.push(format!("{}: {}", url, e));
            }
        }
    }

    if failures.is_empty() {
        return Err(DashboardError::AllCandidatesFailed("no candidate URLs configured".to_string()));
    }
    Err(DashboardError::AllCandidatesFailed(failures.join("; ")))
}

/// Write `table` as CSV using its header order
pub fn write_table<W: Write>(table: &CitationTable, writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(table.headers.iter().map(|h| row.field(h)))?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Provenance, PublicationStatus, DUAL_SOURCE_HEADERS};
    use mockito::{Matcher, Server};

    const SAMPLE: &str = "year,title,doi,link,status,source,extra\n\
        2023,First,10.1/a,https://doi.org/10.1/a,Pre-print,Semantic Scholar,x\n\
        -,,,https://example.org/b,Peer-reviewed,OpenAlex + Semantic Scholar,y\n";

    #[test]
    fn test_parse_table() {
        let table = parse_table(SAMPLE).unwrap();
        assert_eq!(table.headers.len(), 7);
        assert_eq!(table.len(), 2);

        assert_eq!(table.rows[0].year, Some(2023));
        assert_eq!(table.rows[0].status, Some(PublicationStatus::PrePrint));
        assert_eq!(table.rows[0].source, Some(Provenance::SemanticScholar));

        assert_eq!(table.rows[1].year, None);
        assert_eq!(table.rows[1].title, UNTITLED);
        assert_eq!(table.rows[1].source, Some(Provenance::Both));
    }

    #[test]
    fn test_parse_missing_columns_default() {
        let table = parse_table("title\nOnly title\n").unwrap();
        assert_eq!(table.rows[0].title, "Only title");
        assert_eq!(table.rows[0].doi, "");
        assert_eq!(table.rows[0].status, None);
    }

    #[test]
    fn test_write_table() {
        let table = CitationTable::new(
            DUAL_SOURCE_HEADERS,
            vec![CitationRecord {
                year: None,
                title: "A, with comma".to_string(),
                doi: "10.1/a".to_string(),
                link: "https://doi.org/10.1/a".to_string(),
                status: Some(PublicationStatus::PeerReviewed),
                source: Some(Provenance::OpenAlex),
            }],
        );
        let mut out = Vec::new();
        write_table(&table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "year,title,doi,link,status,source\n-,\"A, with comma\",10.1/a,https://doi.org/10.1/a,Peer-reviewed,OpenAlex\n"
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_second_candidate() {
        let mut server = Server::new_async().await;
        let _primary = server
            .mock("GET", "/primary.csv")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _mirror = server
            .mock("GET", "/mirror.csv")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SAMPLE)
            .create_async()
            .await;

        let candidates = vec![
            format!("{}/primary.csv", server.url()),
            format!("{}/mirror.csv", server.url()),
        ];
        let table = fetch_first_available(&Client::new(), &candidates).await.unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_all_candidates_failing() {
        let mut server = Server::new_async().await;
        let _gone = server
            .mock("GET", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let candidates = vec![format!("{}/a.csv", server.url()), format!("{}/b.csv", server.url())];
        let err = fetch_first_available(&Client::new(), &candidates).await.unwrap_err();
        match err {
            DashboardError::AllCandidatesFailed(msg) => {
                assert!(msg.contains("a.csv"));
                assert!(msg.contains("b.csv"));
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(matches!(
            fetch_first_available(&Client::new(), &[]).await,
            Err(DashboardError::AllCandidatesFailed(_))
        ));
    }
}

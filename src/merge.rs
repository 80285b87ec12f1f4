//! Citation merging and deduplication.
//!
//! Folds normalized rows from several sources into one table keyed by identity
//! (DOI, else the raw title). The first batch is the primary source; later batches only
//! add rows for unseen keys or mark an existing row as reported by both APIs.

use crate::openalex::{self, OpenAlexWork};
use crate::semanticscholar::{self, CitationEdge};
use crate::table::{CitationRecord, CitationTable, Provenance, DUAL_SOURCE_HEADERS};
use std::collections::HashMap;
use tracing::debug;

/// Identity of a paper: the DOI if present, else the exact title. Empty means the record
/// cannot be identified.
///
/// DOIs are lowercased, so `10.1/ABC` and `10.1/abc` collapse into one row. A
/// case-sensitive comparison would keep them apart and report more rows for the same
/// inputs.
pub fn identity_key(doi: &str, raw_title: Option<&str>) -> String {
    if !doi.is_empty() {
        doi.to_lowercase()
    } else {
        raw_title.unwrap_or_default().to_string()
    }
}

/// A normalized row together with its identity key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedCitation {
    pub key: String,
    pub record: CitationRecord,
}

/// Everything one source contributed to a load
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub provenance: Provenance,
    pub citations: Vec<KeyedCitation>,
}

impl SourceBatch {
    pub fn new(provenance: Provenance, citations: Vec<KeyedCitation>) -> Self {
        Self { provenance, citations }
    }

    pub fn empty(provenance: Provenance) -> Self {
        Self::new(provenance, Vec::new())
    }
}

/// Merge normalized batches; the first one is the primary source.
///
/// Rows keep first-seen-key order. Citations with an empty key are dropped.
pub fn merge_batches(batches: impl IntoIterator<Item = SourceBatch>) -> CitationTable {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<CitationRecord> = Vec::new();
    let mut owners: Vec<Provenance> = Vec::new();

    for (position, batch) in batches.into_iter().enumerate() {
        let mut inserted = 0usize;
        let mut shared = 0usize;
        let mut dropped = 0usize;

        for citation in batch.citations {
            if citation.key.is_empty() {
                dropped += 1;
                continue;
            }

            match index.get(&citation.key) {
                // A repeat inside the primary source replaces the row in place
                Some(&i) if position == 0 => rows[i] = citation.record,
                Some(&i) => {
                    if owners[i] != batch.provenance {
                        rows[i].source = Some(Provenance::Both);
                        shared += 1;
                    }
                }
                None => {
                    index.insert(citation.key, rows.len());
                    owners.push(batch.provenance);
                    rows.push(citation.record);
                    inserted += 1;
                }
            }
        }

        debug!(
            source = %batch.provenance,
            inserted = inserted,
            shared = shared,
            dropped = dropped,
            "Merged source batch"
        );
    }

    CitationTable::new(DUAL_SOURCE_HEADERS, rows)
}

/// Normalize raw OpenAlex works and Semantic Scholar citation edges, then merge them
/// with OpenAlex as the primary source.
pub fn merge_citations(works: &[OpenAlexWork], edges: &[CitationEdge]) -> CitationTable {
    let primary = SourceBatch::new(
        Provenance::OpenAlex,
        works.iter().map(openalex::normalize_work).collect(),
    );
    let secondary = SourceBatch::new(
        Provenance::SemanticScholar,
        edges
            .iter()
            .filter_map(|edge| edge.citing_paper.as_ref())
            .map(semanticscholar::normalize_paper)
            .collect(),
    );
    merge_batches([primary, secondary])
}

//! BibTeX export of a single citation.

use crate::table::{doi_url, CitationRecord};
use serde::Serialize;

/// A downloadable `.bib` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BibtexExport {
    pub filename: String,
    pub contents: String,
}

/// Replace every character outside `[A-Za-z0-9]` with `_`; an empty DOI becomes `unknown`.
pub fn sanitize_doi(doi: &str) -> String {
    if doi.is_empty() {
        return "unknown".to_string();
    }
    doi.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn citation_key(doi: &str, year: &str) -> String {
    format!("{}_{}", sanitize_doi(doi), year)
}

/// `@article` entry; `doi` and `url` are only present when the DOI is known.
pub fn render(doi: &str, title: &str, year: &str) -> String {
    let mut entry = format!(
        "@article{{{},\n  title={{{}}},\n  year={{{}}}",
        citation_key(doi, year),
        title,
        year
    );

    if !doi.is_empty() {
        entry.push_str(&format!(",\n  doi={{{}}},\n  url={{{}}}", doi, doi_url(doi)));
    }

    entry.push_str("\n}");
    entry
}

pub fn export(doi: &str, title: &str, year: &str) -> BibtexExport {
    BibtexExport {
        filename: format!("citation_{}.bib", sanitize_doi(doi)),
        contents: render(doi, title, year),
    }
}

pub fn export_record(record: &CitationRecord) -> BibtexExport {
    export(&record.doi, &record.title, &record.year_label())
}

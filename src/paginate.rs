//! Cursor-based pagination.
//!
//! Drives an opaque continuation token from the initial `*` cursor until the server stops
//! returning one, accumulating every page in API order. Pages are fetched strictly one
//! after another with a small politeness delay in between.

use crate::error::{DashboardError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Cursor value that requests the first page
pub const INITIAL_CURSOR: &str = "*";

/// Delay between consecutive page requests
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on pages per paginated fetch
pub const DEFAULT_MAX_PAGES: usize = 500;

/// Pagination knobs
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Sleep between pages (not before the first one)
    pub page_delay: Duration,
    /// Fail with [`DashboardError::PaginationLimit`] instead of fetching more than this
    pub max_pages: usize,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// One page of results and the cursor for the next page
#[derive(Debug, Clone)]
pub struct CursorPage<T> {
    pub results: Vec<T>,
    /// `None` (or empty) ends pagination
    pub next_cursor: Option<String>,
}

/// Fetch every page reachable from [`INITIAL_CURSOR`].
///
/// `fetch_page` receives the cursor to request. The first error aborts the whole
/// operation; nothing collected so far is returned and nothing is retried.
pub async fn collect_pages<T, F, Fut>(options: &PageOptions, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<CursorPage<T>>>,
{
    let mut all_results = Vec::new();
    let mut cursor = Some(INITIAL_CURSOR.to_string());
    let mut pages = 0usize;

    while let Some(current) = cursor.take() {
        if pages >= options.max_pages {
            return Err(DashboardError::PaginationLimit(pages));
        }

        debug!(cursor = %current, page = pages + 1, "Fetching page");
        let page = fetch_page(current).await?;
        pages += 1;

        let count = page.results.len();
        all_results.extend(page.results);
        debug!(page = pages, count = count, total = all_results.len(), "Page collected");

        cursor = page.next_cursor.filter(|c| !c.is_empty());

        if cursor.is_some() && !options.page_delay.is_zero() {
            tokio::time::sleep(options.page_delay).await;
        }
    }

    info!(pages = pages, total = all_results.len(), "Pagination complete");
    Ok(all_results)
}

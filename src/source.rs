//! Seams for the encyclopedia collaborators consumed by the retrieval core.

use std::time::Duration;

use crate::error::Result;

/// Page text fetched for one retrieval call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Resolved page title (after redirects).
    pub title: String,
    /// Plain-text page body.
    pub raw_text: String,
}

/// Full page text lookup used by the advanced path.
pub trait ContentSource: Send + Sync {
    /// Fetches the textual content of the page named `title`.
    fn fetch_page_content(&self, title: &str) -> Result<Page>;
}

/// Short summary lookup used by the basic path.
pub trait SummarySource: Send + Sync {
    /// Fetches the summary extract for `title`, aborting the request after `timeout`.
    fn fetch_summary(&self, title: &str, timeout: Duration) -> Result<String>;
}

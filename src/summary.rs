//! Basic path: turn a "quick summary" style query into a page title and fetch its summary.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::retry::{with_retry, RetryPolicy};
use crate::source::SummarySource;

/// Words dropped from the query before it is used as a page title.
pub const TITLE_STOPWORDS: &[&str] = &["summary", "short", "quick", "overview", "of", "the"];

/// Retry and timeout knobs for summary lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryConfig {
    /// Total attempts per lookup, the first one included.
    pub max_retries: usize,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Delay before the second attempt; doubles afterwards.
    pub backoff: Duration,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 5000,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Strips trigger words (whole-word, case-insensitive) and collapses whitespace.
///
/// Membership is tested on each whitespace-separated word with surrounding punctuation
/// removed; kept words are emitted unchanged.
pub fn normalize_title(query: &str) -> String {
    let stopwords: HashSet<&str> = TITLE_STOPWORDS.iter().copied().collect();
    let kept: Vec<&str> = query
        .split_whitespace()
        .filter(|word| {
            let bare = word
                .trim_matches(|ch: char| !ch.is_alphanumeric())
                .to_lowercase();
            !stopwords.contains(bare.as_str())
        })
        .collect();
    kept.join(" ")
}

/// Summary lookup with bounded sequential retries.
#[derive(Clone)]
pub struct SummaryFallbackTool {
    source: Arc<dyn SummarySource>,
    backoff: Duration,
}

impl SummaryFallbackTool {
    /// Builds the tool around a summary source.
    pub fn new(source: Arc<dyn SummarySource>, backoff: Duration) -> Self {
        Self { source, backoff }
    }

    /// Normalizes `query` into a title and returns that page's summary extract.
    ///
    /// Transport failures and non-success responses are retried up to `max_retries`
    /// attempts in total; exhaustion yields [`RetrievalError::RetrievalExhausted`].
    pub fn summarize(&self, query: &str, max_retries: usize, timeout_ms: u64) -> Result<String> {
        let title = normalize_title(query);
        if title.is_empty() {
            return Err(RetrievalError::Configuration(format!(
                "query {query:?} names no page to summarize"
            )));
        }
        debug!(%title, max_retries, timeout_ms, "fetching summary");
        let timeout = Duration::from_millis(timeout_ms);
        let policy = RetryPolicy {
            max_attempts: max_retries,
            backoff: self.backoff,
        };
        with_retry(policy, RetrievalError::is_retryable, |_attempt| {
            self.source.fetch_summary(&title, timeout)
        })
    }
}

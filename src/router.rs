//! Query routing between the summary fallback and the agent-driven retrieval path.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::agent::{ExecutionBudget, ReasoningAgent, RetrievalTool};
use crate::error::{Result, RetrievalError};
use crate::summary::{SummaryConfig, SummaryFallbackTool};

/// Substrings that mark a query as a request for a short summary.
pub const BASIC_KEYWORDS: &[&str] = &["summary", "short", "quick"];

/// Message returned to callers whenever either path fails.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing your request.";

/// Which path serves a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Direct summary lookup.
    Basic,
    /// Reasoning agent with passage retrieval.
    Advanced,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::Advanced => f.write_str("advanced"),
        }
    }
}

/// Case-insensitive substring test against [`BASIC_KEYWORDS`].
pub fn classify(query: &str) -> Strategy {
    let lowered = query.to_lowercase();
    if BASIC_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        Strategy::Basic
    } else {
        Strategy::Advanced
    }
}

/// Per-path limits applied by the router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// Retry and timeout settings for the basic path.
    pub summary: SummaryConfig,
    /// Budget handed to the reasoning agent on the advanced path.
    pub budget: ExecutionBudget,
}

/// Successful answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// Answer text.
    pub reply: String,
}

/// User-safe failure; carries no internal detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicError;

impl PublicError {
    /// Text shown to the end user.
    pub fn message(&self) -> &'static str {
        GENERIC_ERROR_MESSAGE
    }
}

impl fmt::Display for PublicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for PublicError {}

/// Entry point for chat requests.
#[derive(Clone)]
pub struct Router {
    summary: SummaryFallbackTool,
    agent: Arc<dyn ReasoningAgent>,
    tool: RetrievalTool,
    config: RouterConfig,
}

impl Router {
    /// Wires both paths; all collaborators are built once by the caller.
    pub fn new(
        summary: SummaryFallbackTool,
        agent: Arc<dyn ReasoningAgent>,
        tool: RetrievalTool,
        config: RouterConfig,
    ) -> Self {
        Self {
            summary,
            agent,
            tool,
            config,
        }
    }

    /// Answers `query`, logging any failure in full and returning only a generic error.
    pub fn handle(&self, query: &str) -> std::result::Result<Reply, PublicError> {
        let strategy = classify(query);
        match self.dispatch(strategy, query) {
            Ok(reply) => {
                info!(%strategy, "query answered");
                Ok(Reply { reply })
            }
            Err(err) => {
                error!(%strategy, kind = err.kind(), error = %err, detail = ?err, "query failed");
                Err(PublicError)
            }
        }
    }

    /// Runs the path chosen for `strategy`, surfacing the typed error.
    pub fn dispatch(&self, strategy: Strategy, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RetrievalError::Configuration("query must not be empty".into()));
        }
        match strategy {
            Strategy::Basic => self.summary.summarize(
                query,
                self.config.summary.max_retries,
                self.config.summary.timeout_ms,
            ),
            Strategy::Advanced => self.agent.run(query, &self.tool, &self.config.budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_queries_take_the_basic_path() {
        assert_eq!(classify("give me a quick summary"), Strategy::Basic);
        assert_eq!(classify("SHORT history of Rome"), Strategy::Basic);
        // Plain substring test, so words containing a keyword also match.
        assert_eq!(classify("Shortcomings of the Treaty of Versailles"), Strategy::Basic);
    }

    #[test]
    fn other_queries_take_the_advanced_path() {
        assert_eq!(
            classify("Explain the causes of the French Revolution in detail"),
            Strategy::Advanced
        );
        assert_eq!(classify(""), Strategy::Advanced);
    }

    #[test]
    fn public_error_hides_details() {
        assert_eq!(PublicError.to_string(), GENERIC_ERROR_MESSAGE);
    }
}

//! Error taxonomy shared by every retrieval stage.

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the chunker, the network adapters, the ranker and the agent loop.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid chunking parameters or unusable input; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure talking to an external service.
    #[error("network error calling {service}: {message}")]
    Network {
        /// Short label for the remote collaborator (e.g. `wikipedia`, `ollama`).
        service: &'static str,
        /// Underlying transport message.
        message: String,
    },

    /// A network call exceeded its per-request timeout.
    #[error("{service} request timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Short label for the remote collaborator.
        service: &'static str,
        /// Timeout that elapsed.
        after: Duration,
    },

    /// The remote service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Upstream {
        /// Short label for the remote collaborator.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body (or a placeholder when unreadable).
        body: String,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode {service} response: {message}")]
    Decode {
        /// Short label for the remote collaborator.
        service: &'static str,
        /// Decoder message.
        message: String,
    },

    /// The requested page does not exist upstream.
    #[error("page not found: {0}")]
    NotFound(String),

    /// The similarity provider produced a wrong-shaped result.
    #[error("missing similarities: expected {expected} scores, got {actual}")]
    MissingSimilarity {
        /// Number of document vectors submitted.
        expected: usize,
        /// Number of scores produced.
        actual: usize,
    },

    /// The embedding model returned a batch whose length differs from the input.
    #[error("embedding model returned {actual} vectors for {expected} inputs")]
    EmbeddingShape {
        /// Number of strings submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },

    /// A bounded retry loop ran out of attempts.
    #[error("retrieval exhausted after {attempts} attempt(s): {last_error}")]
    RetrievalExhausted {
        /// Attempts performed.
        attempts: usize,
        /// Message of the final underlying failure.
        last_error: String,
    },

    /// The reasoning agent exceeded one of its execution budgets.
    #[error("agent execution failed: {0}")]
    AgentExecution(String),
}

impl RetrievalError {
    /// Builds a network/timeout error from a reqwest failure.
    pub fn from_transport(service: &'static str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                service,
                after: timeout,
            }
        } else if err.is_decode() {
            Self::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            Self::Network {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Whether a bounded retry loop should try the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Upstream { .. }
        )
    }

    /// Stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Upstream { .. } => "upstream",
            Self::Decode { .. } => "decode",
            Self::NotFound(_) => "not_found",
            Self::MissingSimilarity { .. } => "missing_similarity",
            Self::EmbeddingShape { .. } => "embedding_shape",
            Self::RetrievalExhausted { .. } => "retrieval_exhausted",
            Self::AgentExecution(_) => "agent_execution",
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RetrievalError>;

//! Ollama embedding client (`/api/embed`).

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::{ensure_batch_len, Embedder};
use crate::error::{Result, RetrievalError};
use crate::transport::{build_client, join_url, send_json};

const SERVICE: &str = "ollama-embeddings";

/// Blocking client for a local or remote Ollama server.
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    /// Builds a client for `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "missing Ollama embedding model name".into(),
            ));
        }
        let client = build_client(SERVICE, timeout, HeaderMap::new())?;
        Ok(Self {
            client,
            endpoint: join_url(base_url, "api/embed"),
            model,
            timeout,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbedRequest {
            model: &self.model,
            input: inputs,
        };
        let parsed: EmbedResponse = send_json(
            SERVICE,
            self.timeout,
            self.client.post(&self.endpoint).json(&request),
        )?;
        ensure_batch_len(inputs.len(), parsed.embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_batch_in_order() {
        let request = EmbedRequest {
            model: "nomic-embed-text",
            input: &["query", "chunk one", "chunk two"],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "nomic-embed-text",
                "input": ["query", "chunk one", "chunk two"]
            })
        );
    }

    #[test]
    fn short_response_is_a_shape_error() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2]]}"#)
                .unwrap();
        let err = ensure_batch_len(2, parsed.embeddings).unwrap_err();
        assert_eq!(err.kind(), "embedding_shape");
    }

    #[test]
    fn blank_model_is_rejected() {
        let err = OllamaEmbedder::new("http://localhost:11434", " ".into(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::Configuration(_)));
    }
}

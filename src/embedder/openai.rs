//! OpenAI-compatible embedding client implementation.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ensure_batch_len, Embedder};
use crate::error::{Result, RetrievalError};
use crate::transport::{build_client, join_url, send_json};

const SERVICE: &str = "openai-embeddings";

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    timeout: Duration,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RetrievalError::Configuration("missing OpenAI API key".into()));
        }
        if model.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "missing OpenAI model name".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| RetrievalError::Configuration("invalid OpenAI API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = build_client(SERVICE, timeout, headers)?;
        Ok(Self {
            client,
            endpoint: join_url(base_url, "embeddings"),
            model,
            dimensions,
            timeout,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };
        let parsed: EmbeddingResponse = send_json(
            SERVICE,
            self.timeout,
            self.client.post(&self.endpoint).json(&request),
        )?;
        into_ordered_vectors(parsed, inputs.len())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Restores input order from the `index` field; the API does not promise positional order.
fn into_ordered_vectors(mut parsed: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    parsed.data.sort_by_key(|entry| entry.index);
    let in_range = parsed
        .data
        .iter()
        .enumerate()
        .all(|(position, entry)| entry.index == position);
    if !in_range {
        return Err(RetrievalError::Decode {
            service: SERVICE,
            message: "embedding indices are not a permutation of the input batch".into(),
        });
    }
    ensure_batch_len(
        expected,
        parsed.data.into_iter().map(|entry| entry.embedding).collect(),
    )
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

//! Embedding model clients.
//!
//! Every client maps a batch of strings to one vector per string, in input order. Clients
//! never retry; a failed call aborts the retrieval that issued it.

pub mod ollama;
pub mod openai;

use crate::error::{Result, RetrievalError};

/// Batched, order-preserving text embedding.
pub trait Embedder: Send + Sync {
    /// Embeds `inputs`; `output[i]` corresponds to `inputs[i]`.
    fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}

/// Checks that a provider answered with exactly one vector per input.
pub(crate) fn ensure_batch_len(expected: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RetrievalError::EmbeddingShape {
            expected,
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}

#![warn(missing_docs)]
//! Retrieval core for answering questions from Wikipedia.
//!
//! Queries are routed either to a lightweight page-summary lookup or to a reasoning agent
//! that drives an on-demand pipeline: fetch a page, split it into overlapping passages,
//! embed passages and query together, and return the passages most similar to the query.

pub mod agent;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod router;
pub mod similarity;
pub mod source;
pub mod summary;
mod transport;
pub mod wikipedia;

pub use agent::{ExecutionBudget, ReasoningAgent, RetrievalTool, ToolInput, ToolLoopAgent};
pub use chunker::{chunk, Chunk, ChunkingConfig, TextChunker};
pub use config::ServiceArgs;
pub use embedder::Embedder;
pub use error::{Result, RetrievalError};
pub use pipeline::{Passage, RetrievalPipeline, RetrievalResult, RetrievalSettings};
pub use retry::{with_retry, RetryPolicy};
pub use router::{classify, PublicError, Reply, Router, RouterConfig, Strategy};
pub use similarity::{cosine_similarity, rank};
pub use source::{ContentSource, Page, SummarySource};
pub use summary::{normalize_title, SummaryConfig, SummaryFallbackTool};
pub use wikipedia::WikipediaClient;

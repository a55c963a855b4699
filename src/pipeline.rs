//! Advanced retrieval path: fetch a page, split it, embed once, rank passages.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::chunker::{Chunk, ChunkingConfig};
use crate::embedder::Embedder;
use crate::error::{Result, RetrievalError};
use crate::similarity;
use crate::source::ContentSource;

/// Longest page title accepted by the retrieval tool.
pub const MAX_TITLE_CHARS: usize = 128;

/// Passage sizing plus result count for one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    /// Token-denominated window geometry.
    pub chunking: ChunkingConfig,
    /// Number of passages kept after ranking.
    pub max_results: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            max_results: 3,
        }
    }
}

/// Ranked chunk returned as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    /// Source window.
    pub chunk: Chunk,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Top passages for one page, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    /// Resolved page title.
    pub page_title: String,
    /// Passages in descending score order.
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    /// Renders the passages as a plain-text context block.
    pub fn render(&self) -> String {
        if self.passages.is_empty() {
            return format!("No passages found on page \"{}\".", self.page_title);
        }
        let mut out = String::new();
        for passage in &self.passages {
            let _ = write!(
                out,
                "Page: {}\nPassage: {} (offset {})\nScore: {:.4}\n{}\n---\n",
                self.page_title,
                passage.chunk.index,
                passage.chunk.start_offset,
                passage.score,
                passage.chunk.text.trim()
            );
        }
        out
    }
}

/// Composes content fetch, chunking, embedding and ranking.
#[derive(Clone)]
pub struct RetrievalPipeline {
    content: Arc<dyn ContentSource>,
    embedder: Arc<dyn Embedder>,
}

impl RetrievalPipeline {
    /// Wires the pipeline to its collaborators.
    pub fn new(content: Arc<dyn ContentSource>, embedder: Arc<dyn Embedder>) -> Self {
        Self { content, embedder }
    }

    /// Retrieves the passages of `page_title` most similar to `query`.
    pub fn retrieve(
        &self,
        page_title: &str,
        query: &str,
        settings: &RetrievalSettings,
    ) -> Result<RetrievalResult> {
        let page_title = page_title.trim();
        let title_len = page_title.chars().count();
        if title_len == 0 || title_len > MAX_TITLE_CHARS {
            return Err(RetrievalError::Configuration(format!(
                "page title must be 1..={MAX_TITLE_CHARS} characters, got {title_len}"
            )));
        }
        if query.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "retrieval query must not be empty".into(),
            ));
        }
        let chunker = settings.chunking.chunker()?;

        let page = self.content.fetch_page_content(page_title)?;
        let chunks: Vec<Chunk> = chunker.chunks(&page.raw_text).collect();
        debug!(
            page = %page.title,
            bytes = page.raw_text.len(),
            chunks = chunks.len(),
            "page chunked"
        );
        if chunks.is_empty() || settings.max_results == 0 {
            return Ok(RetrievalResult {
                page_title: page.title,
                passages: Vec::new(),
            });
        }

        // Position 0 carries the query; the ranker relies on it.
        let mut batch: Vec<&str> = Vec::with_capacity(chunks.len() + 1);
        batch.push(query);
        batch.extend(chunks.iter().map(|chunk| chunk.text.as_str()));
        let mut vectors = self.embedder.embed(&batch)?;
        if vectors.len() != batch.len() {
            return Err(RetrievalError::EmbeddingShape {
                expected: batch.len(),
                actual: vectors.len(),
            });
        }
        let doc_vectors = vectors.split_off(1);
        let query_vector = &vectors[0];
        debug!(model = self.embedder.model(), inputs = batch.len(), "batch embedded");

        let ranked = similarity::rank(query_vector, &doc_vectors, settings.max_results)?;
        let mut slots: Vec<Option<Chunk>> = chunks.into_iter().map(Some).collect();
        let passages = ranked
            .into_iter()
            .filter_map(|(index, score)| {
                slots[index].take().map(|chunk| Passage { chunk, score })
            })
            .collect();
        Ok(RetrievalResult {
            page_title: page.title,
            passages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Page;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedPage(&'static str);

    impl ContentSource for FixedPage {
        fn fetch_page_content(&self, title: &str) -> Result<Page> {
            Ok(Page {
                title: title.to_string(),
                raw_text: self.0.to_string(),
            })
        }
    }

    /// Scores texts by how often they mention "tower"; records every batch it sees.
    #[derive(Default)]
    struct KeywordEmbedder {
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl Embedder for KeywordEmbedder {
        fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.batches
                .lock()
                .unwrap()
                .push(inputs.iter().map(|s| s.to_string()).collect());
            Ok(inputs
                .iter()
                .map(|text| {
                    let hits = text.matches("tower").count() as f32;
                    vec![hits, 1.0]
                })
                .collect())
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    /// Always fails; counts how often it was asked.
    #[derive(Default)]
    struct BrokenEmbedder {
        calls: AtomicUsize,
    }

    impl Embedder for BrokenEmbedder {
        fn embed(&self, _inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RetrievalError::Network {
                service: "ollama-embeddings",
                message: "connection refused".into(),
            })
        }

        fn model(&self) -> &str {
            "broken"
        }
    }

    fn settings(size: usize, overlap: usize, max_results: usize) -> RetrievalSettings {
        RetrievalSettings {
            chunking: ChunkingConfig {
                passage_tokens: size,
                overlap_tokens: overlap,
                chars_per_token: 1,
            },
            max_results,
        }
    }

    #[test]
    fn embeds_query_first_in_one_batch_and_ranks() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let pipeline = RetrievalPipeline::new(
            Arc::new(FixedPage("aaaaaaaaaatower towerbbbbbbbbbbbbbbbbcccccc")),
            embedder.clone(),
        );
        let result = pipeline
            .retrieve("Eiffel Tower", "tower tower", &settings(10, 0, 2))
            .unwrap();

        let batches = embedder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0], "tower tower");
        assert_eq!(batches[0].len(), 6);

        assert_eq!(result.page_title, "Eiffel Tower");
        assert_eq!(result.passages.len(), 2);
        assert_eq!(result.passages[0].chunk.index, 1);
        assert!(result.passages[0].score >= result.passages[1].score);
    }

    #[test]
    fn rejects_bad_geometry_before_fetching() {
        let pipeline = RetrievalPipeline::new(
            Arc::new(FixedPage("text")),
            Arc::new(BrokenEmbedder::default()),
        );
        let err = pipeline
            .retrieve("Paris", "history", &settings(5, 5, 3))
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
    }

    #[test]
    fn rejects_overlong_titles() {
        let pipeline = RetrievalPipeline::new(
            Arc::new(FixedPage("text")),
            Arc::new(BrokenEmbedder::default()),
        );
        let title = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(pipeline
            .retrieve(&title, "history", &RetrievalSettings::default())
            .is_err());
    }

    #[test]
    fn empty_page_skips_embedding() {
        let embedder = Arc::new(BrokenEmbedder::default());
        let pipeline = RetrievalPipeline::new(Arc::new(FixedPage("")), embedder.clone());
        let result = pipeline
            .retrieve("Empty", "anything", &RetrievalSettings::default())
            .unwrap();
        assert!(result.passages.is_empty());
        assert!(result.render().contains("No passages"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn embedding_failure_aborts_without_retry() {
        let embedder = Arc::new(BrokenEmbedder::default());
        let pipeline = RetrievalPipeline::new(
            Arc::new(FixedPage("some reasonably long page text")),
            embedder.clone(),
        );
        let err = pipeline
            .retrieve("Page", "text", &settings(8, 2, 3))
            .unwrap_err();
        assert_eq!(err.kind(), "network");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    fn sample_result() -> RetrievalResult {
        RetrievalResult {
            page_title: "Paris".to_string(),
            passages: vec![
                Passage {
                    chunk: Chunk {
                        text: "Capital of France. ".to_string(),
                        index: 2,
                        start_offset: 700,
                    },
                    score: 0.91,
                },
                Passage {
                    chunk: Chunk {
                        text: "On the Seine.".to_string(),
                        index: 0,
                        start_offset: 0,
                    },
                    score: 0.5,
                },
            ],
        }
    }

    #[test]
    fn render_lists_passages_best_first() {
        let rendered = sample_result().render();
        assert!(rendered.starts_with(
            "Page: Paris\nPassage: 2 (offset 700)\nScore: 0.9100\nCapital of France.\n---\n"
        ));
        assert!(rendered.ends_with("Passage: 0 (offset 0)\nScore: 0.5000\nOn the Seine.\n---\n"));
    }

    #[test]
    fn result_serializes_with_chunk_positions() {
        let json = serde_json::to_value(sample_result()).unwrap();
        assert_eq!(json["page_title"], "Paris");
        assert_eq!(json["passages"][0]["chunk"]["index"], 2);
        assert_eq!(json["passages"][0]["chunk"]["start_offset"], 700);
        assert_eq!(json["passages"][1]["chunk"]["text"], "On the Seine.");
    }
}

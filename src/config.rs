//! Command-line and environment configuration shared by the binaries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::agent::{AgentSampling, ExecutionBudget, RetrievalTool, ToolLoopAgent};
use crate::chunker::ChunkingConfig;
use crate::embedder::ollama::OllamaEmbedder;
use crate::embedder::openai::OpenAiEmbedder;
use crate::embedder::Embedder;
use crate::llm::{AnthropicProvider, LlmProvider, OllamaProvider, OpenAiProvider};
use crate::pipeline::{RetrievalPipeline, RetrievalSettings};
use crate::router::{Router, RouterConfig};
use crate::summary::{SummaryConfig, SummaryFallbackTool};
use crate::wikipedia::{WikipediaClient, DEFAULT_ACTION_API, DEFAULT_REST_API};

/// Embedding backends.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbeddingBackend {
    /// Ollama `/api/embed`.
    Ollama,
    /// OpenAI-compatible `/embeddings`.
    Openai,
}

/// Chat model backends for the reasoning agent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ChatBackend {
    /// Ollama `/api/chat`.
    Ollama,
    /// OpenAI chat completions.
    Openai,
    /// Anthropic messages.
    Anthropic,
}

/// Retrieval, routing and provider knobs; flattened into each binary's CLI.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Passage size in approximate tokens
    #[arg(long, env = "WIKIRAG_PASSAGE_TOKENS", default_value_t = 400)]
    pub passage_tokens: usize,

    /// Overlap between adjacent passages in approximate tokens
    #[arg(long, env = "WIKIRAG_OVERLAP_TOKENS", default_value_t = 50)]
    pub overlap_tokens: usize,

    /// Characters assumed per token when sizing passages
    #[arg(long, env = "WIKIRAG_CHARS_PER_TOKEN", default_value_t = 4)]
    pub chars_per_token: usize,

    /// Passages returned per retrieval
    #[arg(long, env = "WIKIRAG_MAX_RESULTS", default_value_t = 3)]
    pub max_results: usize,

    /// Summary lookup attempts (first attempt included)
    #[arg(long, env = "WIKIRAG_SUMMARY_MAX_RETRIES", default_value_t = 3)]
    pub summary_max_retries: usize,

    /// Per-request summary timeout in milliseconds
    #[arg(long, env = "WIKIRAG_SUMMARY_TIMEOUT_MS", default_value_t = 5000)]
    pub summary_timeout_ms: u64,

    /// Delay before the second summary attempt in milliseconds (doubles afterwards)
    #[arg(long, env = "WIKIRAG_SUMMARY_BACKOFF_MS", default_value_t = 200)]
    pub summary_backoff_ms: u64,

    /// Agent iterations before giving up
    #[arg(long, env = "WIKIRAG_MAX_ITERATIONS", default_value_t = 8)]
    pub max_iterations: usize,

    /// Agent retries allowed for one step
    #[arg(long, env = "WIKIRAG_MAX_RETRIES_PER_STEP", default_value_t = 3)]
    pub max_retries_per_step: usize,

    /// Agent retries allowed across a run
    #[arg(long, env = "WIKIRAG_TOTAL_MAX_RETRIES", default_value_t = 3)]
    pub total_max_retries: usize,

    /// MediaWiki Action API endpoint
    #[arg(long, env = "WIKIRAG_WIKIPEDIA_API", default_value = DEFAULT_ACTION_API)]
    pub wikipedia_api: String,

    /// Wikipedia REST API base
    #[arg(long, env = "WIKIRAG_WIKIPEDIA_REST", default_value = DEFAULT_REST_API)]
    pub wikipedia_rest_api: String,

    /// Seconds before page-content requests time out
    #[arg(long, env = "WIKIRAG_WIKIPEDIA_TIMEOUT_SECS", default_value_t = 30)]
    pub wikipedia_timeout_secs: u64,

    /// Embedding backend
    #[arg(long, env = "WIKIRAG_EMBEDDING_PROVIDER", value_enum, default_value_t = EmbeddingBackend::Ollama)]
    pub embedding_provider: EmbeddingBackend,

    /// Embedding model (defaults per backend)
    #[arg(long, env = "WIKIRAG_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Optional embedding dimension override (OpenAI only)
    #[arg(long, env = "WIKIRAG_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Seconds before embedding requests time out
    #[arg(long, env = "WIKIRAG_EMBEDDING_TIMEOUT_SECS", default_value_t = 30)]
    pub embedding_timeout_secs: u64,

    /// Chat model backend for the reasoning agent
    #[arg(long, env = "WIKIRAG_LLM_PROVIDER", value_enum, default_value_t = ChatBackend::Ollama)]
    pub llm_provider: ChatBackend,

    /// Chat model (defaults per backend)
    #[arg(long, env = "WIKIRAG_CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Sampling temperature for the chat model
    #[arg(long, env = "WIKIRAG_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    /// Maximum tokens per chat completion
    #[arg(long, env = "WIKIRAG_MAX_COMPLETION_TOKENS", default_value_t = 2048)]
    pub max_completion_tokens: usize,

    /// Seconds before chat requests time out
    #[arg(long, env = "WIKIRAG_LLM_TIMEOUT_SECS", default_value_t = 120)]
    pub llm_timeout_secs: u64,

    /// Ollama server base URL
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    pub ollama_base_url: String,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "WIKIRAG_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Enable debug logging
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl ServiceArgs {
    /// Passage geometry in tokens.
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            passage_tokens: self.passage_tokens,
            overlap_tokens: self.overlap_tokens,
            chars_per_token: self.chars_per_token,
        }
    }

    /// Settings handed to every retrieval.
    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            chunking: self.chunking(),
            max_results: self.max_results,
        }
    }

    /// Limits for both routing paths.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            summary: SummaryConfig {
                max_retries: self.summary_max_retries,
                timeout_ms: self.summary_timeout_ms,
                backoff: Duration::from_millis(self.summary_backoff_ms),
            },
            budget: ExecutionBudget {
                max_iterations: self.max_iterations,
                max_retries_per_step: self.max_retries_per_step,
                total_max_retries: self.total_max_retries,
            },
        }
    }

    fn wikipedia(&self) -> Result<Arc<WikipediaClient>> {
        let client = WikipediaClient::new(
            &self.wikipedia_api,
            &self.wikipedia_rest_api,
            Duration::from_secs(self.wikipedia_timeout_secs.max(1)),
        )
        .context("failed to build Wikipedia client")?;
        Ok(Arc::new(client))
    }

    fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let timeout = Duration::from_secs(self.embedding_timeout_secs.max(1));
        let embedder: Arc<dyn Embedder> = match self.embedding_provider {
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(
                &self.ollama_base_url,
                self.embedding_model
                    .clone()
                    .unwrap_or_else(|| "nomic-embed-text".to_string()),
                timeout,
            )?),
            EmbeddingBackend::Openai => Arc::new(OpenAiEmbedder::new(
                self.openai_api_key.as_deref().unwrap_or_default(),
                &self.openai_base_url,
                self.embedding_model
                    .clone()
                    .unwrap_or_else(|| "text-embedding-3-small".to_string()),
                self.embedding_dimensions,
                timeout,
            )?),
        };
        Ok(embedder)
    }

    fn chat_model(&self) -> Result<Arc<dyn LlmProvider>> {
        let timeout = Duration::from_secs(self.llm_timeout_secs.max(1));
        let model = |fallback: &str| {
            self.chat_model
                .clone()
                .unwrap_or_else(|| fallback.to_string())
        };
        let provider: Arc<dyn LlmProvider> = match self.llm_provider {
            ChatBackend::Ollama => Arc::new(OllamaProvider::new(
                &self.ollama_base_url,
                model("granite3.1-dense:8b"),
                timeout,
            )?),
            ChatBackend::Openai => Arc::new(OpenAiProvider::new(
                self.openai_api_key.as_deref().unwrap_or_default(),
                &self.openai_base_url,
                model("gpt-4o-mini"),
                timeout,
            )?),
            ChatBackend::Anthropic => Arc::new(AnthropicProvider::new(
                self.anthropic_api_key.as_deref().unwrap_or_default(),
                model("claude-3-5-haiku-latest"),
                timeout,
            )?),
        };
        Ok(provider)
    }

    fn pipeline_with(&self, wikipedia: Arc<WikipediaClient>) -> Result<RetrievalPipeline> {
        // Fail on bad geometry at startup rather than on the first request.
        self.chunking()
            .chunker()
            .context("invalid passage configuration")?;
        Ok(RetrievalPipeline::new(wikipedia, self.embedder()?))
    }

    fn summary_tool_with(&self, wikipedia: Arc<WikipediaClient>) -> SummaryFallbackTool {
        SummaryFallbackTool::new(wikipedia, Duration::from_millis(self.summary_backoff_ms))
    }

    /// Builds the advanced-path pipeline.
    pub fn build_pipeline(&self) -> Result<RetrievalPipeline> {
        self.pipeline_with(self.wikipedia()?)
    }

    /// Builds the basic-path summary tool.
    pub fn build_summary_tool(&self) -> Result<SummaryFallbackTool> {
        Ok(self.summary_tool_with(self.wikipedia()?))
    }

    /// Builds the router and every collaborator it needs, sharing one Wikipedia client.
    pub fn build_router(&self) -> Result<Router> {
        let wikipedia = self.wikipedia()?;
        let tool = RetrievalTool::new(
            self.pipeline_with(wikipedia.clone())?,
            self.retrieval_settings(),
        );
        let agent = ToolLoopAgent::new(
            self.chat_model()?,
            AgentSampling {
                temperature: self.temperature,
                max_tokens: self.max_completion_tokens,
            },
        );
        Ok(Router::new(
            self.summary_tool_with(wikipedia),
            Arc::new(agent),
            tool,
            self.router_config(),
        ))
    }
}

/// Installs the global `tracing` subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "wikirag=debug,tower_http=debug"
    } else {
        "wikirag=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

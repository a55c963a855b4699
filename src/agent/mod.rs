//! Downstream reasoning agent and the retrieval tool it drives.

mod tool_loop;

use serde::Deserialize;

use crate::error::Result;
use crate::pipeline::{RetrievalPipeline, RetrievalSettings};

pub use tool_loop::{parse_reply, AgentReply, AgentSampling, ToolLoopAgent};

/// Caps on the agent's reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionBudget {
    /// Model turns that may produce a tool call before a final answer is required.
    pub max_iterations: usize,
    /// Retries allowed for a single failing step.
    pub max_retries_per_step: usize,
    /// Retries allowed across the whole run.
    pub total_max_retries: usize,
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            max_retries_per_step: 3,
            total_max_retries: 3,
        }
    }
}

/// Arguments the model supplies when calling the retrieval tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolInput {
    /// Wikipedia page to search, e.g. `New York`.
    pub page: String,
    /// Descriptive phrase to look up within the page.
    pub query: String,
}

/// Wraps a [`RetrievalPipeline`] with fixed settings so the agent can call it by name.
#[derive(Clone)]
pub struct RetrievalTool {
    pipeline: RetrievalPipeline,
    settings: RetrievalSettings,
}

impl RetrievalTool {
    /// Name the model uses to invoke the tool.
    pub const NAME: &'static str = "wikipedia";

    /// Binds the pipeline to the passage settings used for every call.
    pub fn new(pipeline: RetrievalPipeline, settings: RetrievalSettings) -> Self {
        Self { pipeline, settings }
    }

    /// Human-readable contract included in the agent's instructions.
    pub fn description(&self) -> String {
        format!(
            "Search a single Wikipedia page and return the {} passages most relevant to a query. \
             Input is a JSON object: {{\"page\": \"<page title, e.g. New York>\", \
             \"query\": \"<descriptive phrase to look up within the page>\"}}.",
            self.settings.max_results
        )
    }

    /// Runs the pipeline and renders the ranked passages as an observation.
    pub fn call(&self, input: &ToolInput) -> Result<String> {
        self.pipeline
            .retrieve(&input.page, &input.query, &self.settings)
            .map(|result| result.render())
    }
}

/// A reasoning loop that answers a prompt, optionally calling the retrieval tool.
pub trait ReasoningAgent: Send + Sync {
    /// Produces a final answer for `prompt` within `budget`.
    ///
    /// Exceeding any budget yields [`crate::RetrievalError::AgentExecution`].
    fn run(&self, prompt: &str, tool: &RetrievalTool, budget: &ExecutionBudget) -> Result<String>;
}

//! Text-protocol tool loop over a chat model.
//!
//! The model replies either with `Final Answer: ...` or with an
//! `Action: wikipedia` / `Action Input: {...}` pair; tool output is fed back as an
//! `Observation:` turn.

use std::sync::Arc;

use serde_json::Deserializer;
use tracing::{debug, warn};

use super::{ExecutionBudget, ReasoningAgent, RetrievalTool, ToolInput};
use crate::error::{Result, RetrievalError};
use crate::llm::{ChatMessage, LlmProvider, ProviderRequest};

const FINAL_MARKER: &str = "Final Answer:";
const ACTION_MARKER: &str = "Action:";
const INPUT_MARKER: &str = "Action Input:";

/// Parsed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// The model is done.
    Final(String),
    /// The model wants the named tool run with `input`.
    Action {
        /// Tool name as written by the model.
        tool: String,
        /// Decoded tool arguments.
        input: ToolInput,
    },
}

/// Extracts the final answer or tool call from a raw model reply.
pub fn parse_reply(reply: &str) -> std::result::Result<AgentReply, String> {
    if let Some(pos) = reply.find(FINAL_MARKER) {
        let answer = reply[pos + FINAL_MARKER.len()..].trim();
        if answer.is_empty() {
            return Err("final answer is empty".into());
        }
        return Ok(AgentReply::Final(answer.to_string()));
    }
    let input_pos = reply
        .find(INPUT_MARKER)
        .ok_or_else(|| format!("reply contains neither `{FINAL_MARKER}` nor `{INPUT_MARKER}`"))?;
    let tool = reply[..input_pos]
        .rfind(ACTION_MARKER)
        .map(|pos| reply[pos + ACTION_MARKER.len()..input_pos].trim())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| format!("`{INPUT_MARKER}` is not preceded by `{ACTION_MARKER}`"))?;
    let raw_input = reply[input_pos + INPUT_MARKER.len()..].trim_start();
    // Only the first JSON value counts; models often keep talking after it.
    let input = Deserializer::from_str(raw_input)
        .into_iter::<ToolInput>()
        .next()
        .ok_or_else(|| "action input is missing".to_string())?
        .map_err(|err| format!("action input is not valid JSON: {err}"))?;
    Ok(AgentReply::Action {
        tool: tool.to_string(),
        input,
    })
}

/// Sampling parameters for the agent's chat model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSampling {
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap per turn.
    pub max_tokens: usize,
}

impl Default for AgentSampling {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2048,
        }
    }
}

/// Bounded reasoning loop that lets a chat model call the retrieval tool.
#[derive(Clone)]
pub struct ToolLoopAgent {
    llm: Arc<dyn LlmProvider>,
    sampling: AgentSampling,
}

enum Step {
    Done(String),
    Observed { reply: String, observation: String },
    Rejected { reply: String, problem: String },
}

impl ToolLoopAgent {
    /// Builds the agent around a chat model.
    pub fn new(llm: Arc<dyn LlmProvider>, sampling: AgentSampling) -> Self {
        Self { llm, sampling }
    }

    fn instructions(tool: &RetrievalTool) -> String {
        format!(
            "You answer questions using facts retrieved from Wikipedia.\n\n\
             Available tool:\n- {name}: {description}\n\n\
             To use the tool reply with exactly:\n\
             Thought: <your reasoning>\n\
             {ACTION_MARKER} {name}\n\
             {INPUT_MARKER} {{\"page\": \"...\", \"query\": \"...\"}}\n\n\
             You will receive an `Observation:` with the passages. When you can answer, reply with:\n\
             Thought: <your reasoning>\n\
             {FINAL_MARKER} <answer grounded in the observations>",
            name = RetrievalTool::NAME,
            description = tool.description(),
        )
    }

    fn step(&self, system: &str, transcript: &[ChatMessage], tool: &RetrievalTool) -> Result<Step> {
        let reply = self.llm.answer(&ProviderRequest {
            system,
            messages: transcript,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        })?;
        let parsed = match parse_reply(&reply) {
            Ok(parsed) => parsed,
            Err(problem) => return Ok(Step::Rejected { reply, problem }),
        };
        match parsed {
            AgentReply::Final(answer) => Ok(Step::Done(answer)),
            AgentReply::Action { tool: name, .. } if name != RetrievalTool::NAME => {
                Ok(Step::Rejected {
                    reply,
                    problem: format!(
                        "unknown tool `{name}`; the only tool is `{}`",
                        RetrievalTool::NAME
                    ),
                })
            }
            AgentReply::Action { input, .. } => {
                debug!(page = %input.page, query = %input.query, "agent tool call");
                match tool.call(&input) {
                    Ok(observation) => Ok(Step::Observed { reply, observation }),
                    // Fatal retrieval errors still go back to the model; it may pick another page.
                    Err(err) => Ok(Step::Rejected {
                        reply,
                        problem: format!("tool `{}` failed: {err}", RetrievalTool::NAME),
                    }),
                }
            }
        }
    }
}

impl ReasoningAgent for ToolLoopAgent {
    fn run(&self, prompt: &str, tool: &RetrievalTool, budget: &ExecutionBudget) -> Result<String> {
        let system = Self::instructions(tool);
        let mut transcript = vec![ChatMessage::user(prompt)];
        let mut total_retries = 0usize;

        for iteration in 1..=budget.max_iterations {
            let mut step_retries = 0usize;
            loop {
                let failure = match self.step(&system, &transcript, tool) {
                    Ok(Step::Done(answer)) => {
                        debug!(iteration, total_retries, "agent finished");
                        return Ok(answer);
                    }
                    Ok(Step::Observed { reply, observation }) => {
                        transcript.push(ChatMessage::assistant(reply));
                        transcript.push(ChatMessage::user(format!("Observation: {observation}")));
                        break;
                    }
                    Ok(Step::Rejected { reply, problem }) => {
                        transcript.push(ChatMessage::assistant(reply));
                        transcript.push(ChatMessage::user(format!(
                            "Error: {problem}. Follow the required format."
                        )));
                        problem
                    }
                    Err(err) => err.to_string(),
                };

                step_retries += 1;
                total_retries += 1;
                warn!(iteration, step_retries, total_retries, %failure, "agent step failed");
                if step_retries > budget.max_retries_per_step {
                    return Err(RetrievalError::AgentExecution(format!(
                        "step {iteration} exceeded {} retries: {failure}",
                        budget.max_retries_per_step
                    )));
                }
                if total_retries > budget.total_max_retries {
                    return Err(RetrievalError::AgentExecution(format!(
                        "run exceeded {} total retries: {failure}",
                        budget.total_max_retries
                    )));
                }
            }
        }
        Err(RetrievalError::AgentExecution(format!(
            "no final answer within {} iterations",
            budget.max_iterations
        )))
    }
}

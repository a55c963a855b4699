use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, LlmProvider, ProviderRequest};
use crate::error::{Result, RetrievalError};
use crate::transport::{build_client, send_json};

const SERVICE: &str = "anthropic";
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic messages API client.
pub struct AnthropicProvider {
    model: String,
    client: Client,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Builds a client authenticated with `api_key`.
    pub fn new(api_key: &str, model: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "ANTHROPIC_API_KEY must be set for the Anthropic provider".into(),
            ));
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| RetrievalError::Configuration("invalid Anthropic API key".into()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = build_client(SERVICE, timeout, headers)?;
        Ok(Self {
            model,
            client,
            timeout,
        })
    }
}

impl LlmProvider for AnthropicProvider {
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages: request.messages,
        };
        let parsed: AnthropicResponse = send_json(
            SERVICE,
            self.timeout,
            self.client.post(MESSAGES_URL).json(&body),
        )?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.is_empty() {
            return Err(RetrievalError::Decode {
                service: SERVICE,
                message: "response missing text content".into(),
            });
        }
        Ok(answer)
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let body = r#"{"content":[
            {"type":"text","text":"Thought: done"},
            {"type":"tool_use","id":"x","name":"y","input":{}},
            {"type":"text","text":"Final Answer: 1889"}
        ]}"#;
        let parsed: AnthropicResponse = serde_json::from_str(body).unwrap();
        let texts: Vec<String> = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect();
        assert_eq!(texts, vec!["Thought: done", "Final Answer: 1889"]);
    }
}

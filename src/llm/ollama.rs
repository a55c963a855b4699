use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::{LlmProvider, ProviderRequest, Role};
use crate::error::{Result, RetrievalError};
use crate::transport::{build_client, join_url, send_json};

const SERVICE: &str = "ollama-chat";

/// Non-streaming Ollama `/api/chat` client.
pub struct OllamaProvider {
    model: String,
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl OllamaProvider {
    /// Builds a client for `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "missing Ollama chat model name".into(),
            ));
        }
        let client = build_client(SERVICE, timeout, HeaderMap::new())?;
        Ok(Self {
            model,
            endpoint: join_url(base_url, "api/chat"),
            client,
            timeout,
        })
    }
}

impl LlmProvider for OllamaProvider {
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(OllamaMessage {
            role: "system",
            content: request.system,
        });
        messages.extend(request.messages.iter().map(|message| OllamaMessage {
            role: match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &message.content,
        }));
        let body = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
        let parsed: OllamaChatResponse = send_json(
            SERVICE,
            self.timeout,
            self.client.post(&self.endpoint).json(&body),
        )?;
        Ok(parsed.message.content)
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaReply,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_non_streaming_reply() {
        let body = r#"{"model":"granite3.1-dense:8b","created_at":"2024-12-18T00:00:00Z",
            "message":{"role":"assistant","content":"Final Answer: Paris"},"done":true}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "Final Answer: Paris");
    }

    #[test]
    fn options_map_to_ollama_names() {
        let body = OllamaChatRequest {
            model: "granite3.1-dense:8b",
            messages: Vec::new(),
            stream: false,
            options: OllamaOptions {
                temperature: 0.0,
                num_predict: 2048,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["options"]["num_predict"], 2048);
        assert_eq!(json["stream"], false);
    }
}

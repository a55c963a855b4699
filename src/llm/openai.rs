use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, LlmProvider, ProviderRequest};
use crate::error::{Result, RetrievalError};
use crate::transport::{build_client, join_url, send_json};

const SERVICE: &str = "openai-chat";

/// OpenAI chat completions client.
pub struct OpenAiProvider {
    model: String,
    endpoint: String,
    client: Client,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Builds a client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: &str, base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "OPENAI_API_KEY must be set for the OpenAI provider".into(),
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
            model,
            endpoint: join_url(base_url, "chat/completions"),
            client,
            timeout,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: request.system,
        });
        messages.extend(request.messages.iter().map(WireMessage::from));
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages,
        };
        let parsed: ChatResponse = send_json(
            SERVICE,
            self.timeout,
            self.client.post(&self.endpoint).json(&body),
        )?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| RetrievalError::Decode {
                service: SERVICE,
                message: "response has no message content".into(),
            })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        let role = match message.role {
            super::Role::User => "user",
            super::Role::Assistant => "assistant",
        };
        Self {
            role,
            content: &message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

//! Blocking HTTP helpers shared by the Wikipedia, embedding and chat adapters.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::{Result, RetrievalError};

pub(crate) const USER_AGENT: &str = concat!(
    "wikirag/",
    env!("CARGO_PKG_VERSION"),
    " (retrieval-augmented chatbot backend)"
);

/// Builds a blocking client with a per-request timeout.
pub(crate) fn build_client(
    service: &'static str,
    timeout: Duration,
    headers: HeaderMap,
) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|err| {
            RetrievalError::Configuration(format!("failed to build {service} HTTP client: {err}"))
        })
}

/// Sends `request` and decodes a JSON body, mapping every failure onto [`RetrievalError`].
///
/// Non-success statuses become [`RetrievalError::Upstream`] with the response body attached.
pub(crate) fn send_json<T: DeserializeOwned>(
    service: &'static str,
    timeout: Duration,
    request: RequestBuilder,
) -> Result<T> {
    let resp = request
        .send()
        .map_err(|err| RetrievalError::from_transport(service, timeout, err))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(RetrievalError::Upstream {
            service,
            status: status.as_u16(),
            body,
        });
    }
    let text = resp
        .text()
        .map_err(|err| RetrievalError::from_transport(service, timeout, err))?;
    serde_json::from_str(&text).map_err(|err| RetrievalError::Decode {
        service,
        message: err.to_string(),
    })
}

/// Joins a base URL and a path without doubling the separator.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

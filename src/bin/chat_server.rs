use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use wikirag::config::{init_tracing, ServiceArgs};
use wikirag::{classify, Reply, Strategy};

const INVALID_PROMPT: &str = "Invalid input. 'prompt' is required and must be a string.";

#[derive(Parser, Debug)]
#[command(
    name = "wikirag-server",
    about = "HTTP chat endpoint that answers questions from Wikipedia"
)]
struct ServerCli {
    /// Address to bind the HTTP server to (host:port); overrides --port.
    #[arg(long, env = "WIKIRAG_BIND")]
    bind: Option<String>,

    /// Port to listen on when no bind address is given.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Advanced-path requests allowed in flight at once; others wait for a slot.
    #[arg(long, env = "WIKIRAG_MAX_CONCURRENT_ADVANCED", default_value_t = 4)]
    max_concurrent_advanced: usize,

    #[command(flatten)]
    service: ServiceArgs,
}

impl ServerCli {
    fn bind_address(&self) -> String {
        self.bind
            .clone()
            .unwrap_or_else(|| format!("0.0.0.0:{}", self.port))
    }
}

#[derive(Clone)]
struct AppState {
    router: Arc<wikirag::Router>,
    advanced_slots: Arc<Semaphore>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();
    init_tracing(cli.service.verbose);
    let router = cli
        .service
        .build_router()
        .context("failed to assemble retrieval router")?;
    let state = AppState {
        router: Arc::new(router),
        advanced_slots: Arc::new(Semaphore::new(cli.max_concurrent_advanced.max(1))),
    };
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind = cli.bind_address();
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "wikirag-server listening");
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Reply>, ApiError> {
    let prompt = match payload {
        Ok(Json(request)) => valid_prompt(request).ok_or_else(|| bad_request(INVALID_PROMPT))?,
        Err(rejection) => {
            info!(%rejection, "rejected chat payload");
            return Err(bad_request(INVALID_PROMPT));
        }
    };

    // Only the agent path is expensive enough to need a concurrency bound.
    let permit = match classify(&prompt) {
        Strategy::Advanced => Some(
            state
                .advanced_slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| {
                    error!(error = %err, "advanced request semaphore closed");
                    internal_error()
                })?,
        ),
        Strategy::Basic => None,
    };

    let router = state.router.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        router.handle(&prompt)
    })
    .await
    .map_err(|err| {
        error!(error = %err, "chat worker join error");
        internal_error()
    })?;
    outcome.map(Json).map_err(|_| internal_error())
}

fn valid_prompt(request: ChatRequest) -> Option<String> {
    request.prompt.filter(|prompt| !prompt.trim().is_empty())
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

fn internal_error() -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: wikirag::router::GENERIC_ERROR_MESSAGE.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> ChatRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn blank_or_missing_prompts_are_invalid() {
        assert_eq!(valid_prompt(request("{}")), None);
        assert_eq!(valid_prompt(request(r#"{"prompt":"   "}"#)), None);
        assert_eq!(valid_prompt(request(r#"{"prompt":null}"#)), None);
    }

    #[test]
    fn non_string_prompt_fails_to_deserialize() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"prompt":42}"#).is_err());
    }

    #[test]
    fn keeps_prompt_text_untouched() {
        assert_eq!(
            valid_prompt(request(r#"{"prompt":" Who built the Eiffel Tower? "}"#)),
            Some(" Who built the Eiffel Tower? ".to_string())
        );
    }

    #[test]
    fn bind_address_falls_back_to_port() {
        let cli = ServerCli::try_parse_from(["wikirag-server", "--port", "8081"]).unwrap();
        assert_eq!(cli.bind_address(), "0.0.0.0:8081");

        let cli = ServerCli::try_parse_from([
            "wikirag-server",
            "--port",
            "8081",
            "--bind",
            "127.0.0.1:9000",
        ])
        .unwrap();
        assert_eq!(cli.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn error_bodies_use_the_error_field() {
        let (status, Json(body)) = internal_error();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], wikirag::router::GENERIC_ERROR_MESSAGE);
    }
}

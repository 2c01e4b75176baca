#[cfg(test)]
#[path = "server_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use rust_embed::RustEmbed;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatRequest;
use crate::domain::models::ChatResponse;
use crate::domain::models::ErrorResponse;
use crate::domain::models::ModelListResponse;
use crate::domain::models::Prompt;
use crate::domain::models::Runner;
use crate::domain::models::RunnerError;
use crate::domain::models::RunnerRef;
use crate::infrastructure::runners::Ollama;

const INVALID_PARAMS: &str = "Invalid parameters";
const SPAWN_FAILED: &str = "Failed to start the model";
const CHAT_FAILED: &str = "Failed to chat with the model";
const LIST_FAILED: &str = "Failed to list models";

#[derive(RustEmbed)]
#[folder = "public/"]
struct Assets;

#[derive(Clone)]
pub struct AppState {
    runner: RunnerRef,
}

impl AppState {
    pub fn new(runner: RunnerRef) -> AppState {
        return AppState { runner };
    }
}

pub fn router(state: AppState) -> Router {
    return Router::new()
        .route("/api/llms", get(list_llms))
        .route("/api/chat", post(chat))
        .fallback(static_asset)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse {
        error: message.to_string(),
    };

    return (status, Json(body)).into_response();
}

fn log_runner_error(err: &RunnerError) {
    match err {
        RunnerError::Exit { stderr, code, .. } => {
            tracing::error!(code = ?code, stderr = stderr.trim(), "Model runner failed");
        }
        _ => {
            tracing::error!(err = %err, "Model runner failed");
        }
    }
}

async fn list_llms(State(state): State<AppState>) -> Response {
    match state.runner.list_models().await {
        Ok(llms) => return Json(ModelListResponse { llms }).into_response(),
        Err(err) => {
            log_runner_error(&err);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, LIST_FAILED);
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(reason = %rejection.body_text(), "Rejected malformed chat request");
            return error_response(StatusCode::BAD_REQUEST, INVALID_PARAMS);
        }
    };

    if !req.is_valid() {
        tracing::warn!(
            llm = %req.llm,
            messages = req.messages.len(),
            "Rejected incomplete chat request"
        );
        return error_response(StatusCode::BAD_REQUEST, INVALID_PARAMS);
    }

    let prompt = Prompt::from_messages(&req.messages);
    tracing::info!(
        llm = %req.llm,
        messages = req.messages.len(),
        "Running chat completion"
    );

    match state.runner.run(&req.llm, &prompt).await {
        Ok(reply) => {
            let body = ChatResponse {
                response: reply.trim().to_string(),
            };
            return Json(body).into_response();
        }
        Err(err) => {
            log_runner_error(&err);
            if let RunnerError::Spawn { .. } = err {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, SPAWN_FAILED);
            }
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILED);
        }
    }
}

async fn static_asset(uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/');
    if path.is_empty() {
        path = "index.html";
    }

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            return (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data.into_owned(),
            )
                .into_response();
        }
        None => return StatusCode::NOT_FOUND.into_response(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(err = ?err, "Failed to listen for the shutdown signal");
        futures::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub async fn start() -> Result<()> {
    let runner = Ollama::from_config()?;
    if let Err(err) = runner.health_check().await {
        tracing::warn!(
            err = %err,
            "Model runner is unavailable, chat requests will fail until it can be started"
        );
    }

    let state = AppState::new(Arc::new(runner));
    let addr = format!(
        "{}:{}",
        Config::get(ConfigKey::Host),
        Config::get(ConfigKey::Port)
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| return format!("Failed to bind {addr}"))?;
    tracing::info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    return Ok(());
}

use super::error::ApiError;
use super::types::{
    GenerateBody, LIVENESS_MESSAGE, MessageResponse, PullBody, StopAllResponse,
    WorkerStartedResponse, WorkerStatusResponse,
};
use crate::config::BackendConfiguration;
use crate::control::{
    ControlError, ControlPlaneService, ProviderStatusReport, WorkerStatusReport,
};
use crate::llm::{GenerationRequest, LLMError};
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::BoxStream;
use futures::{StreamExt, future};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

type AppState = Arc<ControlPlaneService>;
type ApiResult<T> = Result<T, ApiError>;

/// Build the axum router over a control plane.
pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/config", get(get_config).post(update_config))
        .route("/worker/start/{name}", post(start_worker))
        .route("/worker/stop/{name}", post(stop_worker))
        .route("/worker/stop_all", post(stop_all_workers))
        .route("/worker/status/{name}", get(worker_status))
        .route("/worker/status_all", get(all_worker_statuses))
        .route("/worker/running", get(running_workers))
        .route("/generation/run", post(generate))
        .route("/generation/models", get(list_models))
        .route("/generation/pull", post(pull_model))
        .route("/generation/status", get(provider_status))
        .route("/generation/start", post(start_provider))
        .with_state(service)
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: LIVENESS_MESSAGE.to_string(),
    })
}

async fn get_config(State(service): State<AppState>) -> Json<BackendConfiguration> {
    Json(service.get_config().await)
}

async fn update_config(
    State(service): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<BackendConfiguration>> {
    let text = std::str::from_utf8(&body)
        .map_err(|e| ControlError::InvalidRequest(format!("body is not UTF-8: {}", e)))?;
    let config = BackendConfiguration::from_json(text).map_err(ControlError::from)?;
    let accepted = service.update_config(config).await?;
    Ok(Json(accepted))
}

async fn start_worker(
    State(service): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<WorkerStartedResponse>> {
    let pid = service.start_worker(&name).await?;
    info!("Worker {} started with PID {}", name, pid);
    Ok(Json(WorkerStartedResponse {
        message: format!("Worker {} started with PID {}", name, pid),
        name,
        pid,
    }))
}

async fn stop_worker(
    State(service): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    service.stop_worker(&name).await?;
    Ok(Json(MessageResponse {
        message: format!("Worker {} stopped", name),
    }))
}

async fn stop_all_workers(State(service): State<AppState>) -> ApiResult<Json<StopAllResponse>> {
    let stopped = service.stop_all_workers().await?;
    Ok(Json(StopAllResponse {
        message: format!("Stopped {} worker(s)", stopped.len()),
        stopped,
    }))
}

async fn worker_status(
    State(service): State<AppState>,
    Path(name): Path<String>,
) -> Json<WorkerStatusResponse> {
    let status = service.worker_status(&name);
    Json(WorkerStatusResponse { name, status })
}

async fn all_worker_statuses(State(service): State<AppState>) -> Json<Vec<WorkerStatusReport>> {
    Json(service.all_worker_statuses().await)
}

async fn running_workers(State(service): State<AppState>) -> Json<BTreeMap<String, u32>> {
    Json(service.running_workers())
}

/// Aggregated JSON for `streaming: false`, NDJSON chunk stream otherwise.
async fn generate(State(service): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let body: GenerateBody = parse_json(&body)?;
    let request = GenerationRequest::from(body);

    if request.streaming {
        let chunks = service.generate_stream(request).await?;
        return Ok(ndjson_response(chunks));
    }

    let chunk = service.generate(request).await?;
    Ok(Json(chunk).into_response())
}

async fn list_models(State(service): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(service.list_models().await?))
}

async fn pull_model(State(service): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let body: PullBody = parse_json(&body)?;
    let progress = service.pull_model(&body.model_name).await?;
    Ok(ndjson_response(progress))
}

async fn provider_status(State(service): State<AppState>) -> Json<ProviderStatusReport> {
    Json(service.provider_status().await)
}

async fn start_provider(State(service): State<AppState>) -> ApiResult<Json<ProviderStatusReport>> {
    Ok(Json(service.ensure_provider_reachable().await?))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(ControlError::InvalidRequest(format!("malformed body: {}", e))))
}

/// One JSON document per line.
///
/// An upstream failure ends the body early; lines already sent stay valid.
/// When the client disconnects the body is dropped, and with it the
/// upstream connection.
fn ndjson_response<T>(items: BoxStream<'static, Result<T, LLMError>>) -> Response
where
    T: Serialize + Send + 'static,
{
    let lines = items
        .take_while(|item| {
            if let Err(e) = item {
                warn!("Ending response stream early: {}", e);
            }
            future::ready(item.is_ok())
        })
        .filter_map(|item| future::ready(item.ok()))
        .map(|item| {
            serde_json::to_vec(&item).map(|mut line| {
                line.push(b'\n');
                Bytes::from(line)
            })
        });

    ([(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)], Body::from_stream(lines)).into_response()
}

//! Shared fixtures: an in-process Ollama-compatible upstream and helpers to
//! assemble a control plane around it.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use local_llm_backend::config::{
    BackendConfiguration, ConfigStore, OllamaProviderConfig, ProviderConfig,
};
use local_llm_backend::control::ControlPlaneService;
use local_llm_backend::llm::ProviderFactory;
use local_llm_backend::supervisor::{ProcessSupervisor, SupervisorConfig};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Streamed reply pieces: frames split across transport chunks and mixed
/// with noise.
const SSE_PARTS: &[&str] = &[
    ": keepalive\n\n",
    "data: {\"model\":\"llama2\",\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"model\":\"llama2\",\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\ndata: {\"model\":\"lla",
    "ma2\",\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
    "data: not-json\n\n",
    "data: {\"model\":\"llama2\",\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
];

/// Frames sent before the truncated reply aborts; no terminal marker follows.
const TRUNCATED_PARTS: &[&str] = &[
    "data: {\"model\":\"llama2\",\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
    "data: {\"model\":\"llama2\",\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
];

const PULL_PARTS: &[&str] = &[
    "{\"status\":\"pulling manifest\"}\n",
    "{\"status\":\"downloading\",\"completed\":50,\"total\":100}\n{\"stat",
    "us\":\"success\"}\n",
];

/// In-process stand-in for an Ollama server.
pub struct MockUpstream {
    pub addr: SocketAddr,
    /// Set once the body of a held reply has been dropped
    pub held_reply_closed: Arc<AtomicBool>,
    join: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    /// Serve a mock whose non-streaming reply is `reply`.
    pub async fn start(reply: &str) -> Self {
        let reply = reply.to_string();
        let held_reply_closed = Arc::new(AtomicBool::new(false));
        let closed = held_reply_closed.clone();
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(move |body: Json<Value>| chat_completions(body, reply.clone())),
            )
            .route(
                "/broken/v1/chat/completions",
                post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route("/truncated/v1/chat/completions", post(truncated_completions))
            .route(
                "/held/v1/chat/completions",
                post(move || held_completions(closed.clone())),
            )
            .route(
                "/api/tags",
                get(|| async { Json(json!({"models": [{"name": "llama2:latest"}]})) }),
            )
            .route("/api/pull", post(pull));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let join = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            held_reply_closed,
            join,
        }
    }

    pub fn api_base(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn broken_api_base(&self) -> String {
        format!("http://{}/broken/v1", self.addr)
    }

    /// Streams two chunks, then aborts the connection.
    pub fn truncated_api_base(&self) -> String {
        format!("http://{}/truncated/v1", self.addr)
    }

    /// Streams one chunk, then holds the connection open.
    pub fn held_api_base(&self) -> String {
        format!("http://{}/held/v1", self.addr)
    }

    pub fn config(&self) -> BackendConfiguration {
        ollama_config(&self.api_base(), "llama2")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn chat_completions(Json(body): Json<Value>, reply: String) -> Response {
    if body["stream"].as_bool().unwrap_or(false) {
        let parts = SSE_PARTS
            .iter()
            .map(|part| Ok::<_, std::io::Error>(Bytes::from_static(part.as_bytes())));
        return (
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(futures::stream::iter(parts)),
        )
            .into_response();
    }

    Json(json!({
        "model": body["model"],
        "choices": [{"index": 0, "message": {"role": "assistant", "content": reply}, "finish_reason": "stop"}]
    }))
    .into_response()
}

async fn truncated_completions() -> Response {
    let body = async_stream::stream! {
        for part in TRUNCATED_PARTS {
            yield Ok::<_, std::io::Error>(Bytes::from_static(part.as_bytes()));
        }
        // Let the frames reach the client before the abort.
        tokio::time::sleep(Duration::from_millis(100)).await;
        yield Err(std::io::Error::other("connection reset mid-reply"));
    };
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

async fn held_completions(closed: Arc<AtomicBool>) -> Response {
    let body = async_stream::stream! {
        let _closed = SetOnDrop(closed);
        yield Ok::<_, std::io::Error>(Bytes::from_static(TRUNCATED_PARTS[0].as_bytes()));
        futures::future::pending::<()>().await;
    };
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn pull(Json(body): Json<Value>) -> Response {
    if body["name"].as_str().unwrap_or_default().is_empty() || body["stream"] != true {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let parts = PULL_PARTS
        .iter()
        .map(|part| Ok::<_, std::io::Error>(Bytes::from_static(part.as_bytes())));
    Body::from_stream(futures::stream::iter(parts)).into_response()
}

pub fn ollama_config(api_base: &str, default_model: &str) -> BackendConfiguration {
    BackendConfiguration {
        llm: ProviderConfig::Ollama(OllamaProviderConfig {
            api_base: api_base.to_string(),
            default_model: default_model.to_string(),
        }),
        ..Default::default()
    }
}

/// Base URL on which nothing is listening.
pub async fn dead_api_base() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/v1", addr)
}

pub fn quick_supervisor(log_dir: Option<std::path::PathBuf>) -> Arc<ProcessSupervisor> {
    Arc::new(ProcessSupervisor::new(SupervisorConfig {
        stop_timeout: Duration::from_secs(2),
        log_dir,
    }))
}

pub async fn control_plane(
    store: Arc<dyn ConfigStore>,
    supervisor: Arc<ProcessSupervisor>,
) -> Arc<ControlPlaneService> {
    let factory = ProviderFactory::new(Duration::from_secs(2)).unwrap();
    Arc::new(ControlPlaneService::new(store, factory, supervisor).await.unwrap())
}

//! # HTTP Surface
//!
//! axum routes over a [`ControlPlaneService`](crate::control::ControlPlaneService).
//!
//! ```text
//! GET  /                          liveness message
//! GET  /config                    current backend configuration
//! POST /config                    persist and hot-swap
//! POST /worker/start/{name}       404 undefined, 400 already running or spawn failure
//! POST /worker/stop/{name}        400 not running
//! POST /worker/stop_all           names actually stopped
//! GET  /worker/status/{name}
//! GET  /worker/status_all         every configured worker, in configuration order
//! GET  /worker/running            name -> pid of live workers
//! POST /generation/run            application/json, or application/x-ndjson when streaming
//! GET  /generation/models         provider catalog, passed through
//! POST /generation/pull           application/x-ndjson progress
//! GET  /generation/status         provider reachability
//! POST /generation/start          503 when the provider is unreachable
//! ```
//!
//! Failures answer with `{ "kind", "message", "retryable" }`.

pub mod error;
pub mod routes;
pub mod serve;
pub mod types;

pub use error::{ApiError, ErrorBody};
pub use routes::{NDJSON_CONTENT_TYPE, router};
pub use serve::{ServeHandle, serve};

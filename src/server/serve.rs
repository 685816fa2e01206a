use super::routes::router;
use crate::control::ControlPlaneService;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

/// Handle returned by [`serve`]: the bound address and a shutdown trigger.
pub struct ServeHandle {
    pub local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<tokio::task::JoinHandle<std::io::Result<()>>>,
}

impl ServeHandle {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Base URL of the HTTP surface, e.g. `http://127.0.0.1:8000`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await??;
        }
        Ok(())
    }
}

/// Bind `bind` and serve the HTTP surface in a spawned task.
pub async fn serve(service: Arc<ControlPlaneService>, bind: &str) -> Result<ServeHandle> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let local_addr = listener.local_addr()?;
    info!("Listening on http://{}", local_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Received shutdown signal");
            })
            .await
    });

    Ok(ServeHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}

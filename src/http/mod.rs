//! HTTP interface.

pub mod error;
mod handlers;

pub use self::handlers::{CompressResponse, QrResponse, content_disposition};

use crate::error::{ErrorKind, Result};
use crate::pipeline::Pipeline;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use exn::ResultExt;
use pressroom_config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Multipart field the files arrive in.
    pub upload_field: String,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/compress-pdf", post(handlers::compress_pdf))
        .route("/download/:id", get(handlers::download).head(handlers::download_head))
        .route("/generate-qr", post(handlers::generate_qr))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Run the service until Ctrl-C.
pub async fn serve(config: &Config, bind: SocketAddr) -> Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config).await?);
    let sweeper = Arc::clone(pipeline.delivery()).spawn_sweeper(config.delivery.sweep_interval());
    let state = AppState {
        pipeline,
        upload_field: config.server.upload_field.clone(),
    };
    let app = router(state, config.server.max_upload_bytes);

    let listener = TcpListener::bind(bind).await.or_raise(|| ErrorKind::Bind(bind))?;
    tracing::info!(%bind, "Listening");
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    sweeper.abort();
    served.or_raise(|| ErrorKind::Server)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C; shutting down"),
    }
}

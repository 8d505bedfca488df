//! HTTP surface: `GET /gas` returns the latest published estimate.
use std::net::SocketAddr;

use axum::{Json, Router, extract::State, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use crate::oracle::{EstimateReader, GasEstimate};

pub fn router(estimates: EstimateReader) -> Router {
    Router::new()
        .route("/gas", get(current_estimate))
        .with_state(estimates)
}

/// Never fails: while the oracle is cold this is the zeroed estimate.
async fn current_estimate(State(estimates): State<EstimateReader>) -> Json<GasEstimate> {
    Json(estimates.current())
}

pub async fn serve(
    addr: SocketAddr,
    estimates: EstimateReader,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "serving gas estimates");
    axum::serve(listener, router(estimates))
        .with_graceful_shutdown(shutdown)
        .await
}

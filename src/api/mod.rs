//! REST API over the market client and forecaster.
//!
//! Provides four endpoints:
//! - `GET /api/markets`: static market catalog
//! - `POST /api/price-data`: normalized prices for a market and date range
//! - `POST /api/forecast`: price forecast from posted history
//! - `POST /api/export`: posted rows as a CSV attachment

mod handlers;
mod types;

pub use types::{
    ErrorResponse, ExportRequest, ForecastRequest, ForecastResponse, PriceDataRequest,
    PriceDataResponse,
};

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::market::client::{Credentials, Transport, UreqTransport, base_url_from_env};

/// Application state shared across all request handlers.
///
/// Read-only after construction; each price request opens its own client
/// session over the shared transport.
pub struct AppState {
    /// API login; `None` makes `/api/price-data` answer 500.
    pub credentials: Option<Credentials>,
    /// API base URL.
    pub base_url: String,
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    /// State from `GME_USERNAME`, `GME_PASSWORD`, and `GME_BASE_URL`, over
    /// a `ureq` transport.
    pub fn from_env() -> Self {
        Self {
            credentials: Credentials::from_env(),
            base_url: base_url_from_env(),
            transport: Arc::new(UreqTransport::new()),
        }
    }
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/markets", get(handlers::get_markets))
        .route("/api/price-data", post(handlers::post_price_data))
        .route("/api/forecast", post(handlers::post_forecast))
        .route("/api/export", post(handlers::post_export))
        .with_state(state)
}

/// Binds to the given address and serves the API until shutdown.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await
}

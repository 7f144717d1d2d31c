//! Banca HTTP API.
//!
//! Routes live under `/api/v1` and speak camelCase JSON. Every route except
//! login, health and the OpenAPI document needs an `Authorization: Bearer`
//! token. Real-time notifications are served over a WebSocket at
//! `/hubs/lottery`.

pub mod error;
pub mod extract;
pub mod hub;
pub mod openapi;
pub mod rate_limit;
mod routes;
pub mod state;

#[cfg(test)]
mod tests;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{middleware, Router};
use banca_core::Backoffice;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const PURGE_INTERVAL: Duration = Duration::from_secs(30);

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.office.config().cors_origins);

    Router::new()
        .nest("/api/v1", routes::api_routes())
        .route("/hubs/lottery", get(hub::lottery_hub))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::limit_requests))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop expired limit reservations and rate-limit windows.
fn spawn_purge_task(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let expired = state.office.reservations().purge_expired();
            if expired > 0 {
                info!("Purged {} expired limit reservations", expired);
            }
            state.limiter.purge(Instant::now());
        }
    })
}

pub async fn serve(office: Arc<Backoffice>) -> ApiResult<()> {
    let address = office.config().bind_address();
    let state = AppState::new(office);
    let purge = spawn_purge_task(state.clone());
    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Banca API listening on {}", address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

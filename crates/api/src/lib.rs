//! Chatgate HTTP surface
//!
//! The router is an explicit value built during startup: [`create_router`]
//! makes the base router, each mounter merges its routes in, and
//! [`run_api`] serves the result.

pub mod error;
pub mod graphql;
mod routes;

pub use graphql::{GRAPHQL_PATH, QueryEngine};
pub use routes::graphql::mount as mount_graphql;

use axum::Router;
use chatgate_core::StartupError;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Create the base router with the always-present routes
pub fn create_router(pool: PgPool) -> Router {
    Router::new().merge(routes::health::routes()).with_state(pool)
}

/// Wrap every registered route in request tracing
pub fn with_tracing(router: Router) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let remote_addr = request
                    .extensions()
                    .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                    .map(|ci| ci.0.to_string())
                    .unwrap_or_else(|| "unknown".into());

                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    remote_addr = %remote_addr,
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    tracing::info!(
                        latency_ms = %latency.as_millis(),
                        status = %response.status(),
                        "finished processing request"
                    );
                },
            ),
    )
}

/// Run the API server
///
/// Binds `addr` and serves until `shutdown` is cancelled. Bind and serve
/// failures are startup-fatal.
pub async fn run_api(
    router: Router,
    addr: &str,
    shutdown: CancellationToken,
) -> Result<(), StartupError> {
    let listener_error = |source: std::io::Error| StartupError::Listener {
        addr: addr.to_string(),
        source,
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(listener_error)?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(
        listener,
        with_tracing(router).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(listener_error)
}

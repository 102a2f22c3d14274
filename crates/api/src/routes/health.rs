//! Health check endpoint

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use sqlx::PgPool;

/// Health check response
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

impl HealthResponse {
    fn from_database(healthy: bool) -> (StatusCode, Self) {
        if healthy {
            (
                StatusCode::OK,
                Self {
                    status: "ok",
                    database: "healthy",
                },
            )
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Self {
                    status: "degraded",
                    database: "unhealthy",
                },
            )
        }
    }
}

/// Returns 200 OK if the server and database are healthy
async fn health_check(State(pool): State<PgPool>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            false
        }
    };

    let (status, body) = HealthResponse::from_database(healthy);
    (status, Json(body))
}

/// Health check routes
pub fn routes() -> Router<PgPool> {
    Router::new().route("/health", get(health_check))
}

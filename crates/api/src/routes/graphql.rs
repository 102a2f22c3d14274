//! GraphQL endpoint
//!
//! Only registered when the GraphQL feature is enabled; without it the path
//! falls through to the router's default 404.

use crate::error::ApiError;
use crate::graphql::{GRAPHQL_PATH, QueryEngine};
use axum::{Json, Router, extract::State, extract::rejection::JsonRejection, routing::post};

async fn graphql_handler(
    State(engine): State<QueryEngine>,
    payload: Result<Json<async_graphql::Request>, JsonRejection>,
) -> Result<Json<async_graphql::Response>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(engine.execute(request).await))
}

/// Register the GraphQL route on `router`
pub fn mount(router: Router, engine: QueryEngine) -> Router {
    router.merge(
        Router::new()
            .route(GRAPHQL_PATH, post(graphql_handler))
            .with_state(engine),
    )
}

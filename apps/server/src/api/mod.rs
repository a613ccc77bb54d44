use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use pocketplan_core::plans::MAX_PLAN_BYTES;

use crate::main_lib::AppState;

mod link;
mod plan;
mod review;
mod session;

/// Transport ceiling. Kept above the plan limit so oversize plans reach the
/// validator and get its 413 body.
const REQUEST_BODY_LIMIT: usize = MAX_PLAN_BYTES * 2;

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/healthz", get(healthz))
        .merge(session::router())
        .merge(plan::router())
        .merge(review::router())
        .merge(link::router());

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
        .with_state(state)
}

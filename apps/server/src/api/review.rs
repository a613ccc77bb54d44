//! Ephemeral review sessions. Same protocol as the main family, no previous
//! version, and an unconditional reset.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use crate::cookies::cookie_token;
use crate::error::ApiResult;
use crate::main_lib::AppState;

use super::plan::{read_plan, replace_plan};
use super::session::{bootstrap_family, outcome_response};

async fn bootstrap_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let body = body?;
    bootstrap_family(
        state.review_plans.as_ref(),
        &headers,
        &body,
        state.secure_cookies(),
    )
    .await
}

async fn get_review_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    read_plan(state.review_plans.as_ref(), &headers, state.secure_cookies()).await
}

async fn put_review_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let body = body?;
    replace_plan(
        state.review_plans.as_ref(),
        &headers,
        &body,
        state.secure_cookies(),
    )
    .await
}

async fn reset_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let service = state.review_plans.as_ref();
    let token = cookie_token(&headers, service.family());
    let outcome = service.reset(token.as_ref()).await?;
    Ok(outcome_response(service, outcome, state.secure_cookies()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/review/session/bootstrap", post(bootstrap_review))
        .route("/review/plan", get(get_review_plan).put(put_review_plan))
        .route("/review/reset", post(reset_review))
}

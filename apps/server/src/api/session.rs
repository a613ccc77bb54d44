//! Session bootstrap: turns whatever token the client has (or nothing) into a
//! usable session and its current plan.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pocketplan_core::plans::{format_timestamp, BootstrapOutcome, PlanSessionServiceTrait};

use crate::cookies::{read_cookie, session_cookie};
use crate::error::ApiResult;
use crate::main_lib::AppState;

#[derive(Debug, Default, Deserialize)]
struct BootstrapRequest {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BootstrapResponse {
    token: String,
    plan: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_plan: Option<Value>,
    updated_at: String,
    is_new: bool,
}

impl From<BootstrapOutcome> for BootstrapResponse {
    fn from(outcome: BootstrapOutcome) -> Self {
        Self {
            token: outcome.token.as_str().to_string(),
            plan: outcome.plan.into_value(),
            prev_plan: outcome.prev_plan.map(|p| p.into_value()),
            updated_at: format_timestamp(outcome.updated_at),
            is_new: outcome.is_new,
        }
    }
}

/// Token from a `{"token": ...}` body. Empty, non-JSON or mistyped bodies yield
/// `None` rather than an error.
pub(super) fn body_token(body: &Bytes) -> Option<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice::<BootstrapRequest>(body)
        .ok()
        .and_then(|request| request.token)
}

/// Outcome as JSON plus a refreshed family cookie.
pub(super) fn outcome_response(
    service: &dyn PlanSessionServiceTrait,
    outcome: BootstrapOutcome,
    secure: bool,
) -> Response {
    let cookie = session_cookie(service.family(), &outcome.token, secure);
    (
        [(SET_COOKIE, cookie)],
        Json(BootstrapResponse::from(outcome)),
    )
        .into_response()
}

pub(super) async fn bootstrap_family(
    service: &dyn PlanSessionServiceTrait,
    headers: &HeaderMap,
    body: &Bytes,
    secure: bool,
) -> ApiResult<Response> {
    let from_body = body_token(body);
    let from_cookie = read_cookie(headers, service.family().cookie_name);
    let outcome = service
        .bootstrap(from_body.as_deref(), from_cookie)
        .await?;
    if outcome.is_new {
        tracing::debug!("[Session] Issued a new {:?} session", service.family().family);
    }
    Ok(outcome_response(service, outcome, secure))
}

async fn bootstrap_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let body = body?;
    bootstrap_family(
        state.main_plans.as_ref(),
        &headers,
        &body,
        state.secure_cookies(),
    )
    .await
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/session/bootstrap", post(bootstrap_session))
}

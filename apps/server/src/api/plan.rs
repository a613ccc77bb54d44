//! Plan read/write for the main family, plus helpers shared with review routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};

use pocketplan_core::plans::{
    format_timestamp, validate_plan_bytes, PlanRecord, PlanSessionServiceTrait,
    PlanValidationError, MAX_PLAN_BYTES,
};
use pocketplan_core::tokens::SessionToken;

use crate::cookies::{cookie_token, session_cookie};
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    plan: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_plan: Option<Value>,
    updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveResponse {
    updated_at: String,
}

pub(super) fn require_token(
    service: &dyn PlanSessionServiceTrait,
    headers: &HeaderMap,
) -> ApiResult<SessionToken> {
    cookie_token(headers, service.family())
        .ok_or_else(|| ApiError::Unauthorized("Missing or malformed session token".to_string()))
}

fn with_cookie(
    service: &dyn PlanSessionServiceTrait,
    token: &SessionToken,
    secure: bool,
    body: impl IntoResponse,
) -> Response {
    (
        [(SET_COOKIE, session_cookie(service.family(), token, secure))],
        body,
    )
        .into_response()
}

fn saved(
    service: &dyn PlanSessionServiceTrait,
    token: &SessionToken,
    secure: bool,
    record: PlanRecord,
) -> Response {
    with_cookie(
        service,
        token,
        secure,
        Json(SaveResponse {
            updated_at: format_timestamp(record.updated_at),
        }),
    )
}

pub(super) async fn read_plan(
    service: &dyn PlanSessionServiceTrait,
    headers: &HeaderMap,
    secure: bool,
) -> ApiResult<Response> {
    let token = require_token(service, headers)?;
    let record = service.load(&token).await?;
    let prev_plan = if service.family().retains_previous {
        record.prev_plan.map(|p| p.into_value())
    } else {
        None
    };
    let body = Json(PlanResponse {
        plan: record.plan.into_value(),
        prev_plan,
        updated_at: format_timestamp(record.updated_at),
    });
    Ok(with_cookie(service, &token, secure, body))
}

pub(super) async fn replace_plan(
    service: &dyn PlanSessionServiceTrait,
    headers: &HeaderMap,
    body: &Bytes,
    secure: bool,
) -> ApiResult<Response> {
    let token = require_token(service, headers)?;
    let plan = validate_plan_bytes(body).map_err(pocketplan_core::Error::from)?;
    let record = service.replace(&token, plan).await?;
    Ok(saved(service, &token, secure, record))
}

/// Parses a PATCH body into the top-level fields to merge.
fn patch_fields(body: &Bytes) -> ApiResult<Map<String, Value>> {
    if body.len() > MAX_PLAN_BYTES {
        return Err(pocketplan_core::Error::from(PlanValidationError::TooLarge {
            size: body.len(),
            limit: MAX_PLAN_BYTES,
        })
        .into());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::BadRequest(
            "patch must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::BadRequest(format!("Invalid JSON: {}", e))),
    }
}

async fn get_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    read_plan(state.main_plans.as_ref(), &headers, state.secure_cookies()).await
}

async fn put_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let body = body?;
    replace_plan(
        state.main_plans.as_ref(),
        &headers,
        &body,
        state.secure_cookies(),
    )
    .await
}

async fn patch_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Response> {
    let body = body?;
    let service = state.main_plans.as_ref();
    let token = require_token(service, &headers)?;
    let fields = patch_fields(&body)?;
    let record = service.merge_fields(&token, fields).await?;
    Ok(saved(service, &token, state.secure_cookies(), record))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/plan", get(get_plan).put(put_plan).patch(patch_plan))
}

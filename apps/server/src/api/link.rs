//! Cross-device link: packages the caller's main token with the best URL another
//! device can reach.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use pocketplan_core::tokens::SessionToken;
use pocketplan_device_link::{share_url, DiscoveredLink};

use crate::cookies::cookie_token;
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

use super::session::body_token;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkResponse {
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lan_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    share_url: Option<String>,
}

impl LinkResponse {
    fn new(token: &SessionToken, link: Option<DiscoveredLink>) -> Self {
        let share = link
            .as_ref()
            .map(|link| share_url(link.url(), token.as_str()));
        let (public_url, lan_url) = match link {
            Some(DiscoveredLink::Public(url)) => (Some(url), None),
            Some(DiscoveredLink::Lan(url)) => (None, Some(url)),
            None => (None, None),
        };
        Self {
            token: token.as_str().to_string(),
            public_url,
            lan_url,
            share_url: share,
        }
    }
}

async fn create_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<LinkResponse>> {
    let body = body?;
    let service = state.main_plans.as_ref();
    let token = body_token(&body)
        .as_deref()
        .and_then(SessionToken::parse)
        .or_else(|| cookie_token(&headers, service.family()))
        .ok_or_else(|| ApiError::Unauthorized("Missing or malformed session token".to_string()))?;

    // Only tokens that address a live session are worth sharing.
    service.load(&token).await?;

    let link = state.link_discovery.discover().await;
    match &link {
        Some(found) => tracing::info!("[Link] Offering {:?}", found),
        None => tracing::info!("[Link] No reachable URL discovered"),
    }
    Ok(Json(LinkResponse::new(&token, link)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/session/link", post(create_link))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_and_lan_are_exclusive() {
        let token = SessionToken::generate().expect("token");

        let public = LinkResponse::new(
            &token,
            Some(DiscoveredLink::Public("https://x.test".to_string())),
        );
        assert_eq!(public.public_url.as_deref(), Some("https://x.test"));
        assert!(public.lan_url.is_none());
        assert_eq!(
            public.share_url,
            Some(format!("https://x.test/?token={}", token.as_str()))
        );

        let lan = LinkResponse::new(
            &token,
            Some(DiscoveredLink::Lan("http://192.168.1.2:8088".to_string())),
        );
        assert!(lan.public_url.is_none());
        assert_eq!(lan.lan_url.as_deref(), Some("http://192.168.1.2:8088"));

        let none = LinkResponse::new(&token, None);
        assert!(none.share_url.is_none());
        assert_eq!(none.token, token.as_str());
    }
}

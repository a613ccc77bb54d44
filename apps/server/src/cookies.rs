//! Session cookie parsing and emission.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

use pocketplan_core::plans::PlanFamilyConfig;
use pocketplan_core::tokens::SessionToken;

/// Raw value of the cookie `name`, if the request carries one.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Well-formed family token from the cookie. Malformed values count as absent.
pub fn cookie_token(headers: &HeaderMap, family: &PlanFamilyConfig) -> Option<SessionToken> {
    read_cookie(headers, family.cookie_name).and_then(SessionToken::parse)
}

/// `Set-Cookie` value binding `token` to this family for its retention window.
pub fn session_cookie(family: &PlanFamilyConfig, token: &SessionToken, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        family.cookie_name,
        token.as_str(),
        family.cookie_max_age_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

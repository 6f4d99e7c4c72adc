//! Session cookie handling.
//!
//! The cookie carries only an opaque session id; nonces and sign-in state
//! stay server-side in the session store.

use axum::http::{header, HeaderMap, HeaderValue};

/// How the session cookie is written.
#[derive(Debug, Clone)]
pub struct CookieSettings {
	pub name: String,
	pub max_age_seconds: u64,
	pub secure: bool,
}

/// Session id from the request's `Cookie` headers, if present.
pub fn session_id(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(name, _)| *name == cookie_name)
		.map(|(_, value)| value.trim().to_string())
		.filter(|value| !value.is_empty())
}

/// `Set-Cookie` value binding the client to `session_id`.
pub fn set_cookie(settings: &CookieSettings, session_id: &str) -> Option<HeaderValue> {
	let mut cookie = format!(
		"{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
		settings.name, session_id, settings.max_age_seconds
	);
	if settings.secure {
		cookie.push_str("; Secure");
	}
	HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_cookie(settings: &CookieSettings) -> Option<HeaderValue> {
	HeaderValue::from_str(&format!(
		"{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
		settings.name
	))
	.ok()
}

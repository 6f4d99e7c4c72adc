//! Sign-in endpoints under `/api/siwe`.
//!
//! `PUT` issues a nonce, `POST` verifies a signed message, `GET` reports the
//! current session and `DELETE` signs out. The session id travels in a cookie
//! set by `PUT`.

use crate::apis::session;
use crate::server::AppState;
use axum::{
	extract::State,
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Json, Response},
};
use swap_auth::{AuthError, SessionManager};
use swap_types::{truncate_id, APIError, SessionResponse, VerifyRequest};

/// Handles PUT /api/siwe: a fresh nonce as plain text.
pub async fn issue_nonce(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Response, APIError> {
	let session_id = session::session_id(&headers, &state.cookie.name)
		.unwrap_or_else(SessionManager::new_session_id);
	let nonce = state.sessions.issue_nonce(&session_id).await?;

	let mut response = nonce.into_response();
	if let Some(cookie) = session::set_cookie(&state.cookie, &session_id) {
		response.headers_mut().insert(header::SET_COOKIE, cookie);
	}
	Ok(response)
}

/// Handles POST /api/siwe.
pub async fn verify(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<VerifyRequest>,
) -> Result<Json<SessionResponse>, APIError> {
	let session_id =
		session::session_id(&headers, &state.cookie.name).ok_or(AuthError::NonceMissing)?;
	match state
		.sessions
		.verify(&session_id, &request.message, &request.signature)
		.await
	{
		Ok(session) => Ok(Json(session)),
		Err(e) => {
			tracing::warn!(session = %truncate_id(&session_id), error = %e, "Sign-in rejected");
			Err(e.into())
		},
	}
}

/// Handles GET /api/siwe: `{address, chainId}` or `null`.
pub async fn get_session(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<Option<SessionResponse>>, APIError> {
	let Some(session_id) = session::session_id(&headers, &state.cookie.name) else {
		return Ok(Json(None));
	};
	Ok(Json(state.sessions.session(&session_id).await?))
}

/// Handles DELETE /api/siwe.
pub async fn sign_out(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Response, APIError> {
	if let Some(session_id) = session::session_id(&headers, &state.cookie.name) {
		state.sessions.sign_out(&session_id).await?;
	}
	let mut response = StatusCode::OK.into_response();
	if let Some(cookie) = session::clear_cookie(&state.cookie) {
		response.headers_mut().insert(header::SET_COOKIE, cookie);
	}
	Ok(response)
}

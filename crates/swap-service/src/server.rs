//! HTTP server for the swap gateway.
//!
//! Serves the sign-in routes and the authenticated price and quote proxy
//! under `/api`. The upstream API key lives only in this process.

use crate::apis::{proxy, session::CookieSettings, siwe, tokens};
use axum::{
	extract::DefaultBodyLimit,
	http::{header, HeaderName, HeaderValue, Method},
	routing::get,
	Router,
};
use std::sync::Arc;
use std::time::Duration;
use swap_auth::{SessionManager, SessionSettings};
use swap_config::{ApiConfig, Config, CorsConfig};
use swap_pricing::PricingService;
use swap_storage::{implementations::memory::MemoryStorage, StorageService};
use swap_types::TokenRegistry;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub sessions: Arc<SessionManager>,
	/// Upstream price and quote source.
	pub pricing: Arc<PricingService>,
	pub tokens: Arc<TokenRegistry>,
	pub required_chain_id: u64,
	pub cookie: CookieSettings,
	/// Upper bound on a single upstream call.
	pub upstream_timeout: Duration,
}

impl AppState {
	/// Builds the state from configuration with an in-memory session store.
	pub fn from_config(config: &Config, api: &ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
		if config.pricing.primary == "proxy" {
			return Err("the gateway cannot use the proxy pricing implementation".into());
		}
		let pricing =
			PricingService::from_config(&config.pricing.primary, &config.pricing.implementations)?;

		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let sessions = SessionManager::new(
			storage,
			SessionSettings {
				domain: config.siwe.domain.clone(),
				nonce_ttl: Duration::from_secs(config.siwe.nonce_ttl_seconds),
				session_ttl: Duration::from_secs(api.session_ttl_seconds),
			},
		);

		Ok(Self {
			sessions: Arc::new(sessions),
			pricing: Arc::new(pricing),
			tokens: Arc::new(config.token_registry()),
			required_chain_id: config.app.required_chain_id,
			cookie: CookieSettings {
				name: api.cookie_name.clone(),
				max_age_seconds: api.session_ttl_seconds,
				secure: config.siwe.uri.starts_with("https://"),
			},
			upstream_timeout: Duration::from_secs(api.timeout_seconds),
		})
	}
}

/// Router with every `/api` route and the middleware stack.
pub fn build_router(state: AppState, api: &ApiConfig) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route(
					"/siwe",
					get(siwe::get_session)
						.put(siwe::issue_nonce)
						.post(siwe::verify)
						.delete(siwe::sign_out),
				)
				.route("/price", get(proxy::price))
				.route("/quote", get(proxy::quote))
				.route("/tokens", get(tokens::get_tokens)),
		)
		.layer(DefaultBodyLimit::max(api.max_request_size))
		.layer(cors_layer(api.cors.as_ref()))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Cookies only flow cross-origin with an explicit origin list, so a
/// configured list enables credentials; without one the API is permissive.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();
	let methods: Vec<Method> = if cors.allowed_methods.is_empty() {
		vec![Method::GET, Method::PUT, Method::POST, Method::DELETE]
	} else {
		cors.allowed_methods
			.iter()
			.filter_map(|m| m.to_uppercase().parse().ok())
			.collect()
	};
	let headers: Vec<HeaderName> = if cors.allowed_headers.is_empty() {
		vec![header::CONTENT_TYPE]
	} else {
		cors.allowed_headers
			.iter()
			.filter_map(|h| h.parse().ok())
			.collect()
	};

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(methods)
		.allow_headers(headers)
		.allow_credentials(true)
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	config: &Config,
	api: ApiConfig,
) -> Result<(), Box<dyn std::error::Error>> {
	let state = AppState::from_config(config, &api)?;

	let sessions = Arc::clone(&state.sessions);
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
		loop {
			ticker.tick().await;
			match sessions.cleanup_expired().await {
				Ok(0) => {},
				Ok(removed) => tracing::debug!(removed, "Dropped expired sessions"),
				Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
			}
		}
	});

	let app = build_router(state, &api);
	let bind_address = format!("{}:{}", api.host, api.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!(address = %bind_address, app = %config.app.id, "Swap API server starting");

	axum::serve(listener, app).await?;

	Ok(())
}

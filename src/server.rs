//! HTTP surface: `GET /health`, `GET /{track_id}`, and `GET /{track_id}/stream`.
//!
//! Any service failure is reported as `503` carrying the stable category message. Identifiers
//! that are not non-negative integers are a client error instead: they get `400`, not the `503`
//! used for upstream trouble, and a leading minus sign counts as malformed.
//!
//! Every route sits behind a CORS layer that only allows `GET` from the configured origins.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Json, Router,
	extract::{Path, State},
	http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
	routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
// self
use crate::{
	_prelude::*,
	api::{TrackData, TrackId, TrackIdError},
	config::GatewayConfig,
	error::ConfigError,
	gateway::Gateway,
	service::{CachedTrackService, TrackDataService},
};

/// Media type of track streams.
pub const TRACK_CONTENT_TYPE: &str = "audio/mpeg";

/// Services shared by every request handler.
#[derive(Clone, Debug)]
pub struct ServerState {
	/// Track metadata service.
	pub track_data: TrackDataService,
	/// Cached track content service.
	pub tracks: CachedTrackService,
}
impl From<&Gateway> for ServerState {
	fn from(gateway: &Gateway) -> Self {
		Self {
			track_data: gateway.track_data_service().clone(),
			tracks: gateway.track_service().clone(),
		}
	}
}

/// Builds a `GET`-only CORS layer for `allowed_origins`.
///
/// An empty list or one containing `*` allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ConfigError> {
	let cors = CorsLayer::new().allow_methods([Method::GET]);

	if allowed_origins.is_empty()
		|| allowed_origins.iter().any(|origin| origin == GatewayConfig::ANY_ORIGIN)
	{
		return Ok(cors.allow_origin(AllowOrigin::any()));
	}

	let origins = allowed_origins
		.iter()
		.map(|origin| {
			HeaderValue::from_str(origin)
				.map_err(|_| ConfigError::InvalidOrigin { origin: origin.clone() })
		})
		.collect::<Result<Vec<_>, _>>()?;

	Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

/// Builds the router over `state`, wrapping every route in `cors`.
pub fn router(state: ServerState, cors: CorsLayer) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/{track_id}", get(track_data))
		.route("/{track_id}/stream", get(track))
		.layer(cors)
		.with_state(state)
}

/// Binds `address` and serves `gateway` behind `cors` until Ctrl-C.
pub async fn serve(
	gateway: &Gateway,
	address: SocketAddr,
	cors: CorsLayer,
) -> std::io::Result<()> {
	let listener = TcpListener::bind(address).await?;

	tracing::info!(address = %listener.local_addr()?, "listening");

	axum::serve(listener, router(ServerState::from(gateway), cors))
		.with_graceful_shutdown(shutdown_signal())
		.await
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to install the Ctrl-C handler");

		return;
	}

	tracing::info!("shutdown requested");
}

async fn health() -> Json<serde_json::Value> {
	Json(json!({ "message": "ok" }))
}

async fn track_data(
	State(state): State<ServerState>,
	Path(raw): Path<String>,
) -> Result<Json<TrackData>, ApiError> {
	let id = raw.parse::<TrackId>()?;

	Ok(Json(state.track_data.track_data(id).await?))
}

async fn track(
	State(state): State<ServerState>,
	Path(raw): Path<String>,
) -> Result<Response, ApiError> {
	let id = raw.parse::<TrackId>()?;
	let body = state.tracks.track(id).await?;

	Ok(([(CONTENT_TYPE, TRACK_CONTENT_TYPE)], body).into_response())
}

#[derive(Debug)]
enum ApiError {
	BadTrackId(TrackIdError),
	Gateway(Error),
}
impl From<TrackIdError> for ApiError {
	fn from(e: TrackIdError) -> Self {
		Self::BadTrackId(e)
	}
}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		Self::Gateway(e)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Self::BadTrackId(e) => (StatusCode::BAD_REQUEST, e.to_string()),
			Self::Gateway(e) => {
				tracing::warn!(
					error = %e,
					cause = ?e.source().map(ToString::to_string),
					"request failed"
				);

				let status = if e.is_category() {
					StatusCode::SERVICE_UNAVAILABLE
				} else {
					StatusCode::INTERNAL_SERVER_ERROR
				};

				(status, e.to_string())
			},
		};

		(status, Json(json!({ "error": message }))).into_response()
	}
}

//! reqwest-backed implementation of the upstream capability traits.
//!
//! [`ReqwestMediaApi`] speaks the upstream wire protocol:
//!
//! - authorization is a form `POST` of `grant_type=client_credentials` to the primary endpoint,
//!   falling back to a bare `GET` of the token generator when the primary attempt fails;
//! - renewal is a form `POST` of `grant_type=refresh_token` to the primary endpoint, with no
//!   fallback;
//! - track metadata is `GET {base}/{id}` and track content is `GET {base}/{id}/stream`, both sent
//!   with an `Authorization: OAuth <access token>` header.
//!
//! Every call carries its own deadline, and only a `200 OK` is accepted.

// crates.io
use reqwest::{RequestBuilder, StatusCode, header::AUTHORIZATION, redirect::Policy};
// self
use crate::{
	_prelude::*,
	api::{ApiFuture, AuthorizationApi, TrackApi, TrackData, TrackId},
	auth::Token,
	config::{GatewayConfig, Timeouts},
	error::{ConfigError, Endpoint, TransportError, UpstreamError},
};

/// Authorization scheme expected by the track endpoints.
pub const AUTHORIZATION_SCHEME: &str = "OAuth";

/// Upstream client for authorization, renewal, and track retrieval.
///
/// Redirects are never followed; token and content endpoints must answer directly.
#[derive(Clone)]
pub struct ReqwestMediaApi {
	client: ReqwestClient,
	config: Arc<GatewayConfig>,
}
impl ReqwestMediaApi {
	/// Builds a client with redirects disabled.
	pub fn new(config: &GatewayConfig) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.build()
			.map_err(|e| ConfigError::HttpClientBuild { message: e.to_string() })?;

		Ok(Self::with_client(config, client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// Per-request deadlines from `config` still apply on top of whatever the client sets.
	pub fn with_client(config: &GatewayConfig, client: ReqwestClient) -> Self {
		Self { client, config: Arc::new(config.clone()) }
	}

	fn timeouts(&self) -> Timeouts {
		self.config.timeouts
	}

	async fn authorize_primary(&self) -> Result<Bytes> {
		let request = self.client.post(self.config.auth_endpoint.clone()).form(&[
			("grant_type", "client_credentials"),
			("client_id", self.config.client_id.as_str()),
			("client_secret", self.config.client_secret.expose()),
		]);

		self.send(Endpoint::PrimaryAuth, request, self.timeouts().auth).await
	}

	async fn authorize_fallback(&self) -> Result<Bytes> {
		let request = self.client.get(self.config.fallback_auth_endpoint.clone());

		self.send(Endpoint::FallbackAuth, request, self.timeouts().auth).await
	}

	fn authorized(&self, request: RequestBuilder, token: &Token) -> RequestBuilder {
		request.header(
			AUTHORIZATION,
			format!("{AUTHORIZATION_SCHEME} {}", token.access_token().expose()),
		)
	}

	async fn send(
		&self,
		endpoint: Endpoint,
		request: RequestBuilder,
		timeout: std::time::Duration,
	) -> Result<Bytes> {
		let response =
			request.timeout(timeout).send().await.map_err(|e| map_reqwest_error(endpoint, e))?;
		let status = response.status();

		if status != StatusCode::OK {
			return Err(UpstreamError::Status { endpoint, status: status.as_u16() }.into());
		}

		response.bytes().await.map_err(|e| map_reqwest_error(endpoint, e))
	}
}
impl AuthorizationApi for ReqwestMediaApi {
	fn authorize(&self) -> ApiFuture<'_, Bytes> {
		Box::pin(async move {
			let primary = match self.authorize_primary().await {
				Ok(raw) => return Ok(raw),
				Err(e) => e,
			};

			#[cfg(feature = "tracing")]
			tracing::warn!(error = %primary, "primary authorization failed, trying fallback");

			let fallback = match self.authorize_fallback().await {
				Ok(raw) => return Ok(raw),
				Err(e) => e,
			};

			Err(Error::AuthorizationExhausted {
				primary: Box::new(primary),
				fallback: Box::new(fallback),
			})
		})
	}

	fn renew<'a>(&'a self, token: &'a Token) -> ApiFuture<'a, Bytes> {
		Box::pin(async move {
			let request = self.client.post(self.config.auth_endpoint.clone()).form(&[
				("grant_type", "refresh_token"),
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.expose()),
				("refresh_token", token.refresh_token().expose()),
			]);

			self.send(Endpoint::Renewal, request, self.timeouts().auth).await
		})
	}
}
impl TrackApi for ReqwestMediaApi {
	fn fetch_track_data<'a>(&'a self, token: &'a Token, id: TrackId) -> ApiFuture<'a, TrackData> {
		Box::pin(async move {
			let request = self.authorized(self.client.get(self.config.track_data_url(id)), token);
			let raw = self.send(Endpoint::TrackData, request, self.timeouts().track_data).await?;

			decode_track_data(&raw)
		})
	}

	fn fetch_track<'a>(&'a self, token: &'a Token, id: TrackId) -> ApiFuture<'a, Bytes> {
		Box::pin(async move {
			let request = self.authorized(self.client.get(self.config.track_url(id)), token);

			self.send(Endpoint::Track, request, self.timeouts().track).await
		})
	}
}
impl Debug for ReqwestMediaApi {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReqwestMediaApi").field("config", &self.config).finish()
	}
}

fn decode_track_data(raw: &[u8]) -> Result<TrackData> {
	let mut de = serde_json::Deserializer::from_slice(raw);
	let data = serde_path_to_error::deserialize(&mut de).map_err(|e| {
		UpstreamError::MalformedTrackData {
			path: e.path().to_string(),
			source: Arc::new(e.into_inner()),
		}
	})?;

	de.end().map_err(|e| UpstreamError::MalformedTrackData {
		path: ".".into(),
		source: Arc::new(e),
	})?;

	Ok(data)
}

fn map_reqwest_error(endpoint: Endpoint, err: ReqwestError) -> Error {
	if err.is_timeout() {
		return TransportError::Timeout { endpoint }.into();
	}

	TransportError::network(endpoint, err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn track_data_must_be_a_json_object() {
		let data = decode_track_data(br#"{"id":1,"title":"t"}"#)
			.expect("Object payload should decode.");

		assert_eq!(data.get("title"), Some(&serde_json::json!("t")));

		for raw in [&b"[1,2]"[..], b"12312", b"{\"id\":1} trailing"] {
			let err = decode_track_data(raw).expect_err("Non-object payloads must be rejected.");

			assert!(matches!(err, Error::Upstream(UpstreamError::MalformedTrackData { .. })));
		}
	}
}

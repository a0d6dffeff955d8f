//! Gateway configuration: upstream endpoints, client credentials, cache sizing, and timeouts.
//!
//! Values are assembled either through [`GatewayConfig::builder`] or from a TOML document via
//! [`GatewayConfig::from_toml_str`] / [`GatewayConfig::load`]. Both paths run the same validation,
//! so a [`GatewayConfig`] in hand is always usable.
//!
//! ```toml
//! base_api_url = "https://api.example.com/tracks"
//! base_auth_url = "https://api.example.com/oauth2/token"
//! token_generator_fallback = "https://tokens.example.com/generate"
//! client_id = "client"
//! client_secret = "secret"
//! cache_capacity = 32
//! allowed_origins = ["https://player.example.com"]
//! ```

// std
use std::{
	net::{Ipv4Addr, SocketAddr},
	num::NonZeroUsize,
	path::Path,
	time::Duration as StdDuration,
};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Upstream request deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
	/// Authorization and renewal requests (primary and fallback).
	pub auth: StdDuration,
	/// Track metadata requests.
	pub track_data: StdDuration,
	/// Track stream transfers.
	pub track: StdDuration,
}
impl Timeouts {
	/// Default authorization/renewal deadline.
	pub const DEFAULT_AUTH: StdDuration = StdDuration::from_secs(5);
	/// Default track metadata deadline.
	pub const DEFAULT_TRACK_DATA: StdDuration = StdDuration::from_secs(5);
	/// Default track stream deadline.
	pub const DEFAULT_TRACK: StdDuration = StdDuration::from_secs(20);

	fn validate(&self) -> Result<(), ConfigError> {
		for (timeout, value) in
			[("auth", self.auth), ("track data", self.track_data), ("track", self.track)]
		{
			if value.is_zero() {
				return Err(ConfigError::ZeroTimeout { timeout });
			}
		}

		Ok(())
	}
}
impl Default for Timeouts {
	fn default() -> Self {
		Self {
			auth: Self::DEFAULT_AUTH,
			track_data: Self::DEFAULT_TRACK_DATA,
			track: Self::DEFAULT_TRACK,
		}
	}
}

/// Validated gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
	/// Base URL for track metadata (`{base}/{id}`) and streams (`{base}/{id}/stream`).
	pub api_endpoint: Url,
	/// Primary authorization endpoint, also used for renewals.
	pub auth_endpoint: Url,
	/// Fallback token generator queried when the primary authorization fails.
	pub fallback_auth_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Maximum number of tracks kept in the content cache.
	pub cache_capacity: NonZeroUsize,
	/// Upstream request deadlines.
	pub timeouts: Timeouts,
	/// Address the HTTP surface binds to.
	pub listen_address: SocketAddr,
	/// Browser origins allowed to call the HTTP surface; empty or `*` allows any origin.
	pub allowed_origins: Vec<String>,
}
impl GatewayConfig {
	/// Wildcard origin.
	pub const ANY_ORIGIN: &str = "*";

	/// Default number of cached tracks.
	pub const DEFAULT_CACHE_CAPACITY: usize = 32;
	/// Default listen address.
	pub const DEFAULT_LISTEN_ADDRESS: SocketAddr =
		SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5000);

	/// Returns a builder with default cache capacity, timeouts, and listen address.
	pub fn builder() -> GatewayConfigBuilder {
		GatewayConfigBuilder::default()
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
		let raw: RawGatewayConfig =
			toml::from_str(raw).map_err(|e| ConfigError::Parse { message: e.message().into() })?;

		raw.into_builder()?.build()
	}

	/// Reads, parses, and validates the TOML file at `path`.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
			path: path.display().to_string(),
			message: e.to_string(),
		})?;

		Self::from_toml_str(&raw)
	}

	/// Track metadata URL for `id`.
	pub fn track_data_url(&self, id: impl Display) -> String {
		format!("{}/{id}", self.api_base())
	}

	/// Track stream URL for `id`.
	pub fn track_url(&self, id: impl Display) -> String {
		format!("{}/{id}/stream", self.api_base())
	}

	fn api_base(&self) -> &str {
		self.api_endpoint.as_str().trim_end_matches('/')
	}
}
impl Debug for GatewayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GatewayConfig")
			.field("api_endpoint", &self.api_endpoint.as_str())
			.field("auth_endpoint", &self.auth_endpoint.as_str())
			.field("fallback_auth_endpoint", &self.fallback_auth_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("cache_capacity", &self.cache_capacity)
			.field("timeouts", &self.timeouts)
			.field("listen_address", &self.listen_address)
			.field("allowed_origins", &self.allowed_origins)
			.finish()
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Base track API endpoint.
	pub api_endpoint: Option<Url>,
	/// Primary authorization endpoint.
	pub auth_endpoint: Option<Url>,
	/// Fallback token generator endpoint.
	pub fallback_auth_endpoint: Option<Url>,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<TokenSecret>,
	/// Requested cache capacity, validated to be non-zero.
	pub cache_capacity: usize,
	/// Upstream request deadlines.
	pub timeouts: Timeouts,
	/// Address the HTTP surface binds to.
	pub listen_address: SocketAddr,
	/// Browser origins allowed to call the HTTP surface.
	pub allowed_origins: Vec<String>,
}
impl GatewayConfigBuilder {
	/// Sets the base track API endpoint.
	pub fn api_endpoint(mut self, url: Url) -> Self {
		self.api_endpoint = Some(url);

		self
	}

	/// Sets the primary authorization endpoint.
	pub fn auth_endpoint(mut self, url: Url) -> Self {
		self.auth_endpoint = Some(url);

		self
	}

	/// Sets the fallback token generator endpoint.
	pub fn fallback_auth_endpoint(mut self, url: Url) -> Self {
		self.fallback_auth_endpoint = Some(url);

		self
	}

	/// Sets the OAuth client credential pair.
	pub fn client_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.client_id = Some(client_id.into());
		self.client_secret = Some(TokenSecret::new(client_secret));

		self
	}

	/// Overrides the content cache capacity.
	pub fn cache_capacity(mut self, capacity: usize) -> Self {
		self.cache_capacity = capacity;

		self
	}

	/// Overrides the upstream request deadlines.
	pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
		self.timeouts = timeouts;

		self
	}

	/// Overrides the listen address.
	pub fn listen_address(mut self, address: SocketAddr) -> Self {
		self.listen_address = address;

		self
	}

	/// Replaces the allowed browser origins.
	pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_origins = origins.into_iter().map(Into::into).collect();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		let api_endpoint = required_endpoint("api", self.api_endpoint)?;
		let auth_endpoint = required_endpoint("authorization", self.auth_endpoint)?;
		let fallback_auth_endpoint =
			required_endpoint("fallback authorization", self.fallback_auth_endpoint)?;
		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or(ConfigError::MissingAttribute { attribute: "client_id" })?;
		let client_secret = self
			.client_secret
			.filter(|secret| !secret.expose().trim().is_empty())
			.ok_or(ConfigError::MissingAttribute { attribute: "client_secret" })?;
		let cache_capacity =
			NonZeroUsize::new(self.cache_capacity).ok_or(ConfigError::ZeroCacheCapacity)?;

		self.timeouts.validate()?;

		for origin in &self.allowed_origins {
			validate_origin(origin)?;
		}

		Ok(GatewayConfig {
			api_endpoint,
			auth_endpoint,
			fallback_auth_endpoint,
			client_id,
			client_secret,
			cache_capacity,
			timeouts: self.timeouts,
			listen_address: self.listen_address,
			allowed_origins: self.allowed_origins,
		})
	}
}
impl Default for GatewayConfigBuilder {
	fn default() -> Self {
		Self {
			api_endpoint: None,
			auth_endpoint: None,
			fallback_auth_endpoint: None,
			client_id: None,
			client_secret: None,
			cache_capacity: GatewayConfig::DEFAULT_CACHE_CAPACITY,
			timeouts: Timeouts::default(),
			listen_address: GatewayConfig::DEFAULT_LISTEN_ADDRESS,
			allowed_origins: Vec::new(),
		}
	}
}

/// On-disk configuration shape.
#[derive(Debug, Deserialize)]
struct RawGatewayConfig {
	base_api_url: Option<String>,
	base_auth_url: Option<String>,
	token_generator_fallback: Option<String>,
	client_id: Option<String>,
	client_secret: Option<String>,
	cache_capacity: Option<usize>,
	auth_timeout_secs: Option<u64>,
	track_data_timeout_secs: Option<u64>,
	track_timeout_secs: Option<u64>,
	listen_address: Option<SocketAddr>,
	allowed_origins: Option<Vec<String>>,
}
impl RawGatewayConfig {
	fn into_builder(self) -> Result<GatewayConfigBuilder, ConfigError> {
		let defaults = Timeouts::default();
		let timeouts = Timeouts {
			auth: self.auth_timeout_secs.map(StdDuration::from_secs).unwrap_or(defaults.auth),
			track_data: self
				.track_data_timeout_secs
				.map(StdDuration::from_secs)
				.unwrap_or(defaults.track_data),
			track: self.track_timeout_secs.map(StdDuration::from_secs).unwrap_or(defaults.track),
		};
		let mut builder = GatewayConfig::builder().timeouts(timeouts);

		builder.api_endpoint = parse_endpoint("api", self.base_api_url)?;
		builder.auth_endpoint = parse_endpoint("authorization", self.base_auth_url)?;
		builder.fallback_auth_endpoint =
			parse_endpoint("fallback authorization", self.token_generator_fallback)?;
		builder.client_id = self.client_id;
		builder.client_secret = self.client_secret.map(TokenSecret::from);

		if let Some(capacity) = self.cache_capacity {
			builder = builder.cache_capacity(capacity);
		}
		if let Some(address) = self.listen_address {
			builder = builder.listen_address(address);
		}
		if let Some(origins) = self.allowed_origins {
			builder = builder.allowed_origins(origins);
		}

		Ok(builder)
	}
}

fn parse_endpoint(endpoint: &'static str, raw: Option<String>) -> Result<Option<Url>, ConfigError> {
	raw.map(|raw| Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { endpoint, source }))
		.transpose()
}

fn validate_origin(origin: &str) -> Result<(), ConfigError> {
	if origin == GatewayConfig::ANY_ORIGIN {
		return Ok(());
	}

	let invalid = || ConfigError::InvalidOrigin { origin: origin.to_owned() };
	let url = Url::parse(origin).map_err(|_| invalid())?;

	// An origin is scheme, host, and port only.
	if !matches!(url.scheme(), "http" | "https")
		|| url.host().is_none()
		|| url.path() != "/"
		|| url.query().is_some()
		|| url.fragment().is_some()
		|| origin.ends_with('/')
	{
		return Err(invalid());
	}

	Ok(())
}

fn required_endpoint(endpoint: &'static str, url: Option<Url>) -> Result<Url, ConfigError> {
	let url = url.ok_or(ConfigError::MissingEndpoint { endpoint })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedScheme { endpoint, url: url.to_string() }),
	}
}

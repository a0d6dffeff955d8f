//! Gateway-level error types shared across the token lifecycle, upstream transport, and services.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Cloneable, thread-safe handle to a foreign error.
///
/// Errors are shared between every caller that piggy-backs on the same token flight, so
/// sources that are not `Clone` themselves are kept behind an [`Arc`].
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream answered, but not with something usable.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Authorization or renewal payload could not become a [`Token`](crate::auth::Token).
	#[error(transparent)]
	Token(#[from] TokenError),

	/// Both the primary and the fallback authorization endpoints failed.
	#[error("Impossible to acquire a token: {primary} Fallback: {fallback}")]
	AuthorizationExhausted {
		/// Failure reported by the primary authorization endpoint.
		primary: Box<Error>,
		/// Failure reported by the fallback authorization endpoint.
		fallback: Box<Error>,
	},
	/// No valid token could be obtained for an outbound call.
	#[error("token not available")]
	TokenUnavailable {
		/// Underlying lifecycle failure.
		#[source]
		source: Box<Error>,
	},
	/// Track content could not be fetched.
	#[error("track not available")]
	TrackUnavailable {
		/// Underlying upstream failure.
		#[source]
		source: Box<Error>,
	},
	/// Track metadata could not be fetched.
	#[error("trackData not available")]
	TrackDataUnavailable {
		/// Underlying upstream failure.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	pub(crate) fn token_unavailable(source: Error) -> Self {
		Self::TokenUnavailable { source: Box::new(source) }
	}

	pub(crate) fn track_unavailable(source: Error) -> Self {
		Self::TrackUnavailable { source: Box::new(source) }
	}

	pub(crate) fn track_data_unavailable(source: Error) -> Self {
		Self::TrackDataUnavailable { source: Box::new(source) }
	}

	/// Returns `true` for the stable category errors emitted by the services.
	pub fn is_category(&self) -> bool {
		matches!(
			self,
			Self::TokenUnavailable { .. }
				| Self::TrackUnavailable { .. }
				| Self::TrackDataUnavailable { .. }
		)
	}
}

/// Upstream endpoints the gateway talks to; used to tag transport and status failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// Primary `client_credentials` authorization endpoint.
	PrimaryAuth,
	/// Fallback token generator.
	FallbackAuth,
	/// `refresh_token` renewal against the primary authorization endpoint.
	Renewal,
	/// Track metadata endpoint.
	TrackData,
	/// Track stream endpoint.
	Track,
}
impl Endpoint {
	/// Returns a stable label suitable for messages, span fields, or metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			Endpoint::PrimaryAuth => "primary authorization",
			Endpoint::FallbackAuth => "fallback authorization",
			Endpoint::Renewal => "token renewal",
			Endpoint::TrackData => "track data",
			Endpoint::Track => "track stream",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while assembling the gateway.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Transport builder failure summary.
		message: String,
	},
	/// Configuration source could not be read.
	#[error("Configuration file `{path}` could not be read: {message}.")]
	Read {
		/// Path that was requested.
		path: String,
		/// I/O failure summary.
		message: String,
	},
	/// Configuration source is not valid TOML or has mistyped values.
	#[error("Configuration is unparsable: {message}.")]
	Parse {
		/// Deserializer failure summary.
		message: String,
	},
	/// A required endpoint was not supplied.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is missing.
		endpoint: &'static str,
	},
	/// An endpoint could not be parsed as a URL.
	#[error("The {endpoint} endpoint is not a valid URL: {source}.")]
	InvalidUrl {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must speak HTTP(S).
	#[error("The {endpoint} endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Client identifier or secret is absent or blank.
	#[error("Missing required attribute `{attribute}`.")]
	MissingAttribute {
		/// Attribute name as it appears in the configuration file.
		attribute: &'static str,
	},
	/// An allowed origin is neither `*` nor a bare `scheme://host[:port]`.
	#[error("Allowed origin `{origin}` is not a valid origin.")]
	InvalidOrigin {
		/// Offending origin as configured.
		origin: String,
	},
	/// The content cache must hold at least one entry.
	#[error("Cache capacity must be greater than zero.")]
	ZeroCacheCapacity,
	/// Upstream timeouts must be positive so a stalled upstream cannot wedge the token lock.
	#[error("The {timeout} timeout must be greater than zero.")]
	ZeroTimeout {
		/// Which timeout failed validation.
		timeout: &'static str,
	},
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint: {source}.")]
	Network {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The request did not complete within its deadline.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint being called.
		endpoint: Endpoint,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: Endpoint, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Arc::new(src) }
	}
}

/// Responses that reached the gateway but cannot be used.
#[derive(Clone, Debug, ThisError)]
pub enum UpstreamError {
	/// Upstream returned a non-success status.
	#[error("Failed to call the {endpoint} endpoint, status {status} is not 200.")]
	Status {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// HTTP status code returned by upstream.
		status: u16,
	},
	/// Track metadata is not a JSON object.
	#[error("Track data is malformed at `{path}`.")]
	MalformedTrackData {
		/// JSON path at which decoding failed.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
}

/// Rules a token field can violate during validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationRule {
	/// Field must be present and non-empty/non-zero.
	Required,
	/// Field must equal a fixed value.
	Eq,
	/// Field must be strictly positive.
	Gt,
}
impl ValidationRule {
	/// Returns the rule's short tag.
	pub const fn as_str(self) -> &'static str {
		match self {
			ValidationRule::Required => "required",
			ValidationRule::Eq => "eq",
			ValidationRule::Gt => "gt",
		}
	}
}
impl Display for ValidationRule {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failures raised while turning an authorization/renewal payload into a token.
#[derive(Clone, Debug, ThisError)]
pub enum TokenError {
	/// Payload is not structurally valid token JSON.
	#[error("Token payload is malformed at `{path}`: {source}.")]
	Malformed {
		/// JSON path at which decoding failed (`.` for the document root).
		path: String,
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// A decoded field violated a validation rule.
	#[error("Field validation for `{field}` failed on the `{rule}` rule.")]
	Validation {
		/// Offending field.
		field: &'static str,
		/// Violated rule.
		rule: ValidationRule,
	},
	/// `expires_in` pushes the expiry instant past the representable range.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl From<serde_path_to_error::Error<serde_json::Error>> for TokenError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Malformed { path, source: Arc::new(e.into_inner()) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn category_errors_keep_their_labels_and_sources() {
		let cause = Error::from(UpstreamError::Status { endpoint: Endpoint::Track, status: 503 });
		let err = Error::track_unavailable(cause);

		assert_eq!(err.to_string(), "track not available");
		assert!(err.is_category());
		assert_eq!(
			err.source().map(ToString::to_string).as_deref(),
			Some("Failed to call the track stream endpoint, status 503 is not 200."),
		);
	}

	#[test]
	fn exhausted_authorization_reports_both_causes() {
		let err = Error::AuthorizationExhausted {
			primary: Box::new(
				UpstreamError::Status { endpoint: Endpoint::PrimaryAuth, status: 400 }.into(),
			),
			fallback: Box::new(TransportError::Timeout { endpoint: Endpoint::FallbackAuth }.into()),
		};
		let message = err.to_string();

		assert!(message.contains("primary authorization endpoint, status 400"));
		assert!(message.contains("fallback authorization endpoint timed out"));
		assert!(!err.is_category());
	}
}

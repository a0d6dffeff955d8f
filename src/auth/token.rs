//! Immutable access/refresh token pair and its validated construction.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{TokenError, ValidationRule},
};

/// The only token kind the upstream service issues.
pub const BEARER: &str = "bearer";

/// Wire shape of an authorization or renewal response.
///
/// Every field is optional here so absent values are reported by validation, naming the
/// offending field, instead of surfacing as anonymous decoding failures.
#[derive(Deserialize)]
struct TokenPayload {
	access_token: Option<String>,
	expires_in: Option<i64>,
	refresh_token: Option<String>,
	scope: Option<String>,
	token_type: Option<String>,
}

/// Access/refresh token pair with a derived absolute expiry.
///
/// A `Token` can only be obtained from [`Token::parse`], so an instance with a missing secret,
/// a non-bearer kind, or a non-empty scope never exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
	access_token: TokenSecret,
	refresh_token: TokenSecret,
	token_type: String,
	scope: String,
	expires_in: i64,
	expires_at: OffsetDateTime,
}
impl Token {
	/// Decodes and validates an authorization/renewal payload.
	///
	/// The expiry instant is `now + expires_in`. Structural decoding failures yield
	/// [`TokenError::Malformed`]; rule violations yield [`TokenError::Validation`] for the first
	/// offending field.
	pub fn parse(raw: &[u8], now: OffsetDateTime) -> Result<Self, TokenError> {
		let mut de = serde_json::Deserializer::from_slice(raw);
		let payload: TokenPayload = serde_path_to_error::deserialize(&mut de)?;

		de.end()
			.map_err(|e| TokenError::Malformed { path: ".".into(), source: Arc::new(e) })?;

		let access_token = required_secret("AccessToken", payload.access_token)?;
		let expires_in = match payload.expires_in {
			None | Some(0) => return Err(invalid("ExpiresIn", ValidationRule::Required)),
			Some(secs) if secs < 0 => return Err(invalid("ExpiresIn", ValidationRule::Gt)),
			Some(secs) => secs,
		};
		let refresh_token = required_secret("RefreshToken", payload.refresh_token)?;
		let scope = payload.scope.unwrap_or_default();

		if !scope.is_empty() {
			return Err(invalid("Scope", ValidationRule::Eq));
		}

		let token_type = match payload.token_type {
			Some(kind) if kind == BEARER => kind,
			Some(kind) if !kind.is_empty() => return Err(invalid("TokenType", ValidationRule::Eq)),
			_ => return Err(invalid("TokenType", ValidationRule::Required)),
		};
		let expires_at = now
			.checked_add(Duration::seconds(expires_in))
			.ok_or(TokenError::ExpiresInOutOfRange)?;

		Ok(Self { access_token, refresh_token, token_type, scope, expires_in, expires_at })
	}

	/// Access token secret; callers must avoid logging it.
	pub fn access_token(&self) -> &TokenSecret {
		&self.access_token
	}

	/// Refresh token secret used for renewal.
	pub fn refresh_token(&self) -> &TokenSecret {
		&self.refresh_token
	}

	/// Token kind, always [`BEARER`].
	pub fn token_type(&self) -> &str {
		&self.token_type
	}

	/// Granted scope, always empty.
	pub fn scope(&self) -> &str {
		&self.scope
	}

	/// Lifetime in seconds as reported by upstream.
	pub fn expires_in(&self) -> i64 {
		self.expires_in
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns `true` once `instant` is strictly past the expiry instant.
	///
	/// A token expiring exactly at `instant` is still valid.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at < instant
	}
}

fn required_secret(field: &'static str, value: Option<String>) -> Result<TokenSecret, TokenError> {
	match value {
		Some(value) if !value.is_empty() => Ok(TokenSecret::new(value)),
		_ => Err(invalid(field, ValidationRule::Required)),
	}
}

fn invalid(field: &'static str, rule: ValidationRule) -> TokenError {
	TokenError::Validation { field, rule }
}

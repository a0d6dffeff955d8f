//! Capability contracts for the upstream media service.
//!
//! The gateway never talks to the network directly; it goes through [`AuthorizationApi`] for
//! token acquisition and [`TrackApi`] for content. [`crate::http::ReqwestMediaApi`] implements
//! both against the real service, while tests substitute deterministic fakes.

// std
use std::num::ParseIntError;
// self
use crate::{_prelude::*, auth::Token};

/// Boxed future returned by the upstream capability traits.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Loosely typed track metadata; the schema belongs to upstream and is not validated here.
pub type TrackData = BTreeMap<String, serde_json::Value>;

/// Numeric identifier of an upstream track.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);
impl TrackId {
	/// Wraps a raw identifier.
	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	/// Returns the raw identifier.
	pub const fn get(self) -> u64 {
		self.0
	}
}
impl From<u64> for TrackId {
	fn from(value: u64) -> Self {
		Self(value)
	}
}
impl Debug for TrackId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Track({})", self.0)
	}
}
impl Display for TrackId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for TrackId {
	type Err = TrackIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse().map(Self).map_err(|source| TrackIdError::NotANumber { source })
	}
}

/// Error returned when a caller-supplied identifier cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TrackIdError {
	/// The identifier is not a non-negative integer.
	#[error("trackId not a number")]
	NotANumber {
		/// Integer parsing failure.
		#[source]
		source: ParseIntError,
	},
}

/// Authorization half of the upstream service: initial grant and renewal.
///
/// Both operations hand back the raw response body; turning it into a [`Token`] is the
/// lifecycle manager's job.
pub trait AuthorizationApi
where
	Self: Send + Sync,
{
	/// Obtains a fresh token payload.
	fn authorize(&self) -> ApiFuture<'_, Bytes>;

	/// Exchanges `token`'s refresh secret for a new token payload.
	fn renew<'a>(&'a self, token: &'a Token) -> ApiFuture<'a, Bytes>;
}

/// Content half of the upstream service.
pub trait TrackApi
where
	Self: Send + Sync,
{
	/// Fetches structured metadata for `id`.
	fn fetch_track_data<'a>(&'a self, token: &'a Token, id: TrackId) -> ApiFuture<'a, TrackData>;

	/// Fetches the audio stream for `id`.
	fn fetch_track<'a>(&'a self, token: &'a Token, id: TrackId) -> ApiFuture<'a, Bytes>;
}

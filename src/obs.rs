//! Optional observability helpers for gateway operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `track_gateway.operation` with the
//!   `operation` and `stage` (call site) fields.
//! - Enable `metrics` to increment the `track_gateway_operation_total` counter for every
//!   attempt/success/failure/cache hit, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Initial token acquisition (primary with fallback).
	Authorize,
	/// Refresh-token renewal of an expired token.
	Renew,
	/// Uncached track metadata lookup.
	TrackData,
	/// Cached track content lookup.
	Track,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Authorize => "authorize",
			Operation::Renew => "renew",
			Operation::TrackData => "track_data",
			Operation::Track => "track",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Served from the content cache without contacting upstream.
	CacheHit,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::CacheHit => "cache_hit",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the terminal outcome of `result` for `operation`.
pub(crate) fn record_result<T>(operation: Operation, result: &Result<T>) {
	match result {
		Ok(_) => record_outcome(operation, Outcome::Success),
		Err(_) => record_outcome(operation, Outcome::Failure),
	}
}

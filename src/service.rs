//! Track orchestration: obtain a token, consult the cache, call upstream.
//!
//! Both services collapse every failure into one of three stable categories
//! (`token not available`, `trackData not available`, `track not available`) while keeping the
//! underlying error reachable through [`std::error::Error::source`].

// self
use crate::{
	_prelude::*,
	api::{TrackApi, TrackData, TrackId},
	auth::TokenProvider,
	cache::TrackCache,
	obs::{self, Operation, OperationSpan, Outcome},
};

/// Uncached track metadata lookups.
#[derive(Clone)]
pub struct TrackDataService {
	tokens: Arc<dyn TokenProvider>,
	tracks: Arc<dyn TrackApi>,
}
impl TrackDataService {
	/// Creates a service drawing tokens from `tokens` and metadata from `tracks`.
	pub fn new(tokens: Arc<dyn TokenProvider>, tracks: Arc<dyn TrackApi>) -> Self {
		Self { tokens, tracks }
	}

	/// Fetches metadata for `id`.
	pub async fn track_data(&self, id: TrackId) -> Result<TrackData> {
		const OPERATION: Operation = Operation::TrackData;

		let span = OperationSpan::new(OPERATION, "track_data");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.tokens.token().await.map_err(Error::token_unavailable)?;

				self.tracks
					.fetch_track_data(&token, id)
					.await
					.map_err(Error::track_data_unavailable)
			})
			.await;

		obs::record_result(OPERATION, &result);
		log_failure(OPERATION, id, &result);

		result
	}
}
impl Debug for TrackDataService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TrackDataService(..)")
	}
}

/// Track content lookups backed by a [`TrackCache`].
///
/// A cache hit never touches the token provider or upstream. Concurrent misses for the same
/// track may both fetch and both insert; the last insert wins.
#[derive(Clone)]
pub struct CachedTrackService {
	cache: Arc<dyn TrackCache>,
	tokens: Arc<dyn TokenProvider>,
	tracks: Arc<dyn TrackApi>,
}
impl CachedTrackService {
	/// Creates a service caching into `cache`.
	pub fn new(
		cache: Arc<dyn TrackCache>,
		tokens: Arc<dyn TokenProvider>,
		tracks: Arc<dyn TrackApi>,
	) -> Self {
		Self { cache, tokens, tracks }
	}

	/// Returns the audio bytes for `id`, fetching and caching them on a miss.
	pub async fn track(&self, id: TrackId) -> Result<Bytes> {
		const OPERATION: Operation = Operation::Track;

		if let Some(track) = self.cached(id) {
			obs::record_outcome(OPERATION, Outcome::CacheHit);

			#[cfg(feature = "tracing")]
			tracing::debug!(track = %id, "track served from cache");

			return Ok(track);
		}

		let span = OperationSpan::new(OPERATION, "track");

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.tokens.token().await.map_err(Error::token_unavailable)?;
				let track = self
					.tracks
					.fetch_track(&token, id)
					.await
					.map_err(Error::track_unavailable)?;

				self.cache.add(id, track.clone());

				Ok(track)
			})
			.await;

		obs::record_result(OPERATION, &result);
		log_failure(OPERATION, id, &result);

		result
	}

	fn cached(&self, id: TrackId) -> Option<Bytes> {
		if !self.cache.contains(id) {
			return None;
		}

		// Evicted between the two calls; treat as a miss.
		self.cache.get(id)
	}
}
impl Debug for CachedTrackService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CachedTrackService(..)")
	}
}

fn log_failure<T>(operation: Operation, id: TrackId, result: &Result<T>) {
	#[cfg(feature = "tracing")]
	{
		if let Err(err) = result {
			tracing::warn!(
				operation = operation.as_str(),
				track = %id,
				error = %err,
				cause = ?err.source().map(ToString::to_string),
				"track request failed"
			);
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (operation, id, result);
	}
}

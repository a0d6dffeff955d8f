//! Composition root wiring configuration into a ready-to-serve gateway.

// self
use crate::{
	_prelude::*,
	api::{TrackData, TrackId},
	auth::{TokenMetrics, TokenProvider, TokenRepository},
	cache::{LruTrackCache, TrackCache},
	clock::{Clock, SystemClock},
	config::GatewayConfig,
	http::ReqwestMediaApi,
	service::{CachedTrackService, TrackDataService},
};

/// Fully wired gateway: one token lifecycle, one content cache, two services.
///
/// Cloning is cheap; every clone shares the same token and cache.
#[derive(Clone, Debug)]
pub struct Gateway {
	tokens: Arc<TokenRepository<ReqwestMediaApi>>,
	cache: Arc<LruTrackCache>,
	track_data: TrackDataService,
	tracks: CachedTrackService,
}
impl Gateway {
	/// Wires the reqwest transport, the system clock, and an LRU cache sized from `config`.
	///
	/// No upstream call happens here; the first token is acquired on first use.
	pub fn from_config(config: &GatewayConfig) -> Result<Self> {
		Ok(Self::with_api(config, ReqwestMediaApi::new(config)?, Arc::new(SystemClock)))
	}

	/// Wires a caller-provided transport and clock.
	pub fn with_api(
		config: &GatewayConfig,
		api: ReqwestMediaApi,
		clock: Arc<dyn Clock>,
	) -> Self {
		let api = Arc::new(api);
		let tokens = Arc::new(TokenRepository::new(api.clone(), clock));
		let cache = Arc::new(LruTrackCache::new(config.cache_capacity));
		let provider: Arc<dyn TokenProvider> = tokens.clone();
		let content: Arc<dyn TrackCache> = cache.clone();
		let track_data = TrackDataService::new(provider.clone(), api.clone());
		let tracks = CachedTrackService::new(content, provider, api);

		#[cfg(feature = "tracing")]
		tracing::info!(
			api = %config.api_endpoint,
			cache_capacity = config.cache_capacity.get(),
			"gateway assembled"
		);

		Self { tokens, cache, track_data, tracks }
	}

	/// Fetches metadata for `id`.
	pub async fn track_data(&self, id: TrackId) -> Result<TrackData> {
		self.track_data.track_data(id).await
	}

	/// Fetches (or serves from cache) the audio bytes for `id`.
	pub async fn track(&self, id: TrackId) -> Result<Bytes> {
		self.tracks.track(id).await
	}

	/// Uncached metadata service.
	pub fn track_data_service(&self) -> &TrackDataService {
		&self.track_data
	}

	/// Cached content service.
	pub fn track_service(&self) -> &CachedTrackService {
		&self.tracks
	}

	/// Token lifecycle counters.
	pub fn token_metrics(&self) -> Arc<TokenMetrics> {
		self.tokens.metrics()
	}

	/// Token lifecycle manager.
	pub fn tokens(&self) -> &Arc<TokenRepository<ReqwestMediaApi>> {
		&self.tokens
	}

	/// Content cache.
	pub fn cache(&self) -> &Arc<LruTrackCache> {
		&self.cache
	}
}

//! Bounded in-memory content cache keyed by track identifier.

// std
use std::num::NonZeroUsize;
// crates.io
use lru::LruCache;
// self
use crate::{_prelude::*, api::TrackId};

/// Content cache contract consumed by [`CachedTrackService`](crate::service::CachedTrackService).
///
/// Implementations synchronize internally; callers never add their own locking.
pub trait TrackCache
where
	Self: Send + Sync,
{
	/// Inserts or replaces `id`, returning `true` when another entry was evicted to make room.
	fn add(&self, id: TrackId, track: Bytes) -> bool;

	/// Returns `true` if `id` is cached, without touching its recency.
	fn contains(&self, id: TrackId) -> bool;

	/// Returns the cached bytes for `id`, marking it as most recently used.
	fn get(&self, id: TrackId) -> Option<Bytes>;
}

/// Thread-safe [`TrackCache`] evicting the least recently used entry once full.
pub struct LruTrackCache(Mutex<LruCache<TrackId, Bytes>>);
impl LruTrackCache {
	/// Creates a cache holding at most `capacity` tracks.
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self(Mutex::new(LruCache::new(capacity)))
	}

	/// Returns the number of cached tracks.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` if nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}

	/// Returns the maximum number of cached tracks.
	pub fn capacity(&self) -> NonZeroUsize {
		self.0.lock().cap()
	}
}
impl TrackCache for LruTrackCache {
	fn add(&self, id: TrackId, track: Bytes) -> bool {
		matches!(self.0.lock().push(id, track), Some((displaced, _)) if displaced != id)
	}

	fn contains(&self, id: TrackId) -> bool {
		self.0.lock().contains(&id)
	}

	fn get(&self, id: TrackId) -> Option<Bytes> {
		self.0.lock().get(&id).cloned()
	}
}
impl Debug for LruTrackCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let cache = self.0.lock();

		f.debug_struct("LruTrackCache").field("len", &cache.len()).field("cap", &cache.cap()).finish()
	}
}

//! Track metadata and audio stream gateway that keeps a single OAuth token alive behind the
//! scenes and caches upstream content in a bounded LRU.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
#[cfg(feature = "reqwest")] pub mod gateway;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
#[cfg(feature = "server")] pub mod server;
pub mod service;
#[cfg(test)]
pub mod _preludet {
	//! Deterministic fakes for the capability traits, shared by unit tests.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::HashMap,
		sync::atomic::{AtomicBool, AtomicUsize, Ordering},
	};
	// crates.io
	use time::macros;
	// self
	use crate::{
		api::{ApiFuture, AuthorizationApi, TrackApi, TrackData, TrackId},
		auth::{Token, TokenProvider},
		cache::TrackCache,
		error::{Endpoint, TransportError, UpstreamError},
	};

	/// Authorization payload issued by the fakes.
	pub const PAYLOAD: &str = r#"{"access_token":"miao","token_type":"bearer","refresh_token":"bau","expires_in":3599,"scope":""}"#;
	/// Renewal payload issued by the fakes.
	pub const RENEWED_PAYLOAD: &str = r#"{"access_token":"miao_renewed","token_type":"bearer","refresh_token":"bau","expires_in":3599,"scope":""}"#;

	/// Instant every fake clock starts from.
	pub fn reference_instant() -> OffsetDateTime {
		macros::datetime!(2021-08-25 08:30 UTC)
	}

	/// Token parsed from [`PAYLOAD`] at [`reference_instant`].
	pub fn sample_token() -> Token {
		Token::parse(PAYLOAD.as_bytes(), reference_instant())
			.expect("Fixture payload should parse.")
	}

	fn authorize_failure() -> Error {
		TransportError::Timeout { endpoint: Endpoint::PrimaryAuth }.into()
	}

	fn renew_failure() -> Error {
		UpstreamError::Status { endpoint: Endpoint::Renewal, status: 401 }.into()
	}

	/// Scripted [`AuthorizationApi`] counting calls and recording renewal secrets.
	#[derive(Debug)]
	pub struct ScriptedAuthApi {
		authorize_payload: &'static str,
		renew_payload: &'static str,
		fail_authorize: AtomicBool,
		fail_renew: AtomicBool,
		latency: Option<std::time::Duration>,
		authorize_calls: AtomicUsize,
		renewed_with: Mutex<Vec<String>>,
	}
	impl ScriptedAuthApi {
		/// Message of every scripted authorization failure.
		pub const AUTHORIZE_FAILURE: &str =
			"Request to the primary authorization endpoint timed out.";
		/// Message of every scripted renewal failure.
		pub const RENEW_FAILURE: &str =
			"Failed to call the token renewal endpoint, status 401 is not 200.";

		/// Answers with the given raw bodies.
		pub fn with_payloads(authorize: &'static str, renew: &'static str) -> Self {
			Self {
				authorize_payload: authorize,
				renew_payload: renew,
				fail_authorize: AtomicBool::new(false),
				fail_renew: AtomicBool::new(false),
				latency: None,
				authorize_calls: AtomicUsize::new(0),
				renewed_with: Mutex::new(Vec::new()),
			}
		}

		/// Fails every authorization until [`recover`](Self::recover) is called.
		pub fn failing() -> Self {
			let api = Self::default();

			api.fail_authorize.store(true, Ordering::SeqCst);

			api
		}

		/// Delays every answer so concurrent callers pile up behind the lock.
		pub fn with_latency(mut self) -> Self {
			self.latency = Some(std::time::Duration::from_millis(20));

			self
		}

		/// Fails every subsequent renewal.
		pub fn fail_renewals(&self) {
			self.fail_renew.store(true, Ordering::SeqCst);
		}

		/// Stops failing.
		pub fn recover(&self) {
			self.fail_authorize.store(false, Ordering::SeqCst);
			self.fail_renew.store(false, Ordering::SeqCst);
		}

		/// Number of authorization calls.
		pub fn authorize_calls(&self) -> usize {
			self.authorize_calls.load(Ordering::SeqCst)
		}

		/// Number of renewal calls.
		pub fn renew_calls(&self) -> usize {
			self.renewed_with.lock().len()
		}

		/// Refresh secrets received, in call order.
		pub fn renewed_with(&self) -> Vec<String> {
			self.renewed_with.lock().clone()
		}

		async fn pause(&self) {
			if let Some(latency) = self.latency {
				tokio::time::sleep(latency).await;
			}
		}
	}
	impl Default for ScriptedAuthApi {
		fn default() -> Self {
			Self::with_payloads(PAYLOAD, RENEWED_PAYLOAD)
		}
	}
	impl AuthorizationApi for ScriptedAuthApi {
		fn authorize(&self) -> ApiFuture<'_, Bytes> {
			Box::pin(async move {
				self.authorize_calls.fetch_add(1, Ordering::SeqCst);
				self.pause().await;

				if self.fail_authorize.load(Ordering::SeqCst) {
					return Err(authorize_failure());
				}

				Ok(Bytes::from_static(self.authorize_payload.as_bytes()))
			})
		}

		fn renew<'a>(&'a self, token: &'a Token) -> ApiFuture<'a, Bytes> {
			Box::pin(async move {
				self.renewed_with.lock().push(token.refresh_token().expose().to_owned());
				self.pause().await;

				if self.fail_renew.load(Ordering::SeqCst) {
					return Err(renew_failure());
				}

				Ok(Bytes::from_static(self.renew_payload.as_bytes()))
			})
		}
	}

	/// [`TokenProvider`] answering with [`sample_token`] or a fixed failure.
	#[derive(Debug, Default)]
	pub struct StaticTokenProvider {
		fail: bool,
		calls: AtomicUsize,
	}
	impl StaticTokenProvider {
		/// Message of the scripted failure.
		pub const FAILURE: &str = "Request to the primary authorization endpoint timed out.";

		/// Fails every call.
		pub fn failing() -> Self {
			Self { fail: true, ..Default::default() }
		}

		/// Number of token requests.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl TokenProvider for StaticTokenProvider {
		fn token(&self) -> ApiFuture<'_, Token> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);

				if self.fail { Err(authorize_failure()) } else { Ok(sample_token()) }
			})
		}
	}

	/// [`TrackApi`] echoing the identifier and the access token it was called with.
	///
	/// Metadata is `{"id": <id>, "token": <access>}`; content is `<access><id>`.
	#[derive(Debug, Default)]
	pub struct ScriptedTrackApi {
		fail: bool,
		track_data_calls: AtomicUsize,
		track_calls: AtomicUsize,
	}
	impl ScriptedTrackApi {
		/// Fails every call with a `503` status.
		pub fn failing() -> Self {
			Self { fail: true, ..Default::default() }
		}

		/// Number of metadata requests.
		pub fn track_data_calls(&self) -> usize {
			self.track_data_calls.load(Ordering::SeqCst)
		}

		/// Number of content requests.
		pub fn track_calls(&self) -> usize {
			self.track_calls.load(Ordering::SeqCst)
		}

		fn check(&self, endpoint: Endpoint) -> Result<()> {
			if self.fail {
				return Err(UpstreamError::Status { endpoint, status: 503 }.into());
			}

			Ok(())
		}
	}
	impl TrackApi for ScriptedTrackApi {
		fn fetch_track_data<'a>(
			&'a self,
			token: &'a Token,
			id: TrackId,
		) -> ApiFuture<'a, TrackData> {
			Box::pin(async move {
				self.track_data_calls.fetch_add(1, Ordering::SeqCst);
				self.check(Endpoint::TrackData)?;

				Ok(TrackData::from([
					("id".to_owned(), serde_json::json!(id.get())),
					("token".to_owned(), serde_json::json!(token.access_token().expose())),
				]))
			})
		}

		fn fetch_track<'a>(&'a self, token: &'a Token, id: TrackId) -> ApiFuture<'a, Bytes> {
			Box::pin(async move {
				self.track_calls.fetch_add(1, Ordering::SeqCst);
				self.check(Endpoint::Track)?;

				Ok(Bytes::from(format!("{}{id}", token.access_token().expose())))
			})
		}
	}

	/// Unbounded [`TrackCache`] remembering whether it was ever read.
	#[derive(Debug, Default)]
	pub struct RecordingCache {
		entries: Mutex<HashMap<TrackId, Bytes>>,
		read: AtomicBool,
		adds: AtomicUsize,
	}
	impl RecordingCache {
		/// Returns `true` once [`TrackCache::get`] has been called.
		pub fn was_read(&self) -> bool {
			self.read.load(Ordering::SeqCst)
		}

		/// Number of inserts.
		pub fn adds(&self) -> usize {
			self.adds.load(Ordering::SeqCst)
		}
	}
	impl TrackCache for RecordingCache {
		fn add(&self, id: TrackId, track: Bytes) -> bool {
			self.adds.fetch_add(1, Ordering::SeqCst);
			self.entries.lock().insert(id, track);

			false
		}

		fn contains(&self, id: TrackId) -> bool {
			self.entries.lock().contains_key(&id)
		}

		fn get(&self, id: TrackId) -> Option<Bytes> {
			self.read.store(true, Ordering::SeqCst);

			self.entries.lock().get(&id).cloned()
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use bytes::Bytes;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use bytes;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {axum_test as _, httpmock as _};
#[cfg(feature = "server")] use {color_eyre as _, tracing_subscriber as _};

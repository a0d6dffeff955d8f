//! Token lifecycle manager with lazy acquisition, expiry-driven renewal, and singleflight guards.
//!
//! [`TokenRepository::token`] serializes every caller through one async mutex held across the
//! whole check-then-act sequence: inspect the current token, authorize or renew when needed,
//! store the result. Callers that queue up behind an in-flight authorization or renewal observe
//! its outcome instead of repeating it, so the upstream service sees exactly one call per
//! transition. A failed transition leaves no sticky state behind; the next caller that arrives
//! after it simply tries again.
//!
//! The upstream call itself lives in the shared state rather than in the caller's future. If the
//! lock holder is dropped mid-transition, the next lock holder resumes the same call.

mod metrics;

pub use metrics::TokenMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	api::{ApiFuture, AuthorizationApi},
	auth::Token,
	clock::Clock,
	obs::{self, Operation, OperationSpan, Outcome},
};

/// Anything that can hand out a currently valid [`Token`].
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Returns a token that is not expired at the time of the call.
	fn token(&self) -> ApiFuture<'_, Token>;
}

type Transition = Shared<BoxFuture<'static, Result<Token>>>;

#[derive(Default)]
struct TokenState {
	current: Option<Token>,
	/// Most recent failed transition, tagged with its flight number.
	last_failure: Option<(u64, Error)>,
	/// Transition whose lock holder went away before it completed.
	in_flight: Option<(Operation, Transition)>,
}
impl TokenState {
	fn failure_after(&self, observed: u64) -> Option<Error> {
		self.last_failure
			.as_ref()
			.filter(|(flight, _)| *flight > observed)
			.map(|(_, err)| err.clone())
	}
}

/// Owns the process-wide token and keeps it valid.
pub struct TokenRepository<A>
where
	A: 'static + ?Sized + AuthorizationApi,
{
	api: Arc<A>,
	clock: Arc<dyn Clock>,
	state: AsyncMutex<TokenState>,
	/// Completed transitions; only written while `state` is locked.
	flights: AtomicU64,
	metrics: Arc<TokenMetrics>,
}
impl<A> TokenRepository<A>
where
	A: 'static + ?Sized + AuthorizationApi,
{
	/// Creates an uninitialized repository; no upstream call happens until the first
	/// [`token`](Self::token) request.
	pub fn new(api: impl Into<Arc<A>>, clock: Arc<dyn Clock>) -> Self {
		Self {
			api: api.into(),
			clock,
			state: AsyncMutex::new(TokenState::default()),
			flights: AtomicU64::new(0),
			metrics: Default::default(),
		}
	}

	/// Shared counters for authorizations, renewals, reuses, and failures.
	pub fn metrics(&self) -> Arc<TokenMetrics> {
		self.metrics.clone()
	}

	/// Returns `true` once an authorization has succeeded.
	pub async fn is_initialized(&self) -> bool {
		self.state.lock().await.current.is_some()
	}

	/// Returns the current token, authorizing on first use and renewing once expired.
	///
	/// Upstream and validation failures are returned unchanged. Every caller that was already
	/// waiting while a transition failed receives that same failure.
	pub async fn token(&self) -> Result<Token> {
		let observed = self.flights.load(Ordering::Acquire);
		let mut state = self.state.lock().await;

		if let Some(err) = state.failure_after(observed) {
			self.metrics.record_shared_failure();

			return Err(err);
		}

		let (operation, transition) = match state.in_flight.clone() {
			Some(resumed) => resumed,
			None => {
				let now = self.clock.now();
				let operation = match state.current.as_ref() {
					None => Operation::Authorize,
					Some(current) if current.is_expired_at(now) => Operation::Renew,
					Some(current) => {
						self.metrics.record_reuse();

						return Ok(current.clone());
					},
				};
				let transition = self.transition(state.current.clone(), now);

				obs::record_outcome(operation, Outcome::Attempt);

				state.in_flight = Some((operation, transition.clone()));

				(operation, transition)
			},
		};
		let span = OperationSpan::new(operation, "token");
		let result = span.instrument(transition).await;
		let flight = self.flights.load(Ordering::Relaxed) + 1;

		state.in_flight = None;

		obs::record_result(operation, &result);

		match &result {
			Ok(token) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(
					operation = operation.as_str(),
					expires_at = %token.expires_at(),
					"token established"
				);

				match operation {
					Operation::Renew => self.metrics.record_renewal(),
					_ => self.metrics.record_authorization(),
				}

				state.current = Some(token.clone());
				state.last_failure = None;
			},
			Err(err) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					operation = operation.as_str(),
					error = %err,
					"token transition failed"
				);

				self.metrics.record_failure();

				state.last_failure = Some((flight, err.clone()));
			},
		}

		self.flights.store(flight, Ordering::Release);

		result
	}

	fn transition(&self, current: Option<Token>, now: OffsetDateTime) -> Transition {
		let api = self.api.clone();

		async move {
			let raw = match current.as_ref() {
				None => api.authorize().await?,
				Some(expired) => api.renew(expired).await?,
			};

			Ok::<_, Error>(Token::parse(&raw, now)?)
		}
		.boxed()
		.shared()
	}
}
impl<A> TokenProvider for TokenRepository<A>
where
	A: 'static + ?Sized + AuthorizationApi,
{
	fn token(&self) -> ApiFuture<'_, Token> {
		Box::pin(TokenRepository::token(self))
	}
}
impl<A> Debug for TokenRepository<A>
where
	A: 'static + ?Sized + AuthorizationApi,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRepository")
			.field("flights", &self.flights.load(Ordering::Relaxed))
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{_preludet::*, clock::FixedClock};

	const CALLERS: usize = 20;

	type Repository = Arc<TokenRepository<ScriptedAuthApi>>;

	fn repository(api: Arc<ScriptedAuthApi>) -> (Repository, Arc<FixedClock>) {
		let clock = Arc::new(FixedClock::new(reference_instant()));
		let repository = Arc::new(TokenRepository::new(api, clock.clone()));

		(repository, clock)
	}

	async fn expired_repository(api: Arc<ScriptedAuthApi>) -> (Repository, Arc<FixedClock>) {
		let (repository, clock) = repository(api);

		repository.token().await.expect("Seeding authorization should succeed.");
		clock.advance(Duration::seconds(3600));

		(repository, clock)
	}

	async fn race(repository: &Repository) -> Vec<Result<Token>> {
		let handles = (0..CALLERS)
			.map(|_| {
				let repository = repository.clone();

				tokio::spawn(async move { repository.token().await })
			})
			.collect::<Vec<_>>();
		let mut results = Vec::with_capacity(CALLERS);

		for handle in handles {
			results.push(handle.await.expect("Token task should not panic."));
		}

		results
	}

	#[tokio::test]
	async fn first_call_authorizes_lazily() {
		let api = Arc::new(ScriptedAuthApi::default());
		let (repository, clock) = repository(api.clone());

		assert!(!repository.is_initialized().await);
		assert_eq!(api.authorize_calls(), 0);

		let token = repository.token().await.expect("Authorization should succeed.");

		assert!(repository.is_initialized().await);
		assert_eq!(token.access_token().expose(), "miao");
		assert_eq!(token.refresh_token().expose(), "bau");
		assert_eq!(token.expires_at(), clock.now() + Duration::seconds(token.expires_in()));
		assert_eq!(token.expires_at(), macros::datetime!(2021-08-25 09:29:59 UTC));
		assert_eq!(api.authorize_calls(), 1);
		assert_eq!(repository.metrics().authorizations(), 1);
	}

	#[tokio::test]
	async fn valid_token_is_reused() {
		let api = Arc::new(ScriptedAuthApi::default());
		let (repository, clock) = repository(api.clone());
		let first = repository.token().await.expect("Authorization should succeed.");

		clock.set(first.expires_at());

		let second = repository.token().await.expect("Boundary token should be reused.");

		assert_eq!(first, second);
		assert_eq!(api.authorize_calls(), 1);
		assert_eq!(api.renew_calls(), 0);
		assert_eq!(repository.metrics().reuses(), 1);
	}

	#[tokio::test]
	async fn expired_token_is_renewed_with_its_refresh_secret() {
		let api = Arc::new(ScriptedAuthApi::default());
		let (repository, clock) = expired_repository(api.clone()).await;
		let renewed = repository.token().await.expect("Renewal should succeed.");

		assert_eq!(renewed.access_token().expose(), "miao_renewed");
		assert_eq!(renewed.refresh_token().expose(), "bau");
		assert_eq!(renewed.expires_at(), clock.now() + Duration::seconds(3599));
		assert_eq!(api.renewed_with(), vec!["bau".to_string()]);
		assert_eq!(repository.metrics().renewals(), 1);
	}

	#[tokio::test]
	async fn upstream_failures_are_returned_unchanged() {
		let api = Arc::new(ScriptedAuthApi::failing());
		let (repository, _) = repository(api.clone());
		let err = repository.token().await.expect_err("Authorization failure must surface.");

		assert_eq!(err.to_string(), ScriptedAuthApi::AUTHORIZE_FAILURE);
		assert!(!repository.is_initialized().await);

		let api = Arc::new(ScriptedAuthApi::default());
		let (repository, _) = expired_repository(api.clone()).await;

		api.fail_renewals();

		let err = repository.token().await.expect_err("Renewal failure must surface.");

		assert_eq!(err.to_string(), ScriptedAuthApi::RENEW_FAILURE);
	}

	#[tokio::test]
	async fn malformed_payloads_surface_as_token_errors() {
		let api = Arc::new(ScriptedAuthApi::with_payloads("12312", "12312"));
		let (repository, _) = repository(api);

		assert!(matches!(
			repository.token().await,
			Err(Error::Token(crate::error::TokenError::Malformed { .. }))
		));
	}

	#[tokio::test]
	async fn failed_transitions_are_retried_by_later_callers() {
		let api = Arc::new(ScriptedAuthApi::failing());
		let (repository, _) = repository(api.clone());

		repository.token().await.expect_err("First authorization should fail.");
		api.recover();

		let token = repository.token().await.expect("Second authorization should succeed.");

		assert_eq!(token.access_token().expose(), "miao");
		assert_eq!(api.authorize_calls(), 2);
		assert_eq!(repository.metrics().failures(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_callers_share_one_authorization() {
		let api = Arc::new(ScriptedAuthApi::default().with_latency());
		let (repository, _) = repository(api.clone());
		let results = race(&repository).await;
		let first = results[0].as_ref().expect("Authorization should succeed.").clone();

		for result in &results {
			assert_eq!(result.as_ref().expect("Every caller should get a token."), &first);
		}

		assert_eq!(api.authorize_calls(), 1);
		assert_eq!(api.renew_calls(), 0);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_callers_share_one_renewal() {
		let api = Arc::new(ScriptedAuthApi::default().with_latency());
		let (repository, _) = expired_repository(api.clone()).await;
		let results = race(&repository).await;

		for result in &results {
			let token = result.as_ref().expect("Every caller should get the renewed token.");

			assert_eq!(token.access_token().expose(), "miao_renewed");
		}

		assert_eq!(api.authorize_calls(), 1);
		assert_eq!(api.renew_calls(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn dropped_lock_holder_does_not_repeat_the_transition() {
		let api = Arc::new(ScriptedAuthApi::default().with_latency());
		let (repository, _) = repository(api.clone());
		let first = tokio::spawn({
			let repository = repository.clone();

			async move { repository.token().await }
		});

		tokio::time::sleep(std::time::Duration::from_millis(5)).await;

		let second = tokio::spawn({
			let repository = repository.clone();

			async move { repository.token().await }
		});

		tokio::time::sleep(std::time::Duration::from_millis(2)).await;
		first.abort();

		let token = second
			.await
			.expect("Token task should not panic.")
			.expect("Resumed authorization should succeed.");

		assert_eq!(token.access_token().expose(), "miao");
		assert_eq!(api.authorize_calls(), 1);
		assert_eq!(repository.metrics().authorizations(), 1);
		assert!(repository.is_initialized().await);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_callers_share_one_failure() {
		let api = Arc::new(ScriptedAuthApi::failing().with_latency());
		let (repository, _) = repository(api.clone());
		let gate = repository.state.lock().await;
		let handles = (0..CALLERS)
			.map(|_| {
				let repository = repository.clone();

				tokio::spawn(async move { repository.token().await })
			})
			.collect::<Vec<_>>();

		// Every caller has sampled the flight counter and is parked on the lock.
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;
		drop(gate);

		for handle in handles {
			let err = handle
				.await
				.expect("Token task should not panic.")
				.expect_err("Every caller should observe the failure.");

			assert_eq!(err.to_string(), ScriptedAuthApi::AUTHORIZE_FAILURE);
		}

		assert_eq!(api.authorize_calls(), 1);
		assert_eq!(repository.metrics().shared_failures(), (CALLERS - 1) as u64);
	}
}

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token lifecycle transitions.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	authorizations: AtomicU64,
	renewals: AtomicU64,
	reuses: AtomicU64,
	failures: AtomicU64,
	shared_failures: AtomicU64,
}
impl TokenMetrics {
	/// Returns the number of successful initial authorizations.
	pub fn authorizations(&self) -> u64 {
		self.authorizations.load(Ordering::Relaxed)
	}

	/// Returns the number of successful renewals.
	pub fn renewals(&self) -> u64 {
		self.renewals.load(Ordering::Relaxed)
	}

	/// Returns the number of calls served by the still-valid current token.
	pub fn reuses(&self) -> u64 {
		self.reuses.load(Ordering::Relaxed)
	}

	/// Returns the number of failed authorization/renewal transitions.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that received a failure from a transition they waited on.
	pub fn shared_failures(&self) -> u64 {
		self.shared_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_authorization(&self) {
		self.authorizations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewal(&self) {
		self.renewals.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reuse(&self) {
		self.reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_shared_failure(&self) {
		self.shared_failures.fetch_add(1, Ordering::Relaxed);
	}
}

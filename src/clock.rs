//! Wall-clock abstraction so expiry decisions stay deterministic under test.

// self
use crate::_prelude::*;

/// Source of the current instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by the system's UTC time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven [`Clock`]; it only moves when told to.
#[derive(Debug)]
pub struct FixedClock(Mutex<OffsetDateTime>);
impl FixedClock {
	/// Creates a clock frozen at `instant`.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(Mutex::new(instant))
	}

	/// Moves the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Moves the clock forward (or backward, for negative values) by `delta`.
	pub fn advance(&self, delta: Duration) {
		let mut now = self.0.lock();

		*now += delta;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

use core::time::Duration;

/// Tunables of an [`Rcu`](crate::Rcu) domain.
///
/// ```
/// use core::time::Duration;
///
/// let config = rcpls::Config::new()
/// 	.max_readers(64)
/// 	.spin_limit(128)
/// 	.sleep_interval(Duration::from_millis(1));
///
/// assert_eq!(config.get_max_readers(), Some(64));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
	max_readers: Option<usize>,
	spin_limit: u32,
	sleep_interval: Duration,
}

impl Config {
	/// Number of polls a [`Wait`](crate::Wait) strategy spins in place
	/// before escalating.
	pub const DEFAULT_SPIN_LIMIT: u32 = 1024;

	/// How long [`Sleep`](crate::Wait) naps between polls once spinning and
	/// yielding have not been enough.
	pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_millis(10);

	/// Create the default configuration: no reader limit and the default
	/// polling parameters.
	#[must_use]
	pub const fn new() -> Self {
		Self {
			max_readers: None,
			spin_limit: Self::DEFAULT_SPIN_LIMIT,
			sleep_interval: Self::DEFAULT_SLEEP_INTERVAL,
		}
	}

	/// Limit how many readers may be registered at the same time.
	#[must_use]
	pub const fn max_readers(mut self, max: usize) -> Self {
		self.max_readers = Some(max);
		self
	}

	/// Set how many polls are spent spinning before a wait escalates.
	#[must_use]
	pub const fn spin_limit(mut self, polls: u32) -> Self {
		self.spin_limit = polls;
		self
	}

	/// Set the nap length used by sleeping wait strategies.
	#[must_use]
	pub const fn sleep_interval(mut self, interval: Duration) -> Self {
		self.sleep_interval = interval;
		self
	}

	/// The reader limit, if any.
	#[must_use]
	pub const fn get_max_readers(&self) -> Option<usize> {
		self.max_readers
	}

	/// The spin limit.
	#[must_use]
	pub const fn get_spin_limit(&self) -> u32 {
		self.spin_limit
	}

	/// The sleep interval.
	#[must_use]
	pub const fn get_sleep_interval(&self) -> Duration {
		self.sleep_interval
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::new()
	}
}

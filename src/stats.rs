use portable_atomic::{AtomicU64, Ordering};

/// A point-in-time view of a domain's grace-period activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
	/// Calls to `synchronize` that returned.
	pub synchronizations: u64,
	/// Calls that ran at least one flip-and-wait of their own.
	pub grace_periods: u64,
	/// Calls that returned early because other writers had already flipped
	/// enough times on their behalf.
	pub shared: u64,
	/// Flips of the global index.
	pub flips: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
	grace_periods: AtomicU64,
	shared: AtomicU64,
	flips: AtomicU64,
}

impl Counters {
	pub const fn new() -> Self {
		Self {
			grace_periods: AtomicU64::new(0),
			shared: AtomicU64::new(0),
			flips: AtomicU64::new(0),
		}
	}

	pub fn grace_period(&self) {
		self.grace_periods.fetch_add(1, Ordering::Relaxed);
	}

	pub fn shared(&self) {
		self.shared.fetch_add(1, Ordering::Relaxed);
	}

	pub fn flip(&self) {
		self.flips.fetch_add(1, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> Stats {
		let grace_periods = self.grace_periods.load(Ordering::Relaxed);
		let shared = self.shared.load(Ordering::Relaxed);

		Stats {
			synchronizations: grace_periods + shared,
			grace_periods,
			shared,
			flips: self.flips.load(Ordering::Relaxed),
		}
	}
}

extern crate alloc;

use core::fmt;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use portable_atomic::{AtomicU64, Ordering};

use crate::counters::CounterPair;
use crate::spin::Spinlock;
use crate::Error;

/// Identifies a registered [`Reader`](crate::Reader) within its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReaderId(u64);

impl ReaderId {
	/// The raw identifier.
	#[must_use]
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ReaderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Maps every registered reader to its counter pair.
///
/// Writers never iterate the map in place; they take a [`snapshot`] and
/// poll the counters outside of the lock, so a long grace period does not
/// hold up threads that are registering or leaving.
///
/// [`snapshot`]: Self::snapshot
pub struct Registry {
	entries: Spinlock<BTreeMap<ReaderId, Arc<CounterPair>>>,
	next_id: AtomicU64,
	capacity: Option<usize>,
}

impl Registry {
	pub const fn new(capacity: Option<usize>) -> Self {
		Self {
			entries: Spinlock::new(BTreeMap::new()),
			next_id: AtomicU64::new(0),
			capacity,
		}
	}

	/// Add a reader with both counters at zero.
	pub fn insert(&self) -> Result<(ReaderId, Arc<CounterPair>), Error> {
		let counters = Arc::new(CounterPair::new());

		self.entries.with(|entries| {
			if let Some(capacity) = self.capacity {
				if entries.len() >= capacity {
					return Err(Error::RegistryFull { capacity });
				}
			}

			let id = ReaderId(self.next_id.fetch_add(1, Ordering::Relaxed));
			entries.insert(id, Arc::clone(&counters));
			Ok((id, counters))
		})
	}

	/// Remove a reader. Its counters must already be idle.
	pub fn remove(&self, id: ReaderId) {
		let removed = self.entries.with(|entries| entries.remove(&id));
		debug_assert!(removed.is_some_and(|c| c.is_idle()));
	}

	/// The counters of every reader registered right now.
	pub fn snapshot(&self) -> Vec<Arc<CounterPair>> {
		self.entries.with(|entries| entries.values().cloned().collect())
	}

	/// Sum of slot `slot` over all registered readers.
	pub fn total(&self, slot: usize) -> usize {
		self.entries.with(|entries| {
			entries.values().map(|c| c.count(slot)).sum()
		})
	}

	pub fn len(&self) -> usize {
		self.entries.with(|entries| entries.len())
	}
}

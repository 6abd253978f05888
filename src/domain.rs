use core::fmt;
use core::marker::PhantomData;

use portable_atomic::{compiler_fence, fence, AtomicU64, AtomicUsize, Ordering};

use crate::registry::Registry;
use crate::spin::Spinlock;
use crate::stats::{Counters, Stats};
use crate::{Config, Error, Reader, Spin, Wait};

static NEXT_DOMAIN: AtomicU64 = AtomicU64::new(0);

/// Distinguishes independent [`Rcu`] domains from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DomainId(u64);

/// An RCU domain: the flip index, the grace-period lock and the registry
/// of reader counter pairs.
///
/// Readers [`register`] once per thread and then enter and leave read-side
/// critical sections through their [`Reader`] handle. Writers publish a new
/// version of the shared data and then call [`synchronize`] before they
/// reclaim the old one.
///
/// `W` selects how writers wait for readers to drain. See [`Wait`].
///
/// [`register`]: Self::register
/// [`synchronize`]: Self::synchronize
pub struct Rcu<W = Spin>
where
	W: Wait,
{
	/// The low bit selects the counter slot new readers increment.
	idx: AtomicUsize,
	/// Serializes writers. Readers never touch it.
	gp_lock: Spinlock<()>,
	registry: Registry,
	config: Config,
	stats: Counters,
	domain: DomainId,
	_wait: PhantomData<fn() -> W>,
}

impl<W> Rcu<W>
where
	W: Wait,
{
	/// Create a new domain with the default [`Config`].
	#[must_use]
	pub fn new() -> Self {
		Self::with_config(Config::new())
	}

	/// Create a new domain.
	#[must_use]
	pub fn with_config(config: Config) -> Self {
		Self {
			idx: AtomicUsize::new(0),
			gp_lock: Spinlock::new(()),
			registry: Registry::new(config.get_max_readers()),
			config,
			stats: Counters::new(),
			domain: DomainId(NEXT_DOMAIN.fetch_add(1, Ordering::Relaxed)),
			_wait: PhantomData,
		}
	}

	/// Register the calling thread as a reader.
	///
	/// The returned handle must stay on the thread that uses it for reading;
	/// it is `Send` so it can be created by a parent thread and moved into
	/// a worker, but it is not `Sync`.
	///
	/// # Errors
	///
	/// [`Error::RegistryFull`] if the domain was configured with
	/// [`Config::max_readers`] and that many readers are registered.
	pub fn register(&self) -> Result<Reader<'_, W>, Error> {
		let (id, counters) = self.registry.insert()?;
		log::debug!("rcu: registered reader {id}");
		Ok(Reader::new(self, id, counters))
	}

	/// Wait for a grace period.
	///
	/// When this function returns, every read-side critical section that
	/// was open when it was called has ended, and every critical section
	/// that begins afterwards observes whatever the caller published before
	/// calling it.
	///
	/// Concurrent callers share flips: a caller that finds that others have
	/// already flipped the index often enough since it arrived returns
	/// without flipping at all.
	///
	/// This function never fails, but it blocks for as long as any reader
	/// stays inside a critical section that must be waited for. Calling it
	/// from inside a read-side critical section of the same domain never
	/// returns; use [`Reader::synchronize`] to have that checked.
	pub fn synchronize(&self) {
		fence(Ordering::SeqCst);
		let oldctr = self.idx.load(Ordering::Relaxed);
		fence(Ordering::SeqCst);

		self.synchronize_from(oldctr);
	}

	/// The part of [`synchronize`] that runs after the flip index has been
	/// sampled as `oldctr`.
	///
	/// [`synchronize`]: Self::synchronize
	fn synchronize_from(&self, oldctr: usize) {
		self.gp_lock.with(|_| {
			let ctr = self.idx.load(Ordering::Relaxed);
			let elapsed = ctr.wrapping_sub(oldctr);

			if elapsed >= 3 {
				// At least two full flips happened since `oldctr`, so every
				// critical section that could predate this call is gone.
				log::trace!("rcu: sharing grace period ({oldctr} -> {ctr})");
				self.stats.shared();
				return;
			}

			// A reader may have sampled the index right before a flip and
			// incremented the stale slot right after it, so one flip is not
			// enough unless another writer already did one since `oldctr`.
			self.flip_counter_and_wait(ctr);
			if elapsed < 2 {
				self.flip_counter_and_wait(ctr.wrapping_add(1));
			}

			self.stats.grace_period();
			log::debug!(
				"rcu: grace period complete at index {}",
				self.idx.load(Ordering::Relaxed)
			);
		});

		fence(Ordering::SeqCst);
	}

	/// Advance the index past `ctr` and wait for every reader's slot of the
	/// old parity to drain.
	///
	/// Must be called with the grace-period lock held.
	fn flip_counter_and_wait(&self, ctr: usize) {
		self.idx.store(ctr.wrapping_add(1), Ordering::Relaxed);
		let i = ctr & 1;
		fence(Ordering::SeqCst);

		log::trace!("rcu: flipped index to {}, draining slot {i}", ctr.wrapping_add(1));
		self.stats.flip();

		// Readers registering after this snapshot already see the new
		// parity, so they need not be waited for.
		for counters in self.registry.snapshot() {
			let mut w = W::new(&self.config);
			while counters.count(i) != 0 {
				w.wait();
				compiler_fence(Ordering::SeqCst);
			}
		}

		fence(Ordering::SeqCst);
	}

	/// The current value of the flip index.
	#[must_use]
	pub fn flip_index(&self) -> usize {
		self.idx.load(Ordering::Relaxed)
	}

	/// Number of currently registered readers.
	#[must_use]
	pub fn readers(&self) -> usize {
		self.registry.len()
	}

	/// Number of open critical sections per counter slot, summed over all
	/// registered readers.
	///
	/// Only exact while no reader is entering or leaving a critical section.
	#[must_use]
	pub fn active_sections(&self) -> [usize; 2] {
		[self.registry.total(0), self.registry.total(1)]
	}

	/// Grace-period activity so far.
	#[must_use]
	pub fn stats(&self) -> Stats {
		self.stats.snapshot()
	}

	/// The configuration this domain was created with.
	#[must_use]
	pub const fn config(&self) -> &Config {
		&self.config
	}

	pub(crate) fn sample_slot(&self) -> usize {
		self.idx.load(Ordering::Relaxed) & 1
	}

	pub(crate) fn registry(&self) -> &Registry {
		&self.registry
	}

	pub(crate) const fn domain(&self) -> DomainId {
		self.domain
	}
}

impl<W: Wait> Default for Rcu<W> {
	fn default() -> Self {
		Self::new()
	}
}

impl<W: Wait> fmt::Debug for Rcu<W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Rcu")
			.field("flip_index", &self.flip_index())
			.field("readers", &self.readers())
			.field("writer_active", &self.gp_lock.is_locked())
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

#[cfg(all(test, feature = "std"))]
mod tests {
	use super::*;

	use std::sync::atomic::AtomicBool;
	use std::thread::{scope, sleep};
	use std::time::Duration;

	use proptest::prelude::*;

	use crate::Yield;

	type TestRcu = Rcu<Yield>;

	#[test]
	fn test_no_readers() {
		let rcu = TestRcu::new();

		rcu.synchronize();
		assert_eq!(rcu.flip_index(), 2);

		// Registered but idle readers do not hold anything up either.
		let _a = rcu.register().unwrap();
		let _b = rcu.register().unwrap();
		rcu.synchronize();
		assert_eq!(rcu.flip_index(), 4);

		let stats = rcu.stats();
		assert_eq!(rcu.active_sections(), [0, 0]);
		assert_eq!(stats.synchronizations, 2);
		assert_eq!(stats.grace_periods, 2);
		assert_eq!(stats.flips, 4);
	}

	#[test]
	fn test_waits_for_reader() {
		let rcu = TestRcu::new();
		let done = AtomicBool::new(false);

		let reader = rcu.register().unwrap();
		reader.read_lock();
		assert_eq!(rcu.registry().total(0), 1);

		scope(|scope| {
			scope.spawn(|| {
				rcu.synchronize();
				done.store(true, Ordering::SeqCst);
			});

			// The writer flips once and then waits on slot 0.
			while rcu.flip_index() != 1 {
				std::thread::yield_now();
			}
			sleep(Duration::from_millis(200));
			assert!(!done.load(Ordering::SeqCst));
			assert_eq!(rcu.flip_index(), 1);

			unsafe { reader.read_unlock() }.unwrap();
		});

		// Second flip: 1 -> 2, slot 1 was empty.
		assert!(done.load(Ordering::SeqCst));
		assert_eq!(rcu.flip_index(), 2);
		assert_eq!(rcu.stats().flips, 2);
	}

	#[test]
	fn test_late_reader_caught_by_second_flip() {
		let rcu = TestRcu::new();
		let old = rcu.register().unwrap();
		let new = rcu.register().unwrap();

		old.read_lock();

		scope(|scope| {
			let writer = scope.spawn(|| rcu.synchronize());

			while rcu.flip_index() != 1 {
				std::thread::yield_now();
			}

			// Enters under parity 1 while the writer drains parity 0.
			new.read_lock();
			assert_eq!(rcu.registry().total(1), 1);

			unsafe { old.read_unlock() }.unwrap();

			// The second flip drains parity 1, so `new` has to leave too.
			while rcu.flip_index() != 2 {
				std::thread::yield_now();
			}
			sleep(Duration::from_millis(100));
			assert!(!writer.is_finished());

			unsafe { new.read_unlock() }.unwrap();
		});

		assert_eq!(rcu.flip_index(), 2);
	}

	#[test]
	fn test_batching_arithmetic() {
		let rcu = TestRcu::new();

		// Every call below sampled the index before the first one ran.
		rcu.synchronize_from(0);
		assert_eq!(rcu.flip_index(), 2);

		// Two flips have happened since the sample, one more is needed.
		rcu.synchronize_from(0);
		assert_eq!(rcu.flip_index(), 3);

		// From here on everyone shares the flips already done.
		for _ in 0..10 {
			rcu.synchronize_from(0);
		}
		assert_eq!(rcu.flip_index(), 3);

		let stats = rcu.stats();
		assert_eq!(stats.flips, 3);
		assert_eq!(stats.grace_periods, 2);
		assert_eq!(stats.shared, 10);
		assert_eq!(stats.synchronizations, 12);
	}

	#[test]
	fn test_batching_single_flip() {
		let rcu = TestRcu::new();

		rcu.synchronize_from(0);

		// A caller that sampled between the two flips of another.
		rcu.synchronize_from(1);
		assert_eq!(rcu.flip_index(), 4);
	}

	#[test]
	fn test_index_wraps() {
		let rcu = TestRcu::new();
		rcu.idx.store(usize::MAX, Ordering::Relaxed);

		rcu.synchronize();
		assert_eq!(rcu.flip_index(), 1);

		// 1 - (MAX - 1) wraps around to 3.
		rcu.synchronize_from(usize::MAX - 1);
		assert_eq!(rcu.flip_index(), 1);
		assert_eq!(rcu.stats().shared, 1);
	}

	#[test]
	fn test_concurrent_writers() {
		const WRITERS: usize = 8;

		let rcu = TestRcu::new();
		let reader = rcu.register().unwrap();

		reader.read_lock();
		scope(|scope| {
			for _ in 0..WRITERS {
				scope.spawn(|| rcu.synchronize());
			}

			sleep(Duration::from_millis(100));
			unsafe { reader.read_unlock() }.unwrap();
		});

		// Every writer sampled 0 or 1 while the reader held up the first
		// one, so at most two of them flip and the rest share.
		let stats = rcu.stats();
		assert_eq!(stats.synchronizations, WRITERS as u64);
		assert!(stats.flips <= 4);
		assert!(stats.shared >= WRITERS as u64 - 2);
		assert_eq!(stats.flips, rcu.flip_index() as u64);
	}

	#[test]
	fn test_concurrent_writers_share_flips() {
		for writers in [2u64, 8] {
			let rcu = TestRcu::new();

			scope(|scope| {
				// Keep the writers at the grace-period lock until all of
				// them have sampled the index.
				rcu.gp_lock.with(|_| {
					for _ in 0..writers {
						scope.spawn(|| rcu.synchronize());
					}
					sleep(Duration::from_millis(200));
				});
			});

			// The first writer flips twice, the second once and everybody
			// else returns early.
			let stats = rcu.stats();
			assert_eq!(stats.synchronizations, writers);
			assert_eq!(stats.flips, 3);
			assert_eq!(stats.grace_periods, 2);
			assert_eq!(stats.shared, writers - 2);
			assert_eq!(rcu.flip_index(), 3);
		}
	}

	#[derive(Debug, Clone, Copy)]
	enum Op {
		Lock(usize),
		Unlock(usize),
		Flip,
	}

	fn op(readers: usize) -> impl Strategy<Value = Op> {
		prop_oneof![
			(0..readers).prop_map(Op::Lock),
			(0..readers).prop_map(Op::Unlock),
			Just(Op::Flip),
		]
	}

	proptest! {
		#[test]
		fn prop_counter_invariant(ops in proptest::collection::vec(op(4), 0..64)) {
			let rcu = TestRcu::new();
			let readers: Vec<_> =
				(0..4).map(|_| rcu.register().unwrap()).collect();

			// Per reader: the nesting depth and the parity its outermost
			// section started under.
			let mut model = [(0usize, 0usize); 4];

			for op in ops {
				match op {
					Op::Lock(r) => {
						if model[r].0 == 0 {
							model[r].1 = rcu.flip_index() & 1;
						}
						model[r].0 += 1;
						readers[r].read_lock();
					}
					Op::Unlock(r) => {
						let res = unsafe { readers[r].read_unlock() };
						if model[r].0 == 0 {
							prop_assert!(res.is_err());
						} else {
							prop_assert!(res.is_ok());
							model[r].0 -= 1;
						}
					}
					// Advance the index without waiting, as a writer
					// would right before draining.
					Op::Flip => {
						rcu.idx.fetch_add(1, Ordering::Relaxed);
					}
				}

				for slot in 0..2 {
					let expected = model
						.iter()
						.filter(|(depth, s)| *depth > 0 && *s == slot)
						.count();
					prop_assert_eq!(rcu.registry().total(slot), expected);
				}
			}

			for (reader, (depth, _)) in readers.iter().zip(model) {
				for _ in 0..depth {
					unsafe { reader.read_unlock() }.unwrap();
				}
			}
			rcu.synchronize();
		}
	}
}

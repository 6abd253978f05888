use portable_atomic::{AtomicUsize, Ordering};

const COUNT_MAX: usize = usize::MAX;

/// The pair of read-side counters owned by one registered reader.
///
/// Slot `i` counts the critical sections of the owner that began while the
/// flip index had parity `i`. Only the owner ever modifies its counters,
/// so a plain load followed by a store is enough; writers only read them.
#[derive(Debug)]
pub struct CounterPair {
	slots: [AtomicUsize; 2],
}

impl CounterPair {
	pub const fn new() -> Self {
		Self { slots: [AtomicUsize::new(0), AtomicUsize::new(0)] }
	}

	/// Get the count held in `slot`.
	pub fn count(&self, slot: usize) -> usize {
		self.slots[slot & 1].load(Ordering::Relaxed)
	}

	/// Whether both slots are zero.
	pub fn is_idle(&self) -> bool {
		self.count(0) == 0 && self.count(1) == 0
	}

	/// Increment `slot` by one.
	///
	/// # Safety
	///
	/// Must only be called by the thread owning this pair.
	pub unsafe fn enter(&self, slot: usize) {
		let slot = &self.slots[slot & 1];
		let n = slot.load(Ordering::Relaxed);

		if n == COUNT_MAX {
			panic_count_overflow();
		}

		slot.store(n + 1, Ordering::Relaxed);
	}

	/// Decrement `slot` by one.
	///
	/// # Safety
	///
	/// Must only be called by the thread owning this pair.
	pub unsafe fn exit(&self, slot: usize) {
		let slot = &self.slots[slot & 1];
		let n = slot.load(Ordering::Relaxed);

		if n == 0 {
			panic_count_underflow();
		}

		slot.store(n - 1, Ordering::Release);
	}
}

#[cold]
#[inline(never)]
fn panic_count_overflow() -> ! {
	panic!("read-side counter overflowed")
}

#[cold]
#[inline(never)]
fn panic_count_underflow() -> ! {
	panic!("read-side counter underflowed")
}

extern crate alloc;

use core::cell::Cell;
use core::fmt;

use alloc::sync::Arc;

use portable_atomic::{fence, Ordering};

use crate::counters::CounterPair;
use crate::domain::DomainId;
use crate::{Error, ReaderId, Rcu, Spin, Wait};

/// A thread's registration with an [`Rcu`] domain.
///
/// Entering a read-side critical section costs one load of the flip index,
/// one store to this reader's own counter and a fence. Nothing a reader
/// does ever waits on a writer.
///
/// Critical sections may nest. Only the outermost one is visible to
/// writers; the inner ones just bump a local depth.
///
/// Dropping the handle unregisters the reader.
pub struct Reader<'rcu, W = Spin>
where
	W: Wait,
{
	rcu: &'rcu Rcu<W>,
	id: ReaderId,
	counters: Arc<CounterPair>,
	/// Depth of the currently open critical sections.
	nesting: Cell<usize>,
	/// The counter slot the outermost open section incremented.
	slot: Cell<usize>,
}

impl<'rcu, W> Reader<'rcu, W>
where
	W: Wait,
{
	pub(crate) const fn new(
		rcu: &'rcu Rcu<W>,
		id: ReaderId,
		counters: Arc<CounterPair>,
	) -> Self {
		Self {
			rcu,
			id,
			counters,
			nesting: Cell::new(0),
			slot: Cell::new(0),
		}
	}

	/// Enter a read-side critical section.
	///
	/// Every call must be balanced by a [`read_unlock`]. Prefer [`lock`],
	/// which does that automatically.
	///
	/// [`read_unlock`]: Self::read_unlock
	/// [`lock`]: Self::lock
	pub fn read_lock(&self) {
		let nesting = self.nesting.get();

		if nesting == 0 {
			let slot = self.rcu.sample_slot();

			// SAFETY: `Reader` is not `Sync`, so this is the owning thread.
			unsafe { self.counters.enter(slot) };

			// The increment must be visible before anything protected is
			// loaded.
			fence(Ordering::SeqCst);
			self.slot.set(slot);
		}

		self.nesting.set(nesting + 1);
	}

	/// Leave a read-side critical section.
	///
	/// # Errors
	///
	/// [`Error::Unbalanced`] if no critical section is open.
	///
	/// # Safety
	///
	/// The call must be balanced by an earlier [`read_lock`] of this reader
	/// that has not been unlocked yet. In particular it must not end a
	/// section opened by [`lock`] while its [`ReadGuard`] is alive: once the
	/// outermost section ends, a writer may reclaim anything read through
	/// that guard.
	///
	/// [`read_lock`]: Self::read_lock
	/// [`lock`]: Self::lock
	pub unsafe fn read_unlock(&self) -> Result<(), Error> {
		let nesting = self.nesting.get();

		match nesting {
			0 => return Err(Error::Unbalanced { reader: self.id }),
			// SAFETY: see `read_lock`. The release store orders every
			// protected load of the section before the decrement.
			1 => unsafe { self.counters.exit(self.slot.get()) },
			_ => {}
		}

		self.nesting.set(nesting - 1);
		Ok(())
	}

	/// Enter a read-side critical section that lasts as long as the
	/// returned guard.
	pub fn lock(&self) -> ReadGuard<'_, W> {
		self.read_lock();
		ReadGuard { reader: self }
	}

	/// Wait for a grace period, refusing to do so from inside one of this
	/// reader's own critical sections.
	///
	/// # Errors
	///
	/// [`Error::InCriticalSection`] if this reader has a critical section
	/// open, as the grace period would then never end.
	pub fn synchronize(&self) -> Result<(), Error> {
		if self.in_critical_section() {
			return Err(Error::InCriticalSection { reader: self.id });
		}

		self.rcu.synchronize();
		Ok(())
	}

	/// Unregister this reader.
	///
	/// # Errors
	///
	/// [`Error::ReaderActive`] if critical sections were still open. They
	/// are closed on the reader's behalf before it leaves the registry, so
	/// writers do not wait on them forever.
	pub fn unregister(self) -> Result<(), Error> {
		self.close()
	}

	/// This reader's identifier.
	#[must_use]
	pub const fn id(&self) -> ReaderId {
		self.id
	}

	/// The domain this reader belongs to.
	#[must_use]
	pub const fn rcu(&self) -> &'rcu Rcu<W> {
		self.rcu
	}

	/// How many critical sections are currently open.
	#[must_use]
	pub fn nesting(&self) -> usize {
		self.nesting.get()
	}

	/// Whether a critical section is currently open.
	#[must_use]
	pub fn in_critical_section(&self) -> bool {
		self.nesting.get() != 0
	}

	fn close(&self) -> Result<(), Error> {
		let nesting = self.nesting.replace(0);
		if nesting == 0 {
			return Ok(());
		}

		// SAFETY: see `read_lock`.
		unsafe { self.counters.exit(self.slot.get()) };
		Err(Error::ReaderActive { reader: self.id, nesting })
	}
}

impl<W: Wait> Drop for Reader<'_, W> {
	fn drop(&mut self) {
		if let Err(e) = self.close() {
			log::warn!("rcu: {e}");
		}

		self.rcu.registry().remove(self.id);
		log::debug!("rcu: unregistered reader {}", self.id);
	}
}

impl<W: Wait> fmt::Debug for Reader<'_, W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Reader")
			.field("id", &self.id)
			.field("nesting", &self.nesting.get())
			.finish_non_exhaustive()
	}
}

/// The RAII guard returned by [`Reader::lock`].
///
/// The critical section ends when the guard is dropped.
pub struct ReadGuard<'a, W = Spin>
where
	W: Wait,
{
	reader: &'a Reader<'a, W>,
}

impl<'a, W> ReadGuard<'a, W>
where
	W: Wait,
{
	/// The reader that opened this critical section.
	#[must_use]
	pub const fn reader(&self) -> &'a Reader<'a, W> {
		self.reader
	}

	pub(crate) const fn domain(&self) -> DomainId {
		self.reader.rcu.domain()
	}
}

impl<W: Wait> Drop for ReadGuard<'_, W> {
	fn drop(&mut self) {
		// SAFETY: the guard owns the section opened in `Reader::lock`.
		if let Err(e) = unsafe { self.reader.read_unlock() } {
			log::warn!("rcu: {e}");
		}
	}
}

impl<W: Wait> fmt::Debug for ReadGuard<'_, W> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReadGuard").field("reader", &self.reader.id).finish()
	}
}

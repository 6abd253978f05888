use core::cell::UnsafeCell;

use portable_atomic::{AtomicBool, Ordering};

/// A lock that can be acquired by only one thread at a time.
///
/// Used both as the grace-period lock and to guard the reader registry.
/// Holders are expected to keep it for a short, bounded amount of work,
/// with the exception of the grace-period lock which spans a full
/// flip-and-wait.
pub struct Spinlock<T> {
	locked: AtomicBool,
	data: UnsafeCell<T>,
}

impl<T> Spinlock<T> {
	pub const fn new(data: T) -> Self {
		Self { locked: AtomicBool::new(false), data: UnsafeCell::new(data) }
	}

	fn lock(&self) {
		while self
			.locked
			.compare_exchange_weak(
				false,
				true,
				Ordering::Acquire,
				Ordering::Relaxed,
			)
			.is_err()
		{
			// Wait on a plain load so the cache line is not bounced around.
			while self.locked.load(Ordering::Relaxed) {
				core::hint::spin_loop();
			}
		}
	}

	fn unlock(&self) {
		self.locked.store(false, Ordering::Release);
	}

	/// Run `f` with exclusive access to the protected data.
	pub fn with<O>(&self, f: impl FnOnce(&mut T) -> O) -> O {
		self.lock();
		let _unlock = Unlock(self);

		// SAFETY: the lock is held until `_unlock` is dropped, so no other
		// reference to `data` exists.
		f(unsafe { &mut *self.data.get() })
	}

	/// Whether some thread currently holds the lock.
	pub fn is_locked(&self) -> bool {
		self.locked.load(Ordering::Relaxed)
	}
}

unsafe impl<T: Send> Sync for Spinlock<T> {}
unsafe impl<T: Send> Send for Spinlock<T> {}

/// Releases the lock even if the closure passed to [`Spinlock::with`]
/// panics.
struct Unlock<'a, T>(&'a Spinlock<T>);

impl<T> Drop for Unlock<'_, T> {
	fn drop(&mut self) {
		self.0.unlock();
	}
}

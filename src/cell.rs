extern crate alloc;

use core::fmt;

use alloc::boxed::Box;

use portable_atomic::{AtomicPtr, Ordering};

use crate::domain::DomainId;
use crate::{ReadGuard, Rcu, Wait};

/// A heap-allocated value that readers of one [`Rcu`] domain can load
/// without locking and writers can replace.
///
/// This is the pointer-publishing half of RCU: [`read`] is
/// `rcu_dereference` and [`publish`] is `rcu_assign_pointer` followed by a
/// grace period. The old value is handed back to the caller, who decides
/// when to drop it.
///
/// [`read`]: Self::read
/// [`publish`]: Self::publish
pub struct RcuCell<T> {
	ptr: AtomicPtr<T>,
	domain: DomainId,
}

impl<T> RcuCell<T> {
	/// Create a new [`RcuCell`] with an initial value of `data`, readable
	/// from critical sections of `rcu`.
	pub fn new<W: Wait>(rcu: &Rcu<W>, data: T) -> Self {
		Self {
			ptr: AtomicPtr::new(into_owned_ptr(data)),
			domain: rcu.domain(),
		}
	}

	/// Get the current value.
	///
	/// The reference lives as long as the critical section it was loaded
	/// in. If the value is [`publish`]ed while the guard is live, the
	/// reference keeps pointing at the old value, which stays valid until
	/// the guard is dropped.
	///
	/// This function does _not_ block execution.
	///
	/// # Panics
	///
	/// If `guard` belongs to another domain than this cell.
	///
	/// [`publish`]: Self::publish
	pub fn read<'a, W: Wait>(&'a self, guard: &'a ReadGuard<'_, W>) -> &'a T {
		assert_eq!(
			guard.domain(),
			self.domain,
			"read-side critical section of another domain"
		);

		// SAFETY: the pointer is only freed by `publish` after a grace
		// period, and `guard` holds one open.
		unsafe { &*self.ptr.load(Ordering::Acquire) }
	}

	/// Replace the value and return the old one.
	///
	/// The new value is visible to critical sections that begin before
	/// [`publish`] returns. This function _will_ block until every critical
	/// section that might still be reading the old value has ended, so it
	/// must not be called from inside a critical section of the same
	/// domain.
	///
	/// # Panics
	///
	/// If `rcu` is not the domain this cell was created for.
	///
	/// [`publish`]: Self::publish
	pub fn publish<W: Wait>(&self, rcu: &Rcu<W>, new: T) -> T {
		assert_eq!(rcu.domain(), self.domain, "cell of another domain");

		let new_ptr = into_owned_ptr(new);
		let old_ptr = self.ptr.swap(new_ptr, Ordering::AcqRel);
		// Any new critical section past this point reads the new value.

		rcu.synchronize();

		// SAFETY: nobody can reference the old value after a grace period,
		// and the swap made us its only owner.
		unsafe { from_owned_ptr(old_ptr) }
	}

	/// Get a mutable reference to the value. No reader can hold a reference
	/// while the cell is borrowed mutably.
	pub fn get_mut(&mut self) -> &mut T {
		// SAFETY: exclusive borrow of the cell.
		unsafe { &mut *self.ptr.load(Ordering::Relaxed) }
	}

	/// Consume the cell and return the value.
	pub fn into_inner(self) -> T {
		let ptr = self.ptr.load(Ordering::Relaxed);
		core::mem::forget(self);

		// SAFETY: the cell owned the pointer and has been forgotten.
		unsafe { from_owned_ptr(ptr) }
	}
}

impl<T> Drop for RcuCell<T> {
	fn drop(&mut self) {
		/* We must not forget to call `T`'s drop code when the cell is
		 * actually dropped.
		 */
		let ptr = self.ptr.load(Ordering::Relaxed);
		drop(unsafe { from_owned_ptr(ptr) });
	}
}

impl<T> fmt::Debug for RcuCell<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RcuCell").finish_non_exhaustive()
	}
}

unsafe impl<T: Send + Sync> Sync for RcuCell<T> {}
unsafe impl<T: Send> Send for RcuCell<T> {}

fn into_owned_ptr<T>(data: T) -> *mut T {
	Box::into_raw(Box::new(data))
}

unsafe fn from_owned_ptr<T>(ptr: *mut T) -> T {
	*unsafe { Box::from_raw(ptr) }
}

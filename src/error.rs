use crate::ReaderId;

/// Misuse of the read-side API or the reader registry.
///
/// The grace-period protocol itself cannot fail: [`Rcu::synchronize`]
/// either returns or, if some reader never leaves its critical section,
/// waits forever.
///
/// [`Rcu::synchronize`]: crate::Rcu::synchronize
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// The domain already has as many registered readers as it was
	/// configured to allow.
	#[error("the reader registry is full ({capacity} readers)")]
	RegistryFull {
		/// The configured limit.
		capacity: usize,
	},
	/// `read_unlock` was called without a matching `read_lock`.
	#[error("reader {reader} is not inside a read-side critical section")]
	Unbalanced {
		/// The offending reader.
		reader: ReaderId,
	},
	/// A grace period was requested from inside the caller's own read-side
	/// critical section, which would never complete.
	#[error("reader {reader} cannot wait for a grace period inside its own critical section")]
	InCriticalSection {
		/// The offending reader.
		reader: ReaderId,
	},
	/// A reader was unregistered while still inside a critical section.
	#[error("reader {reader} was unregistered with {nesting} open critical section(s)")]
	ReaderActive {
		/// The offending reader.
		reader: ReaderId,
		/// How deeply nested the reader was.
		nesting: usize,
	},
}

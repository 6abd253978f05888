use super::Wait;
use crate::Config;

/// A [`Wait`] strategy that spins in place.
///
/// This is the only strategy available without `std`. It never gives up
/// the CPU, which is the right call when readers are known to be short
/// and every reader has a core of its own.
pub struct Spin;

impl Wait for Spin {
	fn new(_: &Config) -> Self {
		Self
	}

	fn wait(&mut self) {
		core::hint::spin_loop();
	}
}

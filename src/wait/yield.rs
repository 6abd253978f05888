use super::Wait;
use crate::Config;

/// A [`Wait`] strategy that spins for a while and then yields to the OS
/// scheduler.
pub struct Yield {
	spins_left: u32,
}

impl Wait for Yield {
	fn new(config: &Config) -> Self {
		Self { spins_left: config.get_spin_limit() }
	}

	fn wait(&mut self) {
		if self.spins_left > 0 {
			self.spins_left -= 1;
			core::hint::spin_loop();
		} else {
			std::thread::yield_now();
		}
	}
}

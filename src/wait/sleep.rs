use super::Wait;
use crate::Config;

use std::time::Duration;

/// A [`Wait`] strategy that spins, then yields, and finally naps for
/// [`Config::sleep_interval`] between polls.
///
/// Suited to readers that may be preempted or hold their critical sections
/// for a long time, where a spinning writer would only steal their CPU.
pub struct Sleep {
	spins_left: u32,
	yields_left: u32,
	interval: Duration,
}

impl Wait for Sleep {
	fn new(config: &Config) -> Self {
		Self {
			spins_left: config.get_spin_limit(),
			yields_left: config.get_spin_limit(),
			interval: config.get_sleep_interval(),
		}
	}

	fn wait(&mut self) {
		if self.spins_left > 0 {
			self.spins_left -= 1;
			core::hint::spin_loop();
		} else if self.yields_left > 0 {
			self.yields_left -= 1;
			std::thread::yield_now();
		} else {
			std::thread::sleep(self.interval);
		}
	}
}

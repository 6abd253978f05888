use crate::cfg::cfg_std;
use crate::Config;

/// How a writer passes the time while a reader's counter drains.
///
/// A fresh value is created for every counter a writer waits on, and
/// [`wait`] is called once per poll that still found the counter non-zero.
/// Implementations only ever delay; nothing wakes a waiting writer except
/// its next poll, so readers never pay for a wake-up.
///
/// [`wait`]: Self::wait
pub trait Wait: Sized {
	/// Create a new [`Wait`] state for one drain.
	fn new(config: &Config) -> Self;

	/// Delay before the next poll.
	///
	/// This function must eventually return; it is called in a loop until
	/// the counter reaches zero.
	fn wait(&mut self);
}

mod spin;
cfg_std! {
	mod sleep;
	mod r#yield;
}

pub use self::spin::Spin;
cfg_std! {
	pub use self::r#yield::Yield;
	pub use self::sleep::Sleep;
}

#[cfg(all(test, feature = "std"))]
mod tests {
	use super::*;

	use core::sync::atomic::{AtomicBool, Ordering};
	use std::thread::{scope, sleep};
	use std::time::{Duration, Instant};

	fn time<F>(f: F) -> Duration
	where
		F: FnOnce(),
	{
		let start = Instant::now();
		f();
		start.elapsed()
	}

	fn test_drain<W: Wait>() {
		// Quarter second precision is horrible but good enough for this test
		const EPSILON: Duration = Duration::new(0, 250 * 1_000_000);

		const EXPECTED: Duration = Duration::new(1, 0);

		let config = Config::new()
			.spin_limit(16)
			.sleep_interval(Duration::from_millis(5));
		let drained = AtomicBool::new(false);

		scope(|scope| {
			scope.spawn(|| {
				sleep(EXPECTED);
				drained.store(true, Ordering::Relaxed);
			});

			let t = time(|| {
				let mut w = W::new(&config);
				while !drained.load(Ordering::Relaxed) {
					w.wait();
				}
			});

			assert!(
				f64::abs(EXPECTED.as_secs_f64() - t.as_secs_f64())
					< EPSILON.as_secs_f64()
			);
		});
	}

	fn test_bounded<W: Wait>() {
		let config = Config::new()
			.spin_limit(4)
			.sleep_interval(Duration::from_millis(1));

		let t = time(|| {
			let mut w = W::new(&config);
			for _ in 0..100 {
				w.wait();
			}
		});

		// Every single poll delay is bounded, so a hundred of them are too.
		assert!(t < Duration::from_secs(1));
	}

	macro_rules! test_implementations {
		(@impl, $test_fn:ident) => {
			$test_fn::<Spin>();
			$test_fn::<Yield>();
			$test_fn::<Sleep>();
		};
		($(
			$test_fn:ident => $test_fn_impl:ident,
		)*) => {
			$(
				#[test]
				fn $test_fn_impl() {
					test_implementations! { @impl, $test_fn }
				}
			)*
		};
	}

	test_implementations! {
		test_drain => test_drain_impl,
		test_bounded => test_bounded_impl,
	}
}

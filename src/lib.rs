//! User-space Read-Copy-Update built on per-thread pairs of reference
//! counters, with grace periods shared between concurrent writers.
//!
//! Readers enter and leave read-side critical sections without taking any
//! lock and without a single atomic read-modify-write. Writers publish a
//! new version of some shared data, call [`Rcu::synchronize`], and only then
//! reclaim the old version. A better explanation of RCU in general is
//! available at the [kernel docs](https://www.kernel.org/doc/html/latest/RCU/whatisRCU.html).
//!
//! Every registered [`Reader`] owns two counters. A global flip index
//! decides, through its low bit, which of the two a reader increments when
//! it enters a critical section; the reader decrements the same one when it
//! leaves. To wait for a grace period, a writer flips the index so that new
//! readers move over to the other counter, and then polls every reader's
//! old counter until it drains. A reader can sample the index right before
//! a flip and increment the stale counter right after the writer looked at
//! it, so a writer flips and drains twice. A writer that finds that others
//! have already flipped often enough since it arrived shares their work
//! instead of doing its own.
//!
//! Reclaiming memory is the caller's business: nothing here frees anything
//! on its own. [`RcuCell`] is a small helper for the common case of a single
//! published pointer.
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//!
//! type Rcu = rcpls::Rcu<rcpls::Yield>;
//!
//! #[derive(Debug, Clone, PartialEq, Eq)]
//! struct User {
//!     uid: i32,
//!     gid: i32,
//! }
//!
//! let rcu = Rcu::new();
//! let user = rcpls::RcuCell::new(&rcu, User { uid: 0, gid: 0 });
//!
//! thread::scope(|scope| {
//!     for _ in 0..4 {
//!         scope.spawn(|| {
//!             let reader = rcu.register().unwrap();
//!             for _ in 0..1000 {
//!                 let guard = reader.lock();
//!                 let user = user.read(&guard);
//!                 assert_eq!(user.uid, user.gid);
//!             }
//!         });
//!     }
//!
//!     // Blocks until no reader can still see uid 0.
//!     let old = user.publish(&rcu, User { uid: 1000, gid: 1000 });
//!     assert_eq!(old.uid, 0);
//! });
//! ```
#![deny(missing_docs)]
#![warn(
	clippy::all,
	clippy::correctness,
	clippy::pedantic,
	clippy::cargo,
	clippy::nursery,
	clippy::perf,
	clippy::style
)]
#![allow(
	clippy::missing_panics_doc,
	clippy::significant_drop_tightening,
	clippy::needless_lifetimes,
	clippy::module_name_repetitions
)]
#![cfg_attr(not(feature = "std"), no_std)]

mod cfg;

mod cell;
mod config;
mod counters;
mod domain;
mod error;
mod reader;
mod registry;
mod spin;
mod stats;
mod wait;

#[doc(inline)]
pub use self::wait::*;

#[doc(inline)]
pub use self::cell::RcuCell;
pub use self::config::Config;
pub use self::domain::Rcu;
pub use self::error::Error;
pub use self::reader::{ReadGuard, Reader};
pub use self::registry::ReaderId;
pub use self::stats::Stats;

//! # lww-dict
//!
//! A last-writer-wins element dictionary: a key-value CRDT for replicas that
//! accept writes independently and reconcile later.
//!
//! A CRDT (Conflict-free Replicated Data Type) is a data structure that can be
//! replicated across multiple devices and updated independently. When replicas
//! are merged, they are guaranteed to converge to the same state without
//! requiring coordination or consensus.
//!
//! ## Quick Start
//!
//! ```
//! use lww_dict::clock::LogicalClock;
//! use lww_dict::prelude::*;
//!
//! let clock = LogicalClock::new();
//!
//! let mut laptop = LWWDictionary::new(&clock);
//! laptop.add("theme", "dark");
//!
//! let mut phone = LWWDictionary::new(&clock);
//! phone.add("theme", "light"); // later write
//! phone.add("font", "mono");
//!
//! laptop.merge(&phone);
//! assert_eq!(laptop.get("theme"), Some(&"light"));
//! assert_eq!(laptop.len(), 2);
//! ```
//!
//! ## How it resolves conflicts
//!
//! Each replica keeps two logs, one of additions and one of removals
//! (tombstones), each holding the newest timestamped entry per key.
//! A key is present when its latest add is not older than its latest remove,
//! so an add and a remove with the same timestamp leave the key present.
//! Merge takes, per key and per log, whichever entry has the greater
//! timestamp.
//!
//! ## Timestamps
//!
//! Time is injected: every dictionary is built with a
//! [`TimestampSource`](clock::TimestampSource). See the [`clock`] module for
//! the bundled sources, including a steppable [`ManualClock`](clock::ManualClock)
//! for tests and a [`HybridClock`](clock::HybridClock) whose node id makes
//! timestamps unique across replicas.
//!
//! ## Traits
//!
//! - [`Crdt`]: state-based merge
//! - [`DeltaCrdt`]: ship only what the peer is missing
//! - [`events::OpCrdt`]: replay individual timestamped operations
//!
//! ## Logging
//!
//! Mutations and merges emit [`tracing`] events at `trace` and `debug`
//! level. Install a subscriber to see them.

#![warn(missing_docs)]

mod crdt;
mod error;
mod lww_dict;
mod timed;
#[cfg(feature = "wasm")]
mod wasm;

pub mod clock;
pub mod events;
pub mod prelude;

pub use crdt::{Crdt, DeltaCrdt};
pub use error::{Error, Result};
pub use lww_dict::{DictOp, LWWDictionary, LWWDictionaryDelta};
pub use timed::{Payload, TimedValue};

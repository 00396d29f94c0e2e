//! idlewatch core library.
//!
//! The binary in `main.rs` is a thin shell around these modules:
//!
//! - [`config`]: watch rules and global settings from a sectioned
//!   key=value file
//! - [`matcher`]: two-pass matching of process argument vectors against
//!   the rules
//! - [`snapshot`]: point-in-time resource captures and deltas
//! - [`store`]: persistence of snapshots between invocations
//! - [`engine`]: the verdict state machine
//! - [`procs`]: /proc enumeration (the only OS-specific part)
//!
//! Everything is synchronous; one invocation does a single sample, diff and
//! decision pass and exits.

pub mod cli;
pub mod config;
pub mod engine;
pub mod logging;
pub mod matcher;
pub mod paths;
pub mod procs;
pub mod snapshot;
pub mod store;

//! # Abacus
//!
//! An approximate frequency-counting engine for high-cardinality event
//! streams, executed atomically against a shared key-value store.
//!
//! Abacus answers two questions cheaply in sublinear space: "how many
//! times has item X been observed?" and "what are the top-N
//! most-observed items?" Each sketch counts exactly in a
//! capacity-bounded index until it fills, then spills into a Count-Min
//! matrix with conservative updates. Estimates are exact for indexed
//! items and overcount-only for everything else, with error bounded by
//! `total / width` at confidence `1 - (1/2)^depth`.
//!
//! ## Example
//!
//! ```
//! use abacus::{CommandExecutor, Db, Key, Reply};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let exec = CommandExecutor::new(Arc::new(Db::new()));
//!
//! // One sketch = three store keys: configuration, index, matrix.
//! let keys = ["pages:cfg", "pages:idx", "pages:mat"].map(Key::from);
//!
//! let reply = exec.execute(
//!     &keys,
//!     &["INCR", "5", "64", "50", "1", "home", "2", "search"].map(Bytes::from),
//! )?;
//! assert_eq!(reply, Reply::Counts(vec![vec![1, 2]]));
//!
//! let reply = exec.execute(&keys, &["ESTIMATE", "search"].map(Bytes::from))?;
//! assert_eq!(reply, Reply::Estimates(vec![vec!["2".to_string()]]));
//! # Ok::<(), abacus::Error>(())
//! ```

#![warn(
    clippy::all,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_lifetimes,
    unused_qualifications,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

// ─────────────────────────────────────────────────────────────────────────────
// Modules
// ─────────────────────────────────────────────────────────────────────────────

/// Command parsing and execution layer.
pub mod commands;
/// Error types and result aliases.
pub mod error;
/// The counting engine: configuration, coordinates, estimator, ranking.
pub mod sketch;
/// In-memory key-value store with whole-invocation atomicity.
pub mod storage;
/// Core data structures.
pub mod types;

// ─────────────────────────────────────────────────────────────────────────────
// Common Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use commands::{Batch, Command, CommandExecutor, Reply};
pub use error::{CommandError, Error, Result, StoreError};
pub use sketch::{Sketch, SketchConfig};
pub use storage::Db;
pub use types::{Count, Key};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Store keys addressed per sketch: configuration, index, matrix.
pub const KEYS_PER_SKETCH: usize = 3;

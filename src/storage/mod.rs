//! In-memory store backing the counting engine.
//!
//! Provides exactly the primitives the engine needs from its host store:
//! a configuration slot, a count-ordered index, and a sparse cell matrix
//! per sketch, behind a lock that makes whole invocations atomic.

mod db;

pub use db::{Db, Keyspace, Value};

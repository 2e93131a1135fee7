//! Core data structures backing the store.

mod cell_map;
mod key;
mod score_index;

pub use cell_map::{Cell, CellMap};
pub use key::Key;
pub use score_index::{IndexEntry, ScoreIndex};

/// Counter type used throughout the engine.
///
/// Counts never decrease and use saturating arithmetic; wrap-around is
/// never observable.
pub type Count = u64;

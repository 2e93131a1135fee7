//! The hybrid exact/approximate counting engine.
//!
//! A sketch counts items exactly in a capacity-bounded index for as long
//! as it can, then spills into a Count-Min matrix with conservative
//! updates once the index fills. Estimates are exact for indexed items
//! and one-sided (overcount only) for everything else.

mod config;
mod coords;
mod estimator;
mod ranking;

pub use config::SketchConfig;
pub use coords::{cell_for_row, coordinates};
pub use estimator::Sketch;
pub use ranking::ranked;

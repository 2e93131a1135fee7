//! Per-sketch configuration.

use crate::error::{CommandError, Result};
use crate::storage::Keyspace;
use crate::types::Key;
use tracing::debug;

/// Immutable parameters of one sketch.
///
/// Created on the first write to a sketch identity and never changed
/// afterwards. `capacity = 0` disables the exact index entirely; the
/// sketch counts through the matrix from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SketchConfig {
    /// Number of hash rows
    pub depth: u32,
    /// Columns per row
    pub width: u32,
    /// Maximum members held exactly in the index
    pub capacity: u64,
}

impl SketchConfig {
    /// Validate and build a configuration.
    pub fn new(depth: u32, width: u32, capacity: u64) -> Result<Self> {
        if depth == 0 || width == 0 {
            return Err(CommandError::ZeroDimension.into());
        }
        Ok(Self {
            depth,
            width,
            capacity,
        })
    }

    /// Load the configuration of a sketch identity, if it exists.
    ///
    /// Read-only callers treat `None` as an empty sketch; loading never
    /// creates anything.
    pub fn load(ks: &Keyspace, key: &Key) -> Result<Option<Self>> {
        Ok(ks.config(key)?.copied())
    }

    /// Persist a configuration for a previously unseen sketch identity.
    pub fn create(ks: &mut Keyspace, key: &Key, cfg: Self) -> Result<()> {
        ks.create_config(key, cfg)?;
        debug!(
            key = %key,
            depth = cfg.depth,
            width = cfg.width,
            capacity = cfg.capacity,
            "sketch configuration created"
        );
        Ok(())
    }

    /// True when the exact index is disabled and every count flows
    /// through the matrix.
    #[inline]
    pub fn matrix_only(&self) -> bool {
        self.capacity == 0
    }
}

//! Keyspace and lock layer.
//!
//! The engine runs every command invocation against a single lock guard:
//! exclusive for writes, shared for reads. Validation completes before
//! the guard is taken, so an aborted invocation touches nothing and no
//! other caller ever observes a half-applied batch.

use crate::error::{Result, StoreError};
use crate::sketch::SketchConfig;
use crate::types::{CellMap, Key, ScoreIndex};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// A stored value: one of the three shapes the engine persists.
#[derive(Debug, Clone)]
pub enum Value {
    /// Immutable per-sketch parameters
    Config(SketchConfig),
    /// Exact count-ordered member index
    Index(ScoreIndex),
    /// Sparse counter matrix
    Matrix(CellMap),
}

/// The raw key-value map one command invocation operates on.
///
/// Accessing a key that holds a different shape than requested is a
/// [`StoreError::WrongType`].
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<Key, Value>,
}

impl Keyspace {
    /// Create a new empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load the configuration stored at `key`, if any.
    pub fn config(&self, key: &Key) -> Result<Option<&SketchConfig>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Config(cfg)) => Ok(Some(cfg)),
            Some(_) => Err(StoreError::WrongType.into()),
        }
    }

    /// Persist a configuration at `key` unless one already exists.
    ///
    /// An existing configuration is left untouched; sketch parameters are
    /// immutable for the lifetime of the identity.
    pub fn create_config(&mut self, key: &Key, cfg: SketchConfig) -> Result<()> {
        match self.entries.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(Value::Config(cfg));
                Ok(())
            }
            Entry::Occupied(slot) => match slot.get() {
                Value::Config(_) => Ok(()),
                _ => Err(StoreError::WrongType.into()),
            },
        }
    }

    /// The index stored at `key`, if any.
    pub fn index(&self, key: &Key) -> Result<Option<&ScoreIndex>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Index(index)) => Ok(Some(index)),
            Some(_) => Err(StoreError::WrongType.into()),
        }
    }

    /// Mutable access to the index at `key`, creating it empty if absent.
    pub fn index_mut(&mut self, key: &Key) -> Result<&mut ScoreIndex> {
        let value = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Value::Index(ScoreIndex::new()));
        match value {
            Value::Index(index) => Ok(index),
            _ => Err(StoreError::WrongType.into()),
        }
    }

    /// The matrix stored at `key`, if any.
    pub fn matrix(&self, key: &Key) -> Result<Option<&CellMap>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Matrix(matrix)) => Ok(Some(matrix)),
            Some(_) => Err(StoreError::WrongType.into()),
        }
    }

    /// Mutable access to the matrix at `key`, creating it empty if absent.
    pub fn matrix_mut(&mut self, key: &Key) -> Result<&mut CellMap> {
        let value = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Value::Matrix(CellMap::new()));
        match value {
            Value::Matrix(matrix) => Ok(matrix),
            _ => Err(StoreError::WrongType.into()),
        }
    }
}

/// Thread-safe store handle.
///
/// Wraps the keyspace in a single `RwLock`; holding one guard across an
/// entire invocation is what gives a batch its atomic, non-interleaved
/// execution.
#[derive(Debug, Default)]
pub struct Db {
    keyspace: RwLock<Keyspace>,
}

impl Db {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access for read-only invocations.
    pub fn read(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.keyspace.read()
    }

    /// Exclusive access for mutating invocations.
    pub fn write(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.keyspace.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_create_once() {
        let mut ks = Keyspace::new();
        let key = Key::from("s:cfg");
        let first = SketchConfig::new(4, 32, 10).unwrap();
        let second = SketchConfig::new(9, 99, 99).unwrap();

        ks.create_config(&key, first).unwrap();
        ks.create_config(&key, second).unwrap();

        assert_eq!(ks.config(&key).unwrap(), Some(&first));
    }

    #[test]
    fn test_wrong_type() {
        let mut ks = Keyspace::new();
        let key = Key::from("s:idx");
        ks.index_mut(&key).unwrap();

        assert!(ks.config(&key).is_err());
        assert!(ks.matrix(&key).is_err());
        assert!(ks.matrix_mut(&key).is_err());
    }

    #[test]
    fn test_index_mut_creates() {
        let mut ks = Keyspace::new();
        let key = Key::from("s:idx");
        assert!(ks.index(&key).unwrap().is_none());

        ks.index_mut(&key).unwrap().incr(bytes::Bytes::from("a"), 1);
        assert_eq!(ks.index(&key).unwrap().map(ScoreIndex::len), Some(1));
    }
}

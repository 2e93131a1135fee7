//! The frequency estimator.
//!
//! Each sketch counts exactly in its index until the index would reach
//! capacity, then promotes the index into the matrix and counts
//! approximately from there on. The transition is one-way. Matrix
//! updates are conservative: a cell is only ever raised to the item's
//! new best estimate, never blindly added to, which keeps collision
//! error from compounding across repeated increments of the same item.

use crate::sketch::{coordinates, SketchConfig};
use crate::storage::Keyspace;
use crate::types::{Count, IndexEntry, Key};
use crate::Result;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Handle over one sketch: its configuration plus the index and matrix
/// keys it lives under. All state is read and written through the
/// keyspace passed to each call.
#[derive(Debug)]
pub struct Sketch<'a> {
    config: SketchConfig,
    index_key: &'a Key,
    matrix_key: &'a Key,
}

impl<'a> Sketch<'a> {
    /// Build a handle for a sketch whose configuration is already known.
    pub fn new(config: SketchConfig, index_key: &'a Key, matrix_key: &'a Key) -> Self {
        Self {
            config,
            index_key,
            matrix_key,
        }
    }

    /// This sketch's configuration.
    #[inline]
    pub fn config(&self) -> SketchConfig {
        self.config
    }

    pub(crate) fn index_key(&self) -> &Key {
        self.index_key
    }

    /// Estimate the count of `item`.
    ///
    /// An indexed item's count is exact; anything else reads the minimum
    /// of the item's matrix cells, which can only overcount. An item the
    /// sketch has never seen estimates to 0 unless it collides in every
    /// row.
    pub fn estimate(&self, ks: &Keyspace, item: &[u8]) -> Result<Count> {
        if let Some(index) = ks.index(self.index_key)? {
            if let Some(count) = index.count(item) {
                return Ok(count);
            }
        }
        self.matrix_estimate(ks, item)
    }

    /// Minimum of the item's matrix cells; 0 while no matrix exists.
    fn matrix_estimate(&self, ks: &Keyspace, item: &[u8]) -> Result<Count> {
        let Some(matrix) = ks.matrix(self.matrix_key)? else {
            return Ok(0);
        };
        Ok(coordinates(item, self.config.depth, self.config.width)
            .map(|cell| matrix.get(cell))
            .min()
            .unwrap_or(0))
    }

    /// Apply a batch of `(item, delta)` increments in input order and
    /// return the post-increment count for each batch position.
    ///
    /// Deltas are validated positive at the command boundary; this
    /// method assumes it.
    pub fn increment(&self, ks: &mut Keyspace, batch: &[(Bytes, Count)]) -> Result<Vec<Count>> {
        let index_len = ks.index(self.index_key)?.map_or(0, |ix| ix.len() as u64);
        if !self.config.matrix_only() && index_len < self.config.capacity {
            self.increment_exact(ks, batch)
        } else {
            self.increment_matrix(ks, batch)
        }
    }

    /// Index-only phase: every item is counted exactly. If the batch
    /// pushed the index to capacity, promote it into the matrix.
    fn increment_exact(&self, ks: &mut Keyspace, batch: &[(Bytes, Count)]) -> Result<Vec<Count>> {
        let mut results = Vec::with_capacity(batch.len());
        {
            let index = ks.index_mut(self.index_key)?;
            for (item, delta) in batch {
                results.push(index.incr(item.clone(), *delta));
            }
        }

        let index_len = ks.index(self.index_key)?.map_or(0, |ix| ix.len() as u64);
        if index_len >= self.config.capacity {
            self.promote(ks)?;
        }
        Ok(results)
    }

    /// One-time index → matrix transition: fold every indexed member
    /// into its cells (never lowering any), then cut the index back to
    /// capacity.
    fn promote(&self, ks: &mut Keyspace) -> Result<()> {
        let members: Vec<IndexEntry> = ks
            .index(self.index_key)?
            .map(|ix| ix.iter_ascending().collect())
            .unwrap_or_default();

        let matrix = ks.matrix_mut(self.matrix_key)?;
        for entry in &members {
            for cell in coordinates(&entry.member, self.config.depth, self.config.width) {
                matrix.raise(cell, entry.count);
            }
        }

        let trimmed = ks.index_mut(self.index_key)?.trim_to(self.config.capacity);
        debug!(
            index = %self.index_key,
            members = members.len(),
            trimmed,
            "index promoted into matrix"
        );
        Ok(())
    }

    /// Matrix-active phase: conservative update per item, in input
    /// order, then let items whose new count beats the index floor
    /// (re-)enter the index.
    fn increment_matrix(&self, ks: &mut Keyspace, batch: &[(Bytes, Count)]) -> Result<Vec<Count>> {
        let mut results = Vec::with_capacity(batch.len());
        let mut candidates: HashMap<Bytes, Count> = HashMap::new();

        for (item, delta) in batch {
            let indexed = ks.index(self.index_key)?.and_then(|ix| ix.count(item));
            let best = match indexed {
                Some(count) => count,
                None => self.matrix_estimate(ks, item)?,
            };
            let next = best.saturating_add(*delta);

            let matrix = ks.matrix_mut(self.matrix_key)?;
            for cell in coordinates(item, self.config.depth, self.config.width) {
                matrix.raise(cell, next);
            }

            if indexed.is_some() {
                // The index is authoritative for its members; a repeated
                // member inside one batch must see its own prior delta.
                ks.index_mut(self.index_key)?.insert(item.clone(), next);
            } else {
                candidates.insert(item.clone(), next);
            }
            results.push(next);
        }

        if !self.config.matrix_only() && !candidates.is_empty() {
            let index = ks.index_mut(self.index_key)?;
            let floor = index.min_count().unwrap_or(0);
            for (member, count) in candidates {
                if count > floor {
                    index.insert(member, count);
                }
            }
            index.trim_to(self.config.capacity);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (Key, Key) {
        (Key::from("s:idx"), Key::from("s:mat"))
    }

    fn pairs(items: &[(&str, Count)]) -> Vec<(Bytes, Count)> {
        items
            .iter()
            .map(|(item, delta)| (Bytes::copy_from_slice(item.as_bytes()), *delta))
            .collect()
    }

    #[test]
    fn test_exact_phase_counts() {
        let mut ks = Keyspace::new();
        let (ik, mk) = keys();
        let cfg = SketchConfig::new(5, 64, 50).unwrap();
        let sketch = Sketch::new(cfg, &ik, &mk);

        let counts = sketch
            .increment(&mut ks, &pairs(&[("foo", 1), ("bar", 2)]))
            .unwrap();
        assert_eq!(counts, vec![1, 2]);

        assert_eq!(sketch.estimate(&ks, b"foo").unwrap(), 1);
        assert_eq!(sketch.estimate(&ks, b"bar").unwrap(), 2);
        assert_eq!(sketch.estimate(&ks, b"baz").unwrap(), 0);

        // No matrix exists below capacity
        assert!(ks.matrix(&mk).unwrap().is_none());
    }

    #[test]
    fn test_repeated_item_in_one_batch() {
        let mut ks = Keyspace::new();
        let (ik, mk) = keys();
        let cfg = SketchConfig::new(5, 64, 50).unwrap();
        let sketch = Sketch::new(cfg, &ik, &mk);

        let counts = sketch
            .increment(&mut ks, &pairs(&[("a", 1), ("a", 2), ("a", 3)]))
            .unwrap();
        assert_eq!(counts, vec![1, 3, 6]);
    }

    #[test]
    fn test_promotion_fires_at_capacity() {
        let mut ks = Keyspace::new();
        let (ik, mk) = keys();
        let cfg = SketchConfig::new(4, 128, 3).unwrap();
        let sketch = Sketch::new(cfg, &ik, &mk);

        sketch
            .increment(&mut ks, &pairs(&[("a", 5), ("b", 4)]))
            .unwrap();
        assert!(ks.matrix(&mk).unwrap().is_none());

        sketch
            .increment(&mut ks, &pairs(&[("c", 3), ("d", 2), ("e", 1)]))
            .unwrap();

        // Promoted: matrix exists, index trimmed to capacity
        assert!(ks.matrix(&mk).unwrap().is_some());
        assert_eq!(ks.index(&ik).unwrap().map(|ix| ix.len()), Some(3));

        // Survivors are the highest-counted members, still exact
        assert_eq!(sketch.estimate(&ks, b"a").unwrap(), 5);
        assert_eq!(sketch.estimate(&ks, b"b").unwrap(), 4);
        assert_eq!(sketch.estimate(&ks, b"c").unwrap(), 3);

        // Evicted members fall back to the matrix and never undercount
        assert!(sketch.estimate(&ks, b"d").unwrap() >= 2);
        assert!(sketch.estimate(&ks, b"e").unwrap() >= 1);
    }

    #[test]
    fn test_matrix_only_sketch() {
        let mut ks = Keyspace::new();
        let (ik, mk) = keys();
        let cfg = SketchConfig::new(5, 256, 0).unwrap();
        let sketch = Sketch::new(cfg, &ik, &mk);

        let counts = sketch
            .increment(&mut ks, &pairs(&[("x", 2), ("x", 3)]))
            .unwrap();
        assert_eq!(counts, vec![2, 5]);
        assert_eq!(sketch.estimate(&ks, b"x").unwrap(), 5);

        // Nothing is ever indexed
        assert!(ks.index(&ik).unwrap().is_none());
    }

    #[test]
    fn test_trending_item_reenters_index() {
        let mut ks = Keyspace::new();
        let (ik, mk) = keys();
        let cfg = SketchConfig::new(4, 512, 2).unwrap();
        let sketch = Sketch::new(cfg, &ik, &mk);

        // Fill past capacity; "low" is evicted at promotion
        sketch
            .increment(&mut ks, &pairs(&[("hot", 10), ("warm", 5), ("low", 1)]))
            .unwrap();
        assert!(!ks.index(&ik).unwrap().map_or(false, |ix| ix.contains(b"low")));

        // "low" now trends past the index floor and re-enters
        sketch.increment(&mut ks, &pairs(&[("low", 20)])).unwrap();
        let index = ks.index(&ik).unwrap().expect("index exists");
        assert!(index.contains(b"low"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_estimates_are_monotone() {
        let mut ks = Keyspace::new();
        let (ik, mk) = keys();
        let cfg = SketchConfig::new(4, 64, 2).unwrap();
        let sketch = Sketch::new(cfg, &ik, &mk);

        let mut last = 0;
        for round in 0..20 {
            let noise = format!("other-{round}");
            sketch
                .increment(&mut ks, &pairs(&[("watched", 1), (&noise, 3)]))
                .unwrap();
            let now = sketch.estimate(&ks, b"watched").unwrap();
            assert!(now >= last, "estimate dropped from {last} to {now}");
            last = now;
        }
        assert!(last >= 20);
    }
}

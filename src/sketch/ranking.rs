//! Cross-sketch top-N aggregation.
//!
//! Ranking candidates come from the exact indexes only: an item that was
//! never indexed anywhere is invisible to ranking even when its matrix
//! cells hold a usable estimate. Matrix estimates still contribute to a
//! candidate's aggregate in sketches where it is not indexed.

use crate::sketch::Sketch;
use crate::storage::Keyspace;
use crate::types::{Count, IndexEntry};
use crate::Result;
use bytes::Bytes;
use std::collections::BTreeSet;

/// Compute the merged top-N across `sketches`, highest aggregate first,
/// ties broken by ascending item value.
///
/// Callers pass only sketches whose configuration exists; with none
/// remaining the ranking is empty. Without an explicit `limit` the
/// smallest configured capacity is used.
pub fn ranked(
    ks: &Keyspace,
    sketches: &[Sketch<'_>],
    limit: Option<u64>,
) -> Result<Vec<(Bytes, Count)>> {
    if sketches.is_empty() {
        return Ok(Vec::new());
    }

    let limit = limit
        .or_else(|| sketches.iter().map(|s| s.config().capacity).min())
        .unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);

    if let [sketch] = sketches {
        // Single sketch: the index already holds the authoritative
        // counts in ranking order.
        let Some(index) = ks.index(sketch.index_key())? else {
            return Ok(Vec::new());
        };
        return Ok(index
            .top(limit)
            .into_iter()
            .map(|IndexEntry { member, count }| (member, count))
            .collect());
    }

    // Candidates: anything indexed in at least one sketch.
    let mut candidates: BTreeSet<Bytes> = BTreeSet::new();
    for sketch in sketches {
        if let Some(index) = ks.index(sketch.index_key())? {
            candidates.extend(index.iter_ascending().map(|e| e.member));
        }
    }

    let mut merged = Vec::with_capacity(candidates.len());
    for member in candidates {
        let mut total: Count = 0;
        for sketch in sketches {
            total = total.saturating_add(sketch.estimate(ks, &member)?);
        }
        merged.push((member, total));
    }

    merged.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    merged.truncate(limit);
    Ok(merged)
}

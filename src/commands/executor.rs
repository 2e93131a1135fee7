//! Atomic execution of parsed batches.

use super::{Batch, Command, SketchKeys};
use crate::sketch::{ranked, Sketch, SketchConfig};
use crate::storage::{Db, Keyspace};
use crate::types::{Count, Key};
use crate::Result;
use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;

/// Aggregated result of one batch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Post-increment counts: one list per addressed sketch, in item
    /// input order.
    Counts(Vec<Vec<Count>>),
    /// Estimates as decimal text: one list per addressed sketch, in
    /// item input order.
    Estimates(Vec<Vec<String>>),
    /// Merged ranking: `(item, count-as-text)`, highest first.
    Ranked(Vec<(Bytes, String)>),
}

/// Executes command batches against a shared store.
///
/// Each invocation runs under one lock guard (exclusive for `INCR`,
/// shared for the read-only commands), so concurrent callers only ever
/// observe fully applied batches.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    db: Arc<Db>,
}

impl CommandExecutor {
    /// Create an executor over a store.
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// The underlying store handle.
    pub fn db(&self) -> &Arc<Db> {
        &self.db
    }

    /// Parse and run one invocation.
    ///
    /// Any validation failure aborts before the store is touched; a
    /// valid invocation applies in full.
    pub fn execute(&self, keys: &[Key], args: &[Bytes]) -> Result<Reply> {
        let batch = Batch::parse(keys, args)?;
        trace!(
            command = batch.command.kind().name(),
            sketches = batch.sketches.len(),
            "executing batch"
        );
        match &batch.command {
            Command::Incr {
                depth,
                width,
                capacity,
                pairs,
            } => {
                let mut ks = self.db.write();
                apply_incr(&mut ks, &batch.sketches, (*depth, *width, *capacity), pairs)
            }
            Command::Estimate { items } => {
                let ks = self.db.read();
                apply_estimate(&ks, &batch.sketches, items)
            }
            Command::Ranked { limit } => {
                let ks = self.db.read();
                apply_ranked(&ks, &batch.sketches, *limit)
            }
        }
    }
}

/// Apply an increment batch to every addressed sketch.
///
/// Configurations are resolved for all sketches before the first
/// counter mutation: the parameter triple only materializes for sketch
/// identities that do not exist yet, and a parameter error therefore
/// aborts with nothing applied anywhere.
fn apply_incr(
    ks: &mut Keyspace,
    sketches: &[SketchKeys],
    params: (u32, u32, u64),
    pairs: &[(Bytes, Count)],
) -> Result<Reply> {
    let loaded = sketches
        .iter()
        .map(|sk| SketchConfig::load(ks, &sk.config))
        .collect::<Result<Vec<_>>>()?;

    let configs: Vec<SketchConfig> = if loaded.iter().all(Option::is_some) {
        loaded.into_iter().flatten().collect()
    } else {
        let (depth, width, capacity) = params;
        let created = SketchConfig::new(depth, width, capacity)?;
        let mut configs = Vec::with_capacity(sketches.len());
        for (sk, slot) in sketches.iter().zip(loaded) {
            match slot {
                Some(cfg) => configs.push(cfg),
                None => {
                    SketchConfig::create(ks, &sk.config, created)?;
                    configs.push(created);
                }
            }
        }
        configs
    };

    let mut replies = Vec::with_capacity(sketches.len());
    for (sk, cfg) in sketches.iter().zip(configs) {
        let sketch = Sketch::new(cfg, &sk.index, &sk.matrix);
        replies.push(sketch.increment(ks, pairs)?);
    }
    Ok(Reply::Counts(replies))
}

/// Estimate every item against every addressed sketch. A sketch without
/// configuration is an empty sketch: every estimate is zero.
fn apply_estimate(ks: &Keyspace, sketches: &[SketchKeys], items: &[Bytes]) -> Result<Reply> {
    let mut replies = Vec::with_capacity(sketches.len());
    for sk in sketches {
        let estimates = match SketchConfig::load(ks, &sk.config)? {
            None => vec!["0".to_string(); items.len()],
            Some(cfg) => {
                let sketch = Sketch::new(cfg, &sk.index, &sk.matrix);
                items
                    .iter()
                    .map(|item| Ok(sketch.estimate(ks, item)?.to_string()))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        replies.push(estimates);
    }
    Ok(Reply::Estimates(replies))
}

/// Rank across the addressed sketches, skipping identities that were
/// never configured.
fn apply_ranked(ks: &Keyspace, sketches: &[SketchKeys], limit: Option<u64>) -> Result<Reply> {
    let mut present = Vec::with_capacity(sketches.len());
    for sk in sketches {
        if let Some(cfg) = SketchConfig::load(ks, &sk.config)? {
            present.push(Sketch::new(cfg, &sk.index, &sk.matrix));
        }
    }

    let merged = ranked(ks, &present, limit)?;
    Ok(Reply::Ranked(
        merged
            .into_iter()
            .map(|(member, count)| (member, count.to_string()))
            .collect(),
    ))
}

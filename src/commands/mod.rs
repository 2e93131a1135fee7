//! Command parsing and execution layer.
//!
//! A batch invocation arrives as a flat key list plus an argument
//! vector. Everything is parsed and validated here, up front, into a
//! typed [`Command`]; only a fully valid batch ever reaches the store,
//! which is what makes abort-before-mutation trivial to guarantee.

mod executor;

pub use executor::{CommandExecutor, Reply};

use crate::error::{CommandError, Result};
use crate::types::{Count, Key};
use crate::KEYS_PER_SKETCH;
use bytes::Bytes;
use phf::phf_map;

/// Command identifier for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Apply increments to every addressed sketch
    Incr,
    /// Read per-item estimates
    Estimate,
    /// Read the merged top-N ranking
    Ranked,
}

/// Static perfect hash map for case-insensitive command lookup.
static COMMANDS: phf::Map<&'static [u8], CommandKind> = phf_map! {
    b"INCR" => CommandKind::Incr,
    b"ESTIMATE" => CommandKind::Estimate,
    b"RANKED" => CommandKind::Ranked,
};

/// Uppercase a command name on the stack; 16 bytes covers every command.
#[inline]
fn to_uppercase_stack(src: &[u8]) -> Option<[u8; 16]> {
    if src.len() > 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    for (i, &b) in src.iter().enumerate() {
        buf[i] = b.to_ascii_uppercase();
    }
    Some(buf)
}

/// Lookup a command by name, ignoring ASCII case.
pub fn lookup_command(name: &[u8]) -> Option<CommandKind> {
    let upper = to_uppercase_stack(name)?;
    COMMANDS.get(&upper[..name.len()]).copied()
}

impl CommandKind {
    /// The canonical command name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Incr => "INCR",
            Self::Estimate => "ESTIMATE",
            Self::Ranked => "RANKED",
        }
    }
}

/// The three store keys of one sketch identity.
#[derive(Debug, Clone)]
pub struct SketchKeys {
    /// Configuration slot
    pub config: Key,
    /// Exact index
    pub index: Key,
    /// Counter matrix
    pub matrix: Key,
}

/// A typed, fully validated command payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `INCR depth width capacity (delta item)+`
    Incr {
        /// Hash rows for sketches created by this invocation
        depth: u32,
        /// Columns per row for sketches created by this invocation
        width: u32,
        /// Index capacity for sketches created by this invocation
        capacity: u64,
        /// `(item, delta)` pairs in input order, deltas all positive
        pairs: Vec<(Bytes, Count)>,
    },
    /// `ESTIMATE item+`
    Estimate {
        /// Items to estimate, in input order
        items: Vec<Bytes>,
    },
    /// `RANKED [limit]`
    Ranked {
        /// Maximum entries to return; defaults to the smallest capacity
        limit: Option<u64>,
    },
}

impl Command {
    /// Which command this payload belongs to.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Incr { .. } => CommandKind::Incr,
            Self::Estimate { .. } => CommandKind::Estimate,
            Self::Ranked { .. } => CommandKind::Ranked,
        }
    }
}

/// One parsed batch invocation: the addressed sketches and the command.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Addressed sketch identities, in key order
    pub sketches: Vec<SketchKeys>,
    /// The validated command payload
    pub command: Command,
}

impl Batch {
    /// Parse and validate a raw invocation.
    ///
    /// Rejects a key count that is not a positive multiple of
    /// [`KEYS_PER_SKETCH`], unknown command names, malformed numeric
    /// arguments, and non-positive deltas, all before any store access.
    pub fn parse(keys: &[Key], args: &[Bytes]) -> Result<Self> {
        if keys.is_empty() || keys.len() % KEYS_PER_SKETCH != 0 {
            return Err(CommandError::BadKeyCount {
                count: keys.len(),
                span: KEYS_PER_SKETCH,
            }
            .into());
        }
        let sketches = keys
            .chunks(KEYS_PER_SKETCH)
            .map(|triple| SketchKeys {
                config: triple[0].clone(),
                index: triple[1].clone(),
                matrix: triple[2].clone(),
            })
            .collect();

        let Some(name) = args.first() else {
            return Err(CommandError::SyntaxError.into());
        };
        let kind = lookup_command(name).ok_or_else(|| {
            CommandError::UnknownCommand(String::from_utf8_lossy(name).into_owned())
        })?;

        let payload = Payload {
            command: kind.name(),
            args: &args[1..],
        };
        let command = match kind {
            CommandKind::Incr => Self::parse_incr(&payload)?,
            CommandKind::Estimate => Self::parse_estimate(&payload)?,
            CommandKind::Ranked => Self::parse_ranked(&payload)?,
        };

        Ok(Self { sketches, command })
    }

    fn parse_incr(payload: &Payload<'_>) -> Result<Command> {
        // Three config parameters plus at least one (delta, item) pair
        payload.require_args(5)?;
        if (payload.args.len() - 3) % 2 != 0 {
            return Err(payload.wrong_arity());
        }

        let depth = payload.get_u32(0)?;
        let width = payload.get_u32(1)?;
        let capacity = payload.get_u64(2)?;

        let mut pairs = Vec::with_capacity((payload.args.len() - 3) / 2);
        let mut i = 3;
        while i < payload.args.len() {
            let delta = payload.get_i64(i)?;
            if delta <= 0 {
                return Err(CommandError::NonPositiveDelta.into());
            }
            pairs.push((payload.args[i + 1].clone(), delta as Count));
            i += 2;
        }

        Ok(Command::Incr {
            depth,
            width,
            capacity,
            pairs,
        })
    }

    fn parse_estimate(payload: &Payload<'_>) -> Result<Command> {
        payload.require_args(1)?;
        Ok(Command::Estimate {
            items: payload.args.to_vec(),
        })
    }

    fn parse_ranked(payload: &Payload<'_>) -> Result<Command> {
        let limit = match payload.args.len() {
            0 => None,
            1 => Some(payload.get_u64(0)?),
            _ => return Err(payload.wrong_arity()),
        };
        Ok(Command::Ranked { limit })
    }
}

/// Positional argument accessor for one command's payload.
struct Payload<'a> {
    command: &'static str,
    args: &'a [Bytes],
}

impl Payload<'_> {
    fn wrong_arity(&self) -> crate::Error {
        CommandError::WrongArity {
            command: self.command.to_string(),
        }
        .into()
    }

    fn require_args(&self, min: usize) -> Result<()> {
        if self.args.len() < min {
            Err(self.wrong_arity())
        } else {
            Ok(())
        }
    }

    fn get_str(&self, index: usize) -> Result<&str> {
        let bytes = self.args.get(index).ok_or_else(|| self.wrong_arity())?;
        std::str::from_utf8(bytes).map_err(|_| CommandError::NotInteger.into())
    }

    fn get_i64(&self, index: usize) -> Result<i64> {
        self.get_str(index)?
            .parse()
            .map_err(|_| CommandError::NotInteger.into())
    }

    fn get_u64(&self, index: usize) -> Result<u64> {
        self.get_str(index)?
            .parse()
            .map_err(|_| CommandError::NotInteger.into())
    }

    fn get_u32(&self, index: usize) -> Result<u32> {
        self.get_str(index)?
            .parse()
            .map_err(|_| CommandError::NotInteger.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<Key> {
        (0..n).map(|i| Key::from(format!("k{i}"))).collect()
    }

    fn args(parts: &[&str]) -> Vec<Bytes> {
        parts
            .iter()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    #[test]
    fn test_lookup_case_insensitive() {
        assert_eq!(lookup_command(b"INCR"), Some(CommandKind::Incr));
        assert_eq!(lookup_command(b"incr"), Some(CommandKind::Incr));
        assert_eq!(lookup_command(b"Ranked"), Some(CommandKind::Ranked));
        assert_eq!(lookup_command(b"estimate"), Some(CommandKind::Estimate));
        assert_eq!(lookup_command(b"FLUSH"), None);
        assert_eq!(lookup_command(b""), None);
    }

    #[test]
    fn test_parse_incr() {
        let batch = Batch::parse(
            &keys(3),
            &args(&["incr", "5", "64", "50", "1", "foo", "2", "bar"]),
        )
        .unwrap();
        assert_eq!(batch.sketches.len(), 1);
        assert_eq!(
            batch.command,
            Command::Incr {
                depth: 5,
                width: 64,
                capacity: 50,
                pairs: vec![(Bytes::from("foo"), 1), (Bytes::from("bar"), 2)],
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_key_count() {
        let err = Batch::parse(&keys(4), &args(&["RANKED"])).unwrap_err();
        assert_eq!(
            err,
            CommandError::BadKeyCount { count: 4, span: 3 }.into()
        );
        assert!(Batch::parse(&keys(0), &args(&["RANKED"])).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        let err = Batch::parse(&keys(3), &args(&["DECR", "1", "x"])).unwrap_err();
        assert_eq!(err, CommandError::UnknownCommand("DECR".into()).into());
    }

    #[test]
    fn test_parse_rejects_bad_deltas() {
        for delta in ["0", "-3", "two"] {
            let result = Batch::parse(&keys(3), &args(&["INCR", "5", "64", "50", delta, "x"]));
            assert!(result.is_err(), "delta {delta:?} should be rejected");
        }
    }

    #[test]
    fn test_parse_incr_requires_pairs() {
        assert!(Batch::parse(&keys(3), &args(&["INCR", "5", "64", "50"])).is_err());
        // Dangling delta with no item
        assert!(Batch::parse(&keys(3), &args(&["INCR", "5", "64", "50", "1"])).is_err());
    }

    #[test]
    fn test_parse_ranked_limit() {
        let batch = Batch::parse(&keys(3), &args(&["RANKED"])).unwrap();
        assert_eq!(batch.command, Command::Ranked { limit: None });

        let batch = Batch::parse(&keys(3), &args(&["RANKED", "10"])).unwrap();
        assert_eq!(batch.command, Command::Ranked { limit: Some(10) });

        assert!(Batch::parse(&keys(3), &args(&["RANKED", "10", "20"])).is_err());
        assert!(Batch::parse(&keys(3), &args(&["RANKED", "-1"])).is_err());
    }

    #[test]
    fn test_parse_estimate_requires_items() {
        assert!(Batch::parse(&keys(3), &args(&["ESTIMATE"])).is_err());
        let batch = Batch::parse(&keys(6), &args(&["ESTIMATE", "a", "b"])).unwrap();
        assert_eq!(batch.sketches.len(), 2);
        assert_eq!(
            batch.command,
            Command::Estimate {
                items: vec![Bytes::from("a"), Bytes::from("b")],
            }
        );
    }

    #[test]
    fn test_parse_empty_args() {
        let err = Batch::parse(&keys(3), &[]).unwrap_err();
        assert_eq!(err, CommandError::SyntaxError.into());
    }
}

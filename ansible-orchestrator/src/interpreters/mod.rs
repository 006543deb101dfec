//! Output interpreters: raw engine output → structured values
//!
//! Pure functions over captured stdout. None of them touch the filesystem
//! or spawn anything; a malformed document is a `Parse` error quoting a
//! bounded excerpt, never a partially filled result.

pub mod adhoc;
pub mod facts;
pub mod inventory;
pub mod logs;
pub mod recap;

use std::collections::BTreeMap;

/// Variables or facts as the engine reported them, key-ordered
pub type VarTable = BTreeMap<String, serde_json::Value>;

pub use adhoc::{parse_adhoc, HostOutcome, HostStatus};
pub use facts::{parse_facts, FactSet};
pub use inventory::{parse_inventory, HostRecord, InventoryGraph};
pub use logs::{LogEntry, LogInterpreter};
pub use recap::{parse_recap, RecapCounters};

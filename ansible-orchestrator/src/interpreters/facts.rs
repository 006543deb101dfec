//! `setup` module results → per-host fact tables

use super::adhoc::{parse_adhoc, HostStatus};
use super::VarTable;
use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FactSet {
    pub hosts: BTreeMap<String, VarTable>,
    /// Hosts that returned no facts, with the reason the engine gave
    pub unavailable: BTreeMap<String, String>,
}

impl FactSet {
    pub fn facts(&self, host: &str) -> Option<&VarTable> {
        self.hosts.get(host)
    }
}

/// Parse ad-hoc `setup` output. With `filter`, fact keys not matching the
/// `*` / `?` glob are dropped.
pub fn parse_facts(raw: &str, filter: Option<&str>) -> Result<FactSet> {
    let matcher = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(glob_to_regex)
        .transpose()?;

    let mut set = FactSet::default();
    for outcome in parse_adhoc(raw)? {
        if !matches!(outcome.status, HostStatus::Ok | HostStatus::Changed) {
            let reason = outcome
                .message
                .unwrap_or_else(|| format!("host {}", outcome.status.as_str()));
            set.unavailable.insert(outcome.host, reason);
            continue;
        }

        let facts: VarTable = match outcome.result.get("ansible_facts") {
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(key, _)| matcher.as_ref().map_or(true, |m| m.is_match(key)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => VarTable::new(),
        };
        set.hosts.insert(outcome.host, facts);
    }
    Ok(set)
}

/// Anchored regex for a shell-style glob; everything but `*` and `?` is literal
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Ok(Regex::new(&expr)?)
}

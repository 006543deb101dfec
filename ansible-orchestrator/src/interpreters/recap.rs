//! `PLAY RECAP` block of a playbook run → per-host counters

use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

const RECAP_HEADER: &str = "PLAY RECAP";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecapCounters {
    pub ok: u32,
    pub changed: u32,
    pub unreachable: u32,
    pub failed: u32,
    pub skipped: u32,
    pub rescued: u32,
    pub ignored: u32,
}

impl RecapCounters {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.unreachable > 0
    }
}

/// Counters for every host in the last recap block. Output without a recap
/// (aborted run, syntax error) yields an empty map.
pub fn parse_recap(output: &str) -> Result<BTreeMap<String, RecapCounters>> {
    let host_line = Regex::new(r"^(\S+)\s*:\s*((?:\w+=\d+\s*)+)$")?;
    let counter = Regex::new(r"(\w+)=(\d+)")?;

    let mut hosts = BTreeMap::new();
    let mut in_recap = false;
    for line in output.lines() {
        let line = line.trim();
        if line.starts_with(RECAP_HEADER) {
            in_recap = true;
            hosts.clear();
            continue;
        }
        if !in_recap || line.is_empty() {
            continue;
        }
        let Some(caps) = host_line.captures(line) else {
            in_recap = false;
            continue;
        };

        let mut counters = RecapCounters::default();
        for pair in counter.captures_iter(&caps[2]) {
            let value: u32 = pair[2].parse().unwrap_or(u32::MAX);
            match &pair[1] {
                "ok" => counters.ok = value,
                "changed" => counters.changed = value,
                "unreachable" => counters.unreachable = value,
                "failed" => counters.failed = value,
                "skipped" => counters.skipped = value,
                "rescued" => counters.rescued = value,
                "ignored" => counters.ignored = value,
                _ => {}
            }
        }
        hosts.insert(caps[1].to_string(), counters);
    }
    Ok(hosts)
}

/// Hosts with failed or unreachable tasks, sorted
pub fn failed_hosts(recap: &BTreeMap<String, RecapCounters>) -> Vec<String> {
    recap
        .iter()
        .filter(|(_, c)| c.has_failures())
        .map(|(host, _)| host.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = "\
PLAY [webservers] **************************************************************

TASK [Gathering Facts] *********************************************************
ok: [web01]
fatal: [web02]: UNREACHABLE! => {\"changed\": false, \"unreachable\": true}

PLAY RECAP *********************************************************************
web01                      : ok=4    changed=2    unreachable=0    failed=0    skipped=1    rescued=0    ignored=0
web02                      : ok=0    changed=0    unreachable=1    failed=0    skipped=0    rescued=0    ignored=0
db01                       : ok=3    changed=0    unreachable=0    failed=1    skipped=0    rescued=0    ignored=1

";

    #[test]
    fn test_counters() {
        let recap = parse_recap(RUN).unwrap();
        assert_eq!(recap.len(), 3);
        assert_eq!(
            recap["web01"],
            RecapCounters {
                ok: 4,
                changed: 2,
                skipped: 1,
                ..RecapCounters::default()
            }
        );
        assert_eq!(recap["db01"].ignored, 1);
    }

    #[test]
    fn test_failed_hosts() {
        let recap = parse_recap(RUN).unwrap();
        assert_eq!(failed_hosts(&recap), vec!["db01".to_string(), "web02".to_string()]);
    }

    #[test]
    fn test_no_recap() {
        let recap = parse_recap("ERROR! the playbook: site.yml could not be found").unwrap();
        assert!(recap.is_empty());
    }
}

//! JSON stdout-callback output of ad-hoc runs → per-host outcomes

use crate::error::{OrchestratorError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStatus {
    Ok,
    Changed,
    Failed,
    Unreachable,
    Skipped,
}

impl HostStatus {
    pub fn is_success(self) -> bool {
        matches!(self, HostStatus::Ok | HostStatus::Changed | HostStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostStatus::Ok => "ok",
            HostStatus::Changed => "changed",
            HostStatus::Failed => "failed",
            HostStatus::Unreachable => "unreachable",
            HostStatus::Skipped => "skipped",
        }
    }

    fn classify(result: &Value) -> Self {
        let flag = |key: &str| result.get(key).and_then(Value::as_bool).unwrap_or(false);
        if flag("unreachable") {
            HostStatus::Unreachable
        } else if flag("failed") {
            HostStatus::Failed
        } else if flag("skipped") {
            HostStatus::Skipped
        } else if flag("changed") {
            HostStatus::Changed
        } else {
            HostStatus::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostOutcome {
    pub host: String,
    pub status: HostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Module result exactly as reported
    pub result: Value,
}

impl HostOutcome {
    /// Module stdout for command/shell results
    pub fn stdout(&self) -> Option<&str> {
        self.result.get("stdout").and_then(Value::as_str)
    }
}

/// Parse the callback document. Lines printed ahead of the JSON body are
/// skipped; the body starts on the first line opening with `{`. When a host appears in several tasks the last result wins.
pub fn parse_adhoc(raw: &str) -> Result<Vec<HostOutcome>> {
    let trimmed = raw.trim_start();
    let start = if trimmed.starts_with('{') {
        Some(0)
    } else {
        trimmed.match_indices("\n{").next().map(|(at, _)| at + 1)
    };
    let body = start
        .map(|start| &trimmed[start..])
        .ok_or_else(|| OrchestratorError::parse("ad-hoc results", "no JSON document in output", raw))?;
    let document: Value =
        serde_json::from_str(body).map_err(|e| OrchestratorError::parse("ad-hoc results", e, raw))?;

    let plays: &[Value] = match document.get("plays") {
        Some(Value::Array(plays)) => plays.as_slice(),
        None | Some(Value::Null) => &[],
        Some(_) => return Err(OrchestratorError::parse("ad-hoc results", "`plays` is not a list", raw)),
    };

    let mut outcomes: BTreeMap<String, HostOutcome> = BTreeMap::new();
    for task in plays
        .iter()
        .filter_map(|play| play.get("tasks").and_then(Value::as_array))
        .flatten()
    {
        let Some(hosts) = task.get("hosts") else {
            continue;
        };
        let Value::Object(hosts) = hosts else {
            return Err(OrchestratorError::parse("ad-hoc results", "task `hosts` is not a mapping", raw));
        };
        for (host, result) in hosts {
            outcomes.insert(
                host.clone(),
                HostOutcome {
                    host: host.clone(),
                    status: HostStatus::classify(result),
                    message: result.get("msg").and_then(Value::as_str).map(str::to_string),
                    result: result.clone(),
                },
            );
        }
    }

    Ok(outcomes.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn callback(hosts: Value) -> String {
        json!({
            "custom_stats": {},
            "plays": [{
                "play": {"name": "Ansible Ad-Hoc"},
                "tasks": [{"task": {"name": "ping"}, "hosts": hosts}]
            }],
            "stats": {}
        })
        .to_string()
    }

    #[test]
    fn test_statuses() {
        let raw = callback(json!({
            "web01": {"ping": "pong", "changed": false},
            "web02": {"changed": true},
            "db01": {"unreachable": true, "msg": "ssh: connect to host db01 port 22: No route to host"},
            "db02": {"failed": true, "msg": "module failure"},
            "cache": {"skipped": true}
        }));

        let outcomes = parse_adhoc(&raw).unwrap();
        let status: Vec<(&str, HostStatus)> = outcomes.iter().map(|o| (o.host.as_str(), o.status)).collect();
        assert_eq!(
            status,
            vec![
                ("cache", HostStatus::Skipped),
                ("db01", HostStatus::Unreachable),
                ("db02", HostStatus::Failed),
                ("web01", HostStatus::Ok),
                ("web02", HostStatus::Changed),
            ]
        );
        assert!(outcomes[1].message.as_deref().unwrap().contains("No route"));
        assert_eq!(outcomes[3].result["ping"], json!("pong"));
    }

    #[test]
    fn test_leading_warning_skipped() {
        let raw = format!(
            "[WARNING]: Platform linux on host web01 is using the discovered Python\n{}",
            callback(json!({"web01": {"rc": 0, "stdout": "3\n"}}))
        );
        let outcomes = parse_adhoc(&raw).unwrap();
        assert_eq!(outcomes[0].stdout(), Some("3\n"));
    }

    #[test]
    fn test_braces_in_warning_skipped() {
        let raw = format!(
            "[WARNING]: Invalid characters were found in group names: {{'web-servers'}}\n{}",
            callback(json!({"web01": {"ping": "pong"}}))
        );
        let outcomes = parse_adhoc(&raw).unwrap();
        assert_eq!(outcomes[0].host, "web01");
        assert_eq!(outcomes[0].status, HostStatus::Ok);
    }

    #[test]
    fn test_empty_plays() {
        assert!(parse_adhoc(r#"{"plays": [], "stats": {}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_malformed() {
        assert_eq!(parse_adhoc("").unwrap_err().kind(), "parse_error");
        assert_eq!(parse_adhoc("{\"plays\": [").unwrap_err().kind(), "parse_error");
        assert_eq!(parse_adhoc(r#"{"plays": 1}"#).unwrap_err().kind(), "parse_error");
    }
}

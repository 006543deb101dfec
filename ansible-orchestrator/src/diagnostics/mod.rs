//! Host diagnostics: five probes folded into a 0-100 health score
//!
//! Probes (fixed order and weights):
//! - connectivity: ad-hoc `ping` (30)
//! - disk: `setup` filtered to `ansible_mounts`, worst mount (20)
//! - memory: `setup` filtered to `ansible_memory_mb`, nocache usage (20)
//! - services: failed systemd units (20)
//! - updates: pending package updates (10)
//!
//! A probe that cannot run, times out, hits an unreachable or failing host
//! or returns unreadable output scores 0 for its category.

use crate::commands::adhoc::{self, AdHocTask, ModuleArgs};
use crate::commands::CommandSpec;
use crate::context::ExecutionContext;
use crate::error::{excerpt, Result};
use crate::execution::{CommandRunner, ExecutionResult};
use crate::interpreters::adhoc::{parse_adhoc, HostOutcome, HostStatus};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Categories scoring below this get a finding
pub const FINDING_THRESHOLD: u8 = 70;

pub const FAILED_UNITS_COMMAND: &str = "systemctl --failed --no-legend --plain";

pub const PENDING_UPDATES_SCRIPT: &str = "if command -v apt >/dev/null 2>&1; then \
apt list --upgradable 2>/dev/null | grep -c upgradable || true; \
elif command -v dnf >/dev/null 2>&1; then \
dnf -q check-update 2>/dev/null | grep -c '^[[:alnum:]]' || true; \
elif command -v yum >/dev/null 2>&1; then \
yum -q check-update 2>/dev/null | grep -c '^[[:alnum:]]' || true; \
else echo 0; fi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Connectivity,
    Disk,
    Memory,
    Services,
    Updates,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Connectivity,
        Category::Disk,
        Category::Memory,
        Category::Services,
        Category::Updates,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Connectivity => "connectivity",
            Category::Disk => "disk",
            Category::Memory => "memory",
            Category::Services => "services",
            Category::Updates => "updates",
        }
    }

    pub fn weight(self) -> u32 {
        match self {
            Category::Connectivity => 30,
            Category::Disk | Category::Memory | Category::Services => 20,
            Category::Updates => 10,
        }
    }
}

/// Score and explanation for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub category: Category,
    pub score: u8,
    pub detail: String,
}

impl Assessment {
    fn failed(category: Category, detail: String) -> Self {
        Self {
            category,
            score: 0,
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub host: String,
    pub score: u8,
    pub category_scores: BTreeMap<String, u8>,
    pub findings: Vec<String>,
    pub details: BTreeMap<String, String>,
}

impl HealthReport {
    /// Weighted mean rounded half up; missing categories count as 0
    pub fn from_assessments(host: impl Into<String>, assessments: &[Assessment]) -> Self {
        let score_of = |category: Category| {
            assessments
                .iter()
                .find(|a| a.category == category)
                .map_or(0, |a| a.score.min(100))
        };

        let total_weight: u32 = Category::ALL.iter().map(|c| c.weight()).sum();
        let weighted: u32 = Category::ALL
            .iter()
            .map(|c| c.weight() * u32::from(score_of(*c)))
            .sum();
        let score = ((weighted * 2 + total_weight) / (total_weight * 2)) as u8;

        let mut category_scores = BTreeMap::new();
        let mut details = BTreeMap::new();
        let mut findings = Vec::new();
        for category in Category::ALL {
            let score = score_of(category);
            let detail = assessments
                .iter()
                .find(|a| a.category == category)
                .map_or_else(|| "not probed".to_string(), |a| a.detail.clone());
            if score < FINDING_THRESHOLD {
                findings.push(format!("{}: {} (score {})", category.name(), detail, score));
            }
            category_scores.insert(category.name().to_string(), score);
            details.insert(category.name().to_string(), detail);
        }

        Self {
            host: host.into(),
            score,
            category_scores,
            findings,
            details,
        }
    }
}

/// Build every probe, run them together, fold the results into a report
pub async fn diagnose(runner: &dyn CommandRunner, host: &str, ctx: &ExecutionContext) -> Result<HealthReport> {
    let probes = build_probes(host, ctx)?;
    info!("Diagnosing {} with {} probes", host, probes.len());

    let runs = join_all(probes.into_iter().map(|(category, spec)| async move {
        (category, runner.run(spec).await)
    }))
    .await;

    let assessments: Vec<Assessment> = runs
        .into_iter()
        .map(|(category, run)| {
            let assessment = assess(category, host, run);
            debug!("{} probe on {}: {} ({})", category.name(), host, assessment.score, assessment.detail);
            assessment
        })
        .collect();

    let report = HealthReport::from_assessments(host, &assessments);
    if report.score < FINDING_THRESHOLD {
        warn!("{} health score {}: {}", host, report.score, report.findings.join("; "));
    } else {
        info!("{} health score {}", host, report.score);
    }
    Ok(report)
}

fn build_probes(host: &str, ctx: &ExecutionContext) -> Result<Vec<(Category, CommandSpec)>> {
    let services = AdHocTask::new(host, "command").with_args(ModuleArgs::Raw(FAILED_UNITS_COMMAND.into()));
    let updates = AdHocTask::new(host, "shell").with_args(ModuleArgs::Raw(PENDING_UPDATES_SCRIPT.into()));

    Ok(vec![
        (Category::Connectivity, adhoc::ping(host, ctx)?),
        (Category::Disk, adhoc::gather_facts(host, Some("ansible_mounts"), ctx)?),
        (Category::Memory, adhoc::gather_facts(host, Some("ansible_memory_mb"), ctx)?),
        (Category::Services, adhoc::run(&services, ctx)?),
        (Category::Updates, adhoc::run(&updates, ctx)?),
    ])
}

type Reading = std::result::Result<(u8, String), String>;

fn assess(category: Category, host: &str, run: Result<ExecutionResult>) -> Assessment {
    match read_probe(category, host, run) {
        Ok((score, detail)) => Assessment {
            category,
            score,
            detail,
        },
        Err(detail) => Assessment::failed(category, detail),
    }
}

fn read_probe(category: Category, host: &str, run: Result<ExecutionResult>) -> Reading {
    let result = run.map_err(|e| format!("probe could not run: {}", e))?;
    if result.timed_out {
        return Err(format!("probe timed out after {}s", result.duration.as_secs()));
    }

    let outcomes = parse_adhoc(&result.stdout).map_err(|e| e.to_string())?;
    let outcome = outcomes
        .iter()
        .find(|o| o.host == host)
        .or_else(|| outcomes.first())
        .ok_or_else(|| format!("no result reported for {}", host))?;

    let message = outcome.message.as_deref().unwrap_or("no message");
    match outcome.status {
        HostStatus::Unreachable => return Err(format!("host unreachable: {}", message)),
        HostStatus::Failed => return Err(format!("probe failed: {}", message)),
        _ => {}
    }

    match category {
        Category::Connectivity => Ok((100, "reachable".to_string())),
        Category::Disk => {
            let (mount, percent) = worst_mount(outcome)?;
            Ok((disk_score(percent), format!("{} is {:.1}% full", mount, percent)))
        }
        Category::Memory => {
            let percent = memory_used_percent(outcome)?;
            Ok((memory_score(percent), format!("{:.1}% of memory in use", percent)))
        }
        Category::Services => {
            let failed = failed_units(outcome.stdout().unwrap_or_default());
            let detail = if failed.is_empty() {
                "no failed units".to_string()
            } else {
                format!("{} failed units: {}", failed.len(), failed.join(", "))
            };
            Ok((services_score(failed.len()), detail))
        }
        Category::Updates => {
            let raw = outcome.stdout().unwrap_or_default();
            let pending: u32 = raw
                .trim()
                .parse()
                .map_err(|_| format!("unreadable update count {:?}", excerpt(raw)))?;
            Ok((updates_score(pending), format!("{} pending updates", pending)))
        }
    }
}

fn fact<'a>(outcome: &'a HostOutcome, name: &str) -> std::result::Result<&'a Value, String> {
    outcome
        .result
        .get("ansible_facts")
        .and_then(|facts| facts.get(name))
        .ok_or_else(|| format!("`{}` missing from facts", name))
}

/// Mount with the highest used percentage
fn worst_mount(outcome: &HostOutcome) -> std::result::Result<(String, f64), String> {
    let mounts = fact(outcome, "ansible_mounts")?
        .as_array()
        .ok_or_else(|| "`ansible_mounts` is not a list".to_string())?;

    mounts
        .iter()
        .filter_map(|m| {
            let total = m.get("size_total")?.as_f64()?;
            let available = m.get("size_available")?.as_f64()?;
            let mount = m.get("mount")?.as_str()?;
            (total > 0.0).then(|| (mount.to_string(), (total - available) / total * 100.0))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| "no sized mounts reported".to_string())
}

/// Used memory excluding buffers and cache, as a percentage of real total
fn memory_used_percent(outcome: &HostOutcome) -> std::result::Result<f64, String> {
    let memory = fact(outcome, "ansible_memory_mb")?;
    let used = memory.pointer("/nocache/used").and_then(Value::as_f64);
    let total = memory.pointer("/real/total").and_then(Value::as_f64);
    match (used, total) {
        (Some(used), Some(total)) if total > 0.0 => Ok(used / total * 100.0),
        _ => Err("`ansible_memory_mb` lacks nocache.used or real.total".to_string()),
    }
}

fn failed_units(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub fn disk_score(used_percent: f64) -> u8 {
    match used_percent {
        p if p <= 70.0 => 100,
        p if p <= 85.0 => 80,
        p if p <= 95.0 => 50,
        _ => 10,
    }
}

pub fn memory_score(used_percent: f64) -> u8 {
    match used_percent {
        p if p <= 80.0 => 100,
        p if p <= 90.0 => 70,
        _ => 30,
    }
}

pub fn services_score(failed: usize) -> u8 {
    100u8.saturating_sub((failed.min(5) as u8) * 20)
}

pub fn updates_score(pending: u32) -> u8 {
    match pending {
        0 => 100,
        1..=10 => 80,
        11..=50 => 50,
        _ => 20,
    }
}

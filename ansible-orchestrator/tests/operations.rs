use ansible_orchestrator::config::{EnvMap, ProjectRegistry};
use ansible_orchestrator::{ExecutionResult, Orchestrator};
use devkit::{adhoc_output, ProjectFixture, ScriptedRunner};
use serde_json::json;
use std::fs;
use std::sync::Arc;

fn orchestrator(fixture: &ProjectFixture, runner: Arc<ScriptedRunner>) -> Orchestrator {
    let mut registry = ProjectRegistry::in_memory();
    registry.register(fixture.definition("web"), true).unwrap();
    Orchestrator::new(registry, runner, EnvMap::new(), fixture.root().to_path_buf())
}

#[tokio::test]
async fn test_diagnose_unreachable_host() {
    let fixture = ProjectFixture::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new().otherwise(ScriptedRunner::exit(
        4,
        adhoc_output(json!({"web01": {"unreachable": true, "msg": "No route to host"}})),
        "",
    )));
    let ops = orchestrator(&fixture, runner.clone());

    let payload = ops.dispatch("ansible_diagnose_host", json!({"hostname": "web01"})).await;

    assert_eq!(payload["health_score"], 0);
    assert_eq!(payload["findings"].as_array().unwrap().len(), 5);
    for category in ["connectivity", "disk", "memory", "services", "updates"] {
        assert_eq!(payload["category_scores"][category], 0, "{}", category);
    }
    assert_eq!(runner.calls().len(), 5);
}

fn probes_with_updates(updates: ExecutionResult) -> ScriptedRunner {
    ScriptedRunner::new()
        .on_arg(
            "ansible_mounts",
            ScriptedRunner::ok(adhoc_output(json!({"web01": {"ansible_facts": {"ansible_mounts": [
                {"mount": "/", "size_total": 1000, "size_available": 900}
            ]}}}))),
        )
        .on_arg(
            "ansible_memory_mb",
            ScriptedRunner::ok(adhoc_output(json!({"web01": {"ansible_facts": {"ansible_memory_mb": {
                "nocache": {"used": 100}, "real": {"total": 1000}
            }}}}))),
        )
        .on_arg("systemctl", ScriptedRunner::ok(adhoc_output(json!({"web01": {"stdout": ""}}))))
        .on_arg("check-update", updates)
        .otherwise(ScriptedRunner::ok(adhoc_output(json!({"web01": {"ping": "pong"}}))))
}

#[tokio::test]
async fn test_diagnose_healthy_host() {
    let fixture = ProjectFixture::new().unwrap();
    let updates = ScriptedRunner::ok(adhoc_output(json!({"web01": {"stdout": "0"}})));
    let ops = orchestrator(&fixture, Arc::new(probes_with_updates(updates)));

    let payload = ops.dispatch("ansible_diagnose_host", json!({"hostname": "web01"})).await;
    assert_eq!(payload["health_score"], 100, "{}", payload);
    assert!(payload["findings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_diagnose_update_timeout_scores_zero() {
    let fixture = ProjectFixture::new().unwrap();
    let runner = probes_with_updates(ScriptedRunner::timed_out("Reading package lists..."));
    let ops = orchestrator(&fixture, Arc::new(runner));

    let payload = ops.dispatch("ansible_diagnose_host", json!({"hostname": "web01"})).await;
    assert_eq!(payload["category_scores"]["updates"], 0);
    assert_eq!(payload["health_score"], 90);
    let findings = payload["findings"].as_array().unwrap();
    assert_eq!(findings.len(), 1);
    assert!(findings[0].as_str().unwrap().starts_with("updates: probe timed out"));
}

#[tokio::test]
async fn test_gather_facts_filter() {
    let fixture = ProjectFixture::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new().otherwise(ScriptedRunner::ok(adhoc_output(json!({
        "web01": {"ansible_facts": {"ansible_distribution": "Debian", "ansible_kernel": "6.1.0"}}
    })))));
    let ops = orchestrator(&fixture, runner.clone());

    let payload = ops
        .dispatch("ansible_gather_facts", json!({"hosts": "web01", "filter_pattern": "ansible_dist*"}))
        .await;
    assert_eq!(payload["facts"]["web01"], json!({"ansible_distribution": "Debian"}));

    let spec = &runner.calls()[0];
    assert_eq!(spec.environment.get("ANSIBLE_STDOUT_CALLBACK").map(String::as_str), Some("json"));
}

#[tokio::test]
async fn test_host_logs_grouped_by_entry() {
    let fixture = ProjectFixture::new().unwrap();
    let log = "2024-05-01T10:00:00Z app: boom\n  at handler()\n2024-05-01T10:00:03Z app: ok";
    let runner = Arc::new(
        ScriptedRunner::new().otherwise(ScriptedRunner::ok(adhoc_output(json!({"web01": {"stdout": log}})))),
    );
    let ops = orchestrator(&fixture, runner);

    let payload = ops
        .dispatch("ansible_host_logs", json!({"hosts": "web01", "path": "/var/log/app.log", "lines": 20}))
        .await;
    let entries = payload["hosts"]["web01"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["format"], "iso8601");
    assert!(entries[0]["text"].as_str().unwrap().ends_with("at handler()"));
}

#[tokio::test]
async fn test_find_host_in_inventory() {
    let fixture = ProjectFixture::new().unwrap();
    let dump = json!({
        "all": {"children": ["webservers"], "vars": {"region": "eu"}},
        "webservers": {"hosts": ["web01"]}
    });
    let runner = Arc::new(ScriptedRunner::new().otherwise(ScriptedRunner::ok(dump.to_string())));
    let ops = orchestrator(&fixture, runner);

    let found = ops.dispatch("inventory_find_host", json!({"hostname": "web01"})).await;
    assert_eq!(found["found"], true);
    assert_eq!(found["host"]["groups"], json!(["all", "webservers"]));
    assert_eq!(found["host"]["vars"]["region"], "eu");

    let missing = ops.dispatch("inventory_find_host", json!({"hostname": "db09"})).await;
    assert_eq!(missing["found"], false);
}

#[tokio::test]
async fn test_playbooks_created_and_discovered() {
    let fixture = ProjectFixture::new().unwrap();
    let ops = orchestrator(&fixture, Arc::new(ScriptedRunner::new()));

    let created = ops
        .dispatch(
            "create_playbook",
            json!({"path": "plays/db.yml", "content": [{"hosts": "dbservers", "tasks": []}]}),
        )
        .await;
    assert_eq!(created["success"], true, "{}", created);
    assert!(fs::read_to_string(fixture.path("plays/db.yml")).unwrap().contains("dbservers"));

    let listed = ops.dispatch("project_playbooks", json!({})).await;
    assert_eq!(listed["playbooks"], json!(["plays/db.yml", "site.yml"]));
    assert_eq!(listed["project"], "web");

    let escaped = ops
        .dispatch("create_playbook", json!({"path": "../outside.yml", "content": "- hosts: all"}))
        .await;
    assert_eq!(escaped["error"]["kind"], "validation_error");
}

#[tokio::test]
async fn test_overlapping_tags_never_reach_the_engine() {
    let fixture = ProjectFixture::new().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let ops = orchestrator(&fixture, runner.clone());

    let payload = ops
        .dispatch("ansible_playbook", json!({"playbook": "site.yml", "tags": "web,db", "skip_tags": "db"}))
        .await;
    assert_eq!(payload["error"]["kind"], "validation_error");
    assert!(runner.calls().is_empty());
}

/*!
Runner scripté en mémoire

Implémente `CommandRunner` sans lancer de processus: chaque règle associe un
prédicat sur l'argv à un `ExecutionResult` préparé. Les commandes reçues
sont enregistrées pour les assertions.
*/

use ansible_orchestrator::commands::CommandSpec;
use ansible_orchestrator::error::{OrchestratorError, Result};
use ansible_orchestrator::execution::{CommandRunner, ExecutionResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::time::Duration;

type Predicate = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

pub struct ScriptedRunner {
    rules: Vec<(Predicate, ExecutionResult)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Première règle correspondante gagne
    pub fn on<F>(mut self, predicate: F, result: ExecutionResult) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.rules.push((Box::new(predicate), result));
        self
    }

    /// Règle sur un argument contenant `needle`
    pub fn on_arg(self, needle: &str, result: ExecutionResult) -> Self {
        let needle = needle.to_string();
        self.on(move |argv| argv.iter().any(|a| a.contains(&needle)), result)
    }

    /// Règle par défaut
    pub fn otherwise(self, result: ExecutionResult) -> Self {
        self.on(|_| true, result)
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    pub fn ok(stdout: impl Into<String>) -> ExecutionResult {
        Self::exit(0, stdout, "")
    }

    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::from_millis(10),
            timed_out: false,
        }
    }

    pub fn timed_out(partial_stdout: impl Into<String>) -> ExecutionResult {
        ExecutionResult {
            exit_code: None,
            stdout: partial_stdout.into(),
            stderr: "Command timed out".to_string(),
            duration: Duration::from_secs(1),
            timed_out: true,
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: CommandSpec) -> Result<ExecutionResult> {
        let argv = spec.argv();
        self.calls.lock().push(spec.clone());

        self.rules
            .iter()
            .find(|(predicate, _)| predicate(&argv))
            .map(|(_, result)| result.clone())
            .ok_or_else(|| OrchestratorError::Execution {
                program: spec.program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted result"),
            })
    }
}

/// Sortie JSON du callback `json` pour un résultat par hôte
pub fn adhoc_output(hosts: Value) -> String {
    json!({
        "custom_stats": {},
        "plays": [{
            "play": {"name": "Ansible Ad-Hoc"},
            "tasks": [{"task": {"name": "adhoc"}, "hosts": hosts}]
        }],
        "stats": {}
    })
    .to_string()
}

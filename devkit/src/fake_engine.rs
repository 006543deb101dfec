/*!
Faux moteur Ansible

Écrit des scripts shell exécutables nommés comme les binaires Ansible
(`ansible`, `ansible-playbook`, ...). Chaque script:
- enregistre ses arguments, son répertoire courant et son environnement
- imprime la sortie préparée sur stdout / stderr
- sort avec le code demandé

Pointer `MCP_ANSIBLE_BIN_DIR` sur `bin_dir()` pour l'utiliser.
*/

use ansible_orchestrator::config::{EnvMap, ENV_BIN_DIR};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEREDOC_MARKER: &str = "__FAKE_ENGINE_EOF__";

pub struct FakeEngine {
    dir: TempDir,
}

impl FakeEngine {
    pub fn new() -> Result<Self> {
        Ok(Self { dir: TempDir::new()? })
    }

    pub fn bin_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Environnement minimal pointant l'orchestrateur sur ce faux moteur
    pub fn env(&self) -> EnvMap {
        let mut env = EnvMap::new();
        env.insert(ENV_BIN_DIR.to_string(), self.bin_dir().to_string_lossy().into_owned());
        if let Ok(path) = std::env::var("PATH") {
            env.insert("PATH".to_string(), path);
        }
        env
    }

    /// Installe `binary` qui imprime `stdout` et sort avec `exit_code`
    pub fn install(&self, binary: &str, stdout: &str, exit_code: i32) -> Result<PathBuf> {
        self.install_full(binary, stdout, "", exit_code)
    }

    pub fn install_full(&self, binary: &str, stdout: &str, stderr: &str, exit_code: i32) -> Result<PathBuf> {
        let record = |suffix: &str| self.bin_dir().join(format!("{}.{}", binary, suffix));
        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&format!("printf '%s\\n' \"$@\" > '{}'\n", record("args").display()));
        script.push_str(&format!("pwd > '{}'\n", record("cwd").display()));
        script.push_str(&format!("env > '{}'\n", record("env").display()));
        if !stdout.is_empty() {
            script.push_str(&heredoc("cat", stdout));
        }
        if !stderr.is_empty() {
            script.push_str(&heredoc("cat >&2", stderr));
        }
        script.push_str(&format!("exit {}\n", exit_code));

        let path = self.bin_dir().join(binary);
        fs::write(&path, script).with_context(|| format!("writing fake {}", binary))?;
        make_executable(&path)?;
        Ok(path)
    }

    /// Installe un binaire qui dort plus longtemps que n'importe quel timeout de test
    pub fn install_hanging(&self, binary: &str, first_line: &str) -> Result<PathBuf> {
        let path = self.bin_dir().join(binary);
        let script = format!("#!/bin/sh\necho '{}'\nexec sleep 30\n", first_line.replace('\'', ""));
        fs::write(&path, script)?;
        make_executable(&path)?;
        Ok(path)
    }

    /// Arguments reçus lors du dernier appel de `binary`
    pub fn recorded_args(&self, binary: &str) -> Result<Vec<String>> {
        let raw = fs::read_to_string(self.bin_dir().join(format!("{}.args", binary)))
            .with_context(|| format!("{} was never invoked", binary))?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    /// Répertoire courant lors du dernier appel
    pub fn recorded_cwd(&self, binary: &str) -> Result<PathBuf> {
        let raw = fs::read_to_string(self.bin_dir().join(format!("{}.cwd", binary)))?;
        Ok(PathBuf::from(raw.trim_end()))
    }

    /// Variable d'environnement vue lors du dernier appel
    pub fn recorded_env(&self, binary: &str, key: &str) -> Result<Option<String>> {
        let raw = fs::read_to_string(self.bin_dir().join(format!("{}.env", binary)))?;
        let prefix = format!("{}=", key);
        Ok(raw
            .lines()
            .find_map(|line| line.strip_prefix(&prefix))
            .map(str::to_string))
    }
}

fn heredoc(command: &str, body: &str) -> String {
    let body = body.strip_suffix('\n').unwrap_or(body);
    format!("{} <<'{}'\n{}\n{}\n", command, HEREDOC_MARKER, body, HEREDOC_MARKER)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/*!
Projets Ansible temporaires

Chaque fixture vit dans son propre répertoire temporaire, supprimé au drop.
Arborescence par défaut:
- `inventory/hosts.ini`
- `site.yml`
- `roles/common/tasks/main.yml`
- `group_vars/all.yml`
*/

use ansible_orchestrator::config::ProjectDefinition;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DEFAULT_INVENTORY: &str = "[webservers]\nweb01\nweb02\n\n[dbservers]\ndb01\n";
pub const DEFAULT_PLAYBOOK: &str = "- hosts: all\n  roles:\n    - common\n";

pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Projet minimal prêt à être enregistré
    pub fn new() -> Result<Self> {
        let fixture = Self::empty()?;
        fixture.write("inventory/hosts.ini", DEFAULT_INVENTORY)?;
        fixture.write("site.yml", DEFAULT_PLAYBOOK)?;
        fixture.write("roles/common/tasks/main.yml", "- ping:\n")?;
        fixture.write("group_vars/all.yml", "ntp_server: pool.ntp.org\n")?;
        Ok(fixture)
    }

    /// Répertoire vide, sans inventaire ni playbook
    pub fn empty() -> Result<Self> {
        Ok(Self { dir: TempDir::new()? })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Écrit un fichier relatif à la racine, dossiers parents compris
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Définition pointant sur ce projet, inventaire `inventory/` et rôles `roles/`
    pub fn definition(&self, name: &str) -> ProjectDefinition {
        let mut project = ProjectDefinition::new(name, self.root());
        project.inventory = Some(PathBuf::from("inventory"));
        project.roles_path = vec![self.path("roles")];
        project
    }

    /// Emplacement conseillé pour un registre de test isolé
    pub fn registry_path(&self) -> PathBuf {
        self.path(".ansible-mcp-config.json")
    }
}

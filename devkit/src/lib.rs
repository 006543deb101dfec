/*!
# Ansible Orchestrator DevKit - Fixtures et Doublures pour Tests

Bibliothèque facilitant les tests de l'orchestrateur sans Ansible installé:
- Projets temporaires (inventaire, playbooks, rôles)
- Faux binaires `ansible-*` qui renvoient une sortie préparée
- Runner scripté en mémoire qui enregistre chaque commande
*/

pub mod fake_engine;
pub mod fixtures;
pub mod scripted_runner;

pub use fake_engine::FakeEngine;
pub use fixtures::ProjectFixture;
pub use scripted_runner::{adhoc_output, ScriptedRunner};

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Logs capturés par le harness de test (`RUST_LOG` respecté)
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ansible_orchestrator=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

//! Ansible Orchestrator - project-aware command orchestration for the Ansible CLI
//!
//! Pipeline for every operation:
//! - Resolve the execution context (explicit > project > env > default, per field)
//! - Build an immutable command spec for the engine binary
//! - Execute it with a mandatory timeout, stdout and stderr kept apart
//! - Interpret the output into structured values or a health score

pub mod commands;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod execution;
pub mod interpreters;
pub mod logging;
pub mod operations;
pub mod state;

pub use config::{EngineSettings, EnvMap, ProjectDefinition, ProjectRegistry};
pub use context::{resolve, ContextRequest, ExecutionContext};
pub use error::{OrchestratorError, Result};
pub use execution::{CommandRunner, ExecutionResult, ProcessExecutor};
pub use operations::Orchestrator;

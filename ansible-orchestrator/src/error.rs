//! Error taxonomy for the orchestration core
//!
//! Four families reach the caller:
//! - Configuration: unknown project, malformed registry, missing root
//! - Validation: missing or conflicting operation parameters
//! - Execution: the engine binary could not be started
//! - Parse: the engine emitted structured output we cannot read
//!
//! A non-zero exit code or a timeout is never an error here; both are
//! represented in `ExecutionResult`.

use std::path::PathBuf;

/// Maximum number of characters of raw output quoted in a parse error
pub const EXCERPT_LIMIT: usize = 200;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("project root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),
    #[error("invalid registry document {}: {reason}", path.display())]
    InvalidRegistry { path: PathBuf, reason: String },
    #[error("registry I/O failed for {}: {source}", path.display())]
    RegistryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid parameters: {0}")]
    Validation(String),
    #[error("failed to start `{program}`: {source}")]
    Execution {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {reason} (output: {excerpt:?})")]
    Parse {
        what: &'static str,
        reason: String,
        excerpt: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrchestratorError::Validation(message.into())
    }

    /// Build a parse error quoting at most `EXCERPT_LIMIT` characters of `raw`
    pub fn parse(what: &'static str, reason: impl ToString, raw: &str) -> Self {
        OrchestratorError::Parse {
            what,
            reason: reason.to_string(),
            excerpt: excerpt(raw),
        }
    }

    /// Stable kind used in structured error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::ProjectNotFound(_)
            | OrchestratorError::MissingRoot(_)
            | OrchestratorError::InvalidRegistry { .. }
            | OrchestratorError::RegistryIo { .. } => "configuration_error",
            OrchestratorError::Validation(_) => "validation_error",
            OrchestratorError::Execution { .. } => "execution_error",
            OrchestratorError::Parse { .. } => "parse_error",
            OrchestratorError::Io(_)
            | OrchestratorError::Json(_)
            | OrchestratorError::Yaml(_)
            | OrchestratorError::Pattern(_) => "internal_error",
        }
    }
}

/// Truncate on a char boundary, marking the cut with an ellipsis
pub fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(EXCERPT_LIMIT) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

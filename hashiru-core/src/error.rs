//! Error taxonomy for the orchestrator and its registries.
//!
//! Most variants surface to the model as a structured function-response rather than
//! propagating as a Rust `Err` (see [`crate::orchestrator`]); a few (budget/mode gating
//! before dispatch, backend streaming after retries exhausted) propagate to the turn loop,
//! which decides how each is surfaced.

use thiserror::Error;

/// Which budget dimension was exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetDimension {
    Resource,
    Expense,
}

impl std::fmt::Display for BudgetDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetDimension::Resource => write!(f, "resource"),
            BudgetDimension::Expense => write!(f, "expense"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HashiruError {
    #[error("{dimension} budget exceeded: requested {requested}, remaining {remaining}")]
    BudgetExceeded {
        dimension: BudgetDimension,
        requested: f64,
        remaining: f64,
    },

    #[error("tool/agent creation is disabled")]
    CreationDisabled,

    #[error("tool invocation is disabled")]
    InvocationDisabled,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent already exists: {0}")]
    AgentExists(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("backend error: {message}")]
    BackendError { message: String, retryable: bool },

    #[error("tool failed to load: {0}")]
    SchemaViolation(String),

    #[error("invariant violated: {0}")]
    InvariantError(String),

    #[error("turn cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HashiruError {
    /// `true` for transient backend errors worth retrying (rate limits, timeouts).
    pub fn is_retryable(&self) -> bool {
        matches!(self, HashiruError::BackendError { retryable: true, .. })
    }
}

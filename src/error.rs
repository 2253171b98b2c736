use std::{error::Error, fmt, result};

pub type Result<T, E = PipelineError> = result::Result<T, E>;

/// A warning surfaced during `Dag::render`. Never fatal: collected into a
/// [`crate::dag::RenderReport`] and logged, but does not abort the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// A SQL script's inferred created relation did not match its owning product.
    RelationMismatch {
        task: String,
        expected: String,
        found: String,
    },
    /// A render was attempted a second time on an already-rendered value.
    DuplicateRender { what: String },
    /// A param was declared in a task's params but never read during render.
    UnusedParam { task: String, key: String },
    /// A [`crate::product::MetaProduct`]'s components disagree on stored source code.
    DivergentStoredSource { task: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationWarning::RelationMismatch {
                task,
                expected,
                found,
            } => write!(
                f,
                "task '{task}': SQL script declares relation '{found}' but product is '{expected}'"
            ),
            ValidationWarning::DuplicateRender { what } => {
                write!(f, "'{what}' was rendered more than once; keeping first render")
            }
            ValidationWarning::UnusedParam { task, key } => {
                write!(f, "task '{task}': param '{key}' was never used while rendering")
            }
            ValidationWarning::DivergentStoredSource { task } => write!(
                f,
                "task '{task}': MetaProduct components disagree on stored source code"
            ),
        }
    }
}

#[derive(Debug)]
pub enum PipelineError {
    /// The DAG contains a cycle; raised at render, fatal for the whole DAG.
    CycleDetected(Vec<String>),
    /// An identifier or source was read before being rendered.
    NotRendered(String),
    /// A strict template referenced a variable that was not supplied.
    RenderFailed { template: String, missing: String },
    /// A rendered relation name exceeded the backend's identifier length limit.
    InvalidIdentifier(String),
    /// A task's `run()` failed: non-zero exit, SQL error, or callable error.
    TaskRunFailed { task: String, reason: String },
    /// Infrastructure failure talking to a Client (filesystem, db, shell).
    ClientError(String),
    /// Programmer error / invariant violation not covered by the above.
    Internal(String),
}

impl Error for PipelineError {}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::CycleDetected(cycle) => {
                write!(f, "dag contains a cycle: {}", cycle.join(" -> "))
            }
            PipelineError::NotRendered(what) => {
                write!(f, "'{what}' was read before it was rendered")
            }
            PipelineError::RenderFailed { template, missing } => write!(
                f,
                "strict render of '{template}' failed: missing variable '{missing}'"
            ),
            PipelineError::InvalidIdentifier(s) => write!(f, "invalid identifier: {s}"),
            PipelineError::TaskRunFailed { task, reason } => {
                write!(f, "task '{task}' failed: {reason}")
            }
            PipelineError::ClientError(s) => write!(f, "client error: {s}"),
            PipelineError::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::ClientError(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Internal(format!("metadata serde error: {e}"))
    }
}

impl From<base64::DecodeError> for PipelineError {
    fn from(e: base64::DecodeError) -> Self {
        PipelineError::Internal(format!("metadata base64 error: {e}"))
    }
}

impl From<minijinja::Error> for PipelineError {
    fn from(e: minijinja::Error) -> Self {
        PipelineError::RenderFailed {
            template: e.name().unwrap_or("<unknown>").to_string(),
            missing: e.to_string(),
        }
    }
}

impl From<diesel::result::Error> for PipelineError {
    fn from(e: diesel::result::Error) -> Self {
        PipelineError::ClientError(format!("postgres error: {e}"))
    }
}

impl From<diesel_async::pooled_connection::PoolError> for PipelineError {
    fn from(e: diesel_async::pooled_connection::PoolError) -> Self {
        PipelineError::ClientError(format!("postgres connection error: {e}"))
    }
}

impl From<diesel_async::pooled_connection::bb8::RunError> for PipelineError {
    fn from(e: diesel_async::pooled_connection::bb8::RunError) -> Self {
        PipelineError::ClientError(format!("postgres pool error: {e}"))
    }
}

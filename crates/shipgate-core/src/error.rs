//! Domain-level error taxonomy for shipgate.

/// Errors produced by quality gate evaluation.
///
/// Transient analyzer trouble (spawn failure, timeout, unparseable output)
/// is folded into [`GateError::Analysis`]; a score below threshold is not an
/// error at all and surfaces as an aborted pipeline outcome instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    #[error("code set is empty: nothing to analyze")]
    EmptyCodeSet,

    #[error("threshold {0} is outside the valid range [0, 10]")]
    InvalidThreshold(f64),

    #[error("analysis failed: {0}")]
    Analysis(String),
}

/// Errors produced while building the deployment notification.
///
/// Raised before any network call is made.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("deployment credential rejected: {0}")]
    Auth(String),
}

/// shipgate pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid trigger event: {0}")]
    InvalidEvent(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("quality gate error: {0}")]
    Gate(#[from] GateError),

    #[error("notifier error: {0}")]
    Auth(#[from] NotifyError),
}

/// Result type for shipgate pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

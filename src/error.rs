use thiserror::Error;

/// Errors surfaced by the scheduler, tracker and checkpoint store.
///
/// Configuration problems are fatal at attach time; the loop never starts
/// in an inconsistent state. Mid-run evaluation failures propagate to the
/// caller immediately, since a silently missing data point would corrupt
/// the optimum-tracking invariant.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid optimization configuration: {0}")]
    Configuration(String),

    #[error("unknown objective/evaluation function '{0}'")]
    UnknownFunction(String),

    #[error("checkpoint write at index {index} would leave a gap (key '{key}' holds {len} records)")]
    CheckpointIndex { key: String, index: usize, len: usize },

    #[error("system rejected parameter snapshot: {0}")]
    ParameterState(String),

    #[error("evaluation of '{function}' failed: {reason}")]
    Evaluation { function: String, reason: String },
}

pub type Result<T> = std::result::Result<T, TrainError>;

use mid_core::Condition;
use std::path::PathBuf;

/// Failures that abort a session. Cancellation and missed responses are
/// ordinary outcomes and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("condition `{0}` is not configured")]
    UnknownCondition(String),

    #[error("staircase for `{0}` has no trials left")]
    StaircaseExhausted(Condition),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to persist trial data: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("failed to encode trial data: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{available} order files available but {required} runs configured")]
    OrderExhausted { available: usize, required: usize },

    #[error("{path}: {rows} rows but {required} trials per run configured")]
    OrderTooShort {
        path: PathBuf,
        rows: usize,
        required: usize,
    },

    #[error("orders ask for {rows} `{condition}` trials but its staircase allows {budget}")]
    OverBudget {
        condition: Condition,
        rows: usize,
        budget: usize,
    },

    #[error("{path}: missing column `{column}`")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;

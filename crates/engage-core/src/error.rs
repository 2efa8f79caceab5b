use thiserror::Error;

use crate::types::ActionKind;

#[derive(Debug, Error)]
pub enum EngageError {
    #[error("not initialized: run 'engagerunner init'")]
    NotInitialized,

    #[error("could not parse timestamp '{0}'")]
    Parse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("discovery failed for '{video}': {reason}")]
    Surface { video: String, reason: String },

    #[error("{action} on {item_id} failed after {attempts} attempts: {reason}")]
    RetryableActionFailure {
        item_id: String,
        action: ActionKind,
        attempts: u32,
        reason: String,
    },

    #[error(
        "{action} on {item_id} failed fatally: {reason} (last recorded: {})",
        .last_recorded.as_deref().unwrap_or("none")
    )]
    FatalActionFailure {
        item_id: String,
        action: ActionKind,
        reason: String,
        last_recorded: Option<String>,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("run timed out after {0} seconds")]
    RunTimedOut(u64),

    #[error("home directory not found: set HOME or ENGAGERUNNER_HOME")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngageError {
    /// Errors that should stop the whole run rather than a single item or video.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngageError::Parse(_)
                | EngageError::Surface { .. }
                | EngageError::RetryableActionFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngageError>;

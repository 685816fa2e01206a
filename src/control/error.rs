use crate::config::ConfigError;
use crate::llm::LLMError;
use crate::supervisor::SupervisorError;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, ControlError>;

/// Failure classes reported to callers, independent of which component
/// raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidRequest,
    SpawnFailure,
    TerminationFailure,
    UpstreamUnreachable,
    UpstreamEmpty,
    UpstreamInvalidResponse,
    ConfigInvalid,
    PersistenceFailure,
    Unsupported,
}

impl ErrorKind {
    /// Whether repeating the same call may succeed
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamUnreachable
                | ErrorKind::UpstreamEmpty
                | ErrorKind::PersistenceFailure
        )
    }
}

/// Control plane errors
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Worker '{0}' is not defined in the configuration")]
    WorkerNotDefined(String),

    #[error("Worker '{0}' is already running")]
    WorkerAlreadyRunning(String),

    #[error("Worker '{0}' is not running")]
    WorkerNotRunning(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Llm(#[from] LLMError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ControlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ControlError::WorkerNotDefined(_) => ErrorKind::NotFound,
            ControlError::WorkerAlreadyRunning(_) | ControlError::WorkerNotRunning(_) => {
                ErrorKind::Conflict
            }
            ControlError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ControlError::Supervisor(e) => match e {
                SupervisorError::TerminationFailed { .. } => ErrorKind::TerminationFailure,
                SupervisorError::InvalidCommand(_)
                | SupervisorError::ExecutableNotFound(_)
                | SupervisorError::SpawnFailed { .. }
                | SupervisorError::LogSink { .. } => ErrorKind::SpawnFailure,
            },
            ControlError::Llm(e) => match e {
                LLMError::UpstreamUnreachable(_) => ErrorKind::UpstreamUnreachable,
                LLMError::EmptyResponse(_) => ErrorKind::UpstreamEmpty,
                LLMError::InvalidResponse(_) => ErrorKind::UpstreamInvalidResponse,
                LLMError::Unsupported(_) => ErrorKind::Unsupported,
                LLMError::InvalidConfig(_) => ErrorKind::ConfigInvalid,
            },
            ControlError::Config(e) => match e {
                ConfigError::Invalid(_) | ConfigError::Serialization(_) => {
                    ErrorKind::ConfigInvalid
                }
                ConfigError::Persist { .. } | ConfigError::Read { .. } => {
                    ErrorKind::PersistenceFailure
                }
            },
            ControlError::Task(_) => ErrorKind::TerminationFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

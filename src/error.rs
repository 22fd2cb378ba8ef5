//! Error types for the mint claim orchestration core

use thiserror::Error;
use crate::executor::MintOutcome;

/// Failures of the durable claim status store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Status store unavailable during {operation}: {message}")]
    Unavailable {
        operation: String,
        message: String,
    },

    #[error("Unrecognised status {value:?} stored for {key}")]
    Corrupt {
        key: String,
        value: String,
    },
}

impl StoreError {
    pub fn unavailable(operation: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }
}

/// Reservation rejections raised by the claim coordinator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("A mint for {key} is already in progress")]
    AlreadyInProgress { key: String },

    #[error("{key} has already claimed its token")]
    AlreadyCompleted { key: String },

    #[error("{key} already used its single mint attempt")]
    AttemptConsumed { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures obtaining an access credential
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Login request failed: {message}")]
    Transport { message: String },

    #[error("Login rejected: {message}")]
    Rejected { message: String },

    #[error("Login response did not contain a token")]
    MissingToken,
}

/// Failures talking to the remote minting service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("Minting service error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {message}")]
    Decode { message: String },

    #[error("Could not read {path}: {message}")]
    File { path: String, message: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode {
                message: err.to_string(),
            }
        } else {
            ApiError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode {
            message: err.to_string(),
        }
    }
}

/// Failures while waiting for a remote task to finish
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("Polling task status failed: {0}")]
    Transport(ApiError),

    #[error("Remote task failed: {0}")]
    RemoteReportedFailure(String),

    #[error("Remote task {task_id} did not finish after {attempts} polls ({elapsed_ms}ms)")]
    Timeout {
        task_id: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    #[error("Polling remote task {task_id} was cancelled")]
    Cancelled { task_id: String },
}

/// Error returned by a mint attempt
///
/// Collaborator failures are wrapped transparently so the caller sees the
/// collaborator's own message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintError {
    #[error(transparent)]
    AlreadyClaimed(ClaimError),

    #[error("Invalid mint parameters: {message}")]
    InvalidParams { message: String },

    #[error(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    Lookup(ApiError),

    #[error(transparent)]
    Metadata(ApiError),

    #[error(transparent)]
    Submit(ApiError),

    #[error(transparent)]
    Poll(PollError),

    #[error("Mint attempt cancelled during {step}")]
    Cancelled { step: String },

    #[error(transparent)]
    Store(StoreError),

    #[error(
        "Token {} was minted for {} but its claim could not be recorded: {source}",
        .outcome.token_id,
        .outcome.address
    )]
    Unrecorded {
        outcome: Box<MintOutcome>,
        source: StoreError,
    },
}

impl MintError {
    /// Whether the claim was refused before any remote call was made
    pub fn is_rejection(&self) -> bool {
        matches!(self, MintError::AlreadyClaimed(_) | MintError::InvalidParams { .. })
    }
}

impl From<ClaimError> for MintError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Store(store) => MintError::Store(store),
            other => MintError::AlreadyClaimed(other),
        }
    }
}

impl From<StoreError> for MintError {
    fn from(err: StoreError) -> Self {
        MintError::Store(err)
    }
}

impl From<AuthError> for MintError {
    fn from(err: AuthError) -> Self {
        MintError::Auth(err)
    }
}

impl From<PollError> for MintError {
    fn from(err: PollError) -> Self {
        MintError::Poll(err)
    }
}

/// Error returned by the contract deployment flow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Submit(#[from] ApiError),

    #[error(transparent)]
    Poll(#[from] PollError),
}

/// Invalid or unreadable configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Configuration error in {field}: {message}")]
pub struct ConfigError {
    pub message: String,
    pub field: String,
}

impl ConfigError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: field.to_string(),
        }
    }
}

/// Failure assembling components from configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Could not build HTTP client: {0}")]
    Client(#[from] ApiError),
}

/// Type alias for the result of a mint attempt
pub type MintResult<T> = Result<T, MintError>;

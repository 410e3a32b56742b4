/// Errors raised by the media-server client
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Synchronization switched off in configuration
    #[error("emby sync is disabled")]
    SyncDisabled,

    #[error("emby api key rejected")]
    Unauthorized,

    #[error("emby user not found")]
    UserNotFound,

    #[error("emby user already exists")]
    UserAlreadyExists,

    /// Transport failure (connect, timeout, reset)
    #[error("emby server unavailable: {0}")]
    ServerUnavailable(String),

    /// Any other non-success status
    #[error("emby server error (status {status}): {body}")]
    Server { status: u16, body: String },

    #[error("invalid response from emby: {0}")]
    InvalidResponse(String),

    /// Request could not be built
    #[error("emby client error: {0}")]
    Client(String),
}

impl RemoteError {
    /// Terminal errors are never retried
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized
                | RemoteError::UserNotFound
                | RemoteError::UserAlreadyExists
                | RemoteError::SyncDisabled
                | RemoteError::Client(_)
        )
    }

    /// Chat-safe rendering that leaves out the response body
    pub fn summary(&self) -> String {
        match self {
            RemoteError::Server { status, .. } => format!("emby server error (status {})", status),
            RemoteError::ServerUnavailable(_) => "emby server unavailable".to_string(),
            RemoteError::InvalidResponse(_) => "invalid response from emby".to_string(),
            other => other.to_string(),
        }
    }

    /// Map an HTTP status and body to an error kind
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => RemoteError::Unauthorized,
            404 => RemoteError::UserNotFound,
            409 => RemoteError::UserAlreadyExists,
            _ => RemoteError::Server { status, body },
        }
    }
}

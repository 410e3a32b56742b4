/// Unified error types for the account bot
use crate::remote::RemoteError;
use thiserror::Error;

/// Main error type for the bot services
#[derive(Error, Debug)]
pub enum BotError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed input (username, password, day count, ...)
    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Entity lookup failed
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint conflict (duplicate username, code collision)
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Ownership mismatch or non-admin attempting an admin action
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Zero quota
    #[error("please contact admin for authorization")]
    NotAuthorized,

    #[error("account quota exceeded ({used}/{quota})")]
    QuotaExceeded { used: i64, quota: i64 },

    #[error("account limit reached ({used}/{limit})")]
    AccountLimitExceeded { used: i64, limit: i64 },

    #[error("account {0} has expired")]
    Expired(String),

    #[error("account {0} is suspended")]
    Suspended(String),

    /// Blocked principal
    #[error("user is blocked")]
    Blocked,

    #[error("invalid role: {0}")]
    InvalidRole(String),

    // Invite code errors
    #[error("invalid invite code")]
    InvalidCode,

    #[error("invite code has expired")]
    CodeExpired,

    #[error("invite code has been used up")]
    CodeExhausted,

    #[error("invite code has been revoked")]
    CodeRevoked,

    #[error("you have already used an invite code")]
    AlreadyUsed,

    #[error("you already have account quota")]
    HasQuota,

    #[error("max uses must be -1 or a positive integer")]
    InvalidMaxUses,

    /// Remote media-server errors surfaced on admin paths
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BotError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Map a unique-constraint violation to `AlreadyExists`, everything else to `Database`
    pub fn from_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                BotError::AlreadyExists(what.into())
            }
            _ => BotError::Database(err),
        }
    }

    /// Text safe to show to an end user
    pub fn user_message(&self) -> String {
        match self {
            BotError::Database(_) | BotError::Io(_) | BotError::Internal(_) => {
                "Internal error, please try again later".to_string() // Don't leak details
            }
            BotError::Config(_) => "Service is misconfigured, please contact admin".to_string(),
            BotError::Remote(e) => format!("Media server error: {}", e.summary()),
            other => other.to_string(),
        }
    }

    /// Whether the error is a caller mistake rather than a system failure
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            BotError::Database(_)
                | BotError::Io(_)
                | BotError::Internal(_)
                | BotError::Config(_)
                | BotError::Remote(_)
        )
    }
}

/// Result type alias for bot operations
pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = BotError::validation("username", "too short");
        assert_eq!(err.to_string(), "validation failed for username: too short");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = BotError::Internal("stack detail".to_string());
        assert!(!err.user_message().contains("stack detail"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_remote_body_is_not_shown() {
        let err = BotError::Remote(RemoteError::Server {
            status: 502,
            body: "upstream proxy detail".to_string(),
        });
        assert_eq!(
            err.user_message(),
            "Media server error: emby server error (status 502)"
        );
        assert!(err.to_string().contains("upstream proxy detail"));
    }

    #[test]
    fn test_quota_messages() {
        let err = BotError::QuotaExceeded { used: 2, quota: 2 };
        assert_eq!(err.user_message(), "account quota exceeded (2/2)");
        assert_eq!(
            BotError::NotAuthorized.user_message(),
            "please contact admin for authorization"
        );
    }
}

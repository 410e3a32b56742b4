/// Input validation for usernames, passwords and numeric arguments
///
/// Usernames are ASCII letters, digits and underscore, 3 to 32 characters,
/// compared case-insensitively after `sanitize_username`.
use crate::error::{BotError, BotResult};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 64;
pub const MAX_RENEW_DAYS: i64 = 3650;
pub const MAX_DEVICES: i64 = 100;

/// Trim and lowercase a username
pub fn sanitize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Trim and uppercase an invite code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn validate_username(username: &str) -> BotResult<()> {
    if username.is_empty() {
        return Err(BotError::validation("username", "cannot be empty"));
    }

    if username.len() < USERNAME_MIN_LEN {
        return Err(BotError::validation(
            "username",
            format!("must be at least {} characters", USERNAME_MIN_LEN),
        ));
    }

    if username.len() > USERNAME_MAX_LEN {
        return Err(BotError::validation(
            "username",
            format!("must be at most {} characters", USERNAME_MAX_LEN),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(BotError::validation(
            "username",
            "may only contain letters, digits and underscore",
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> BotResult<()> {
    if password.is_empty() {
        return Err(BotError::validation("password", "cannot be empty"));
    }

    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(BotError::validation(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN_LEN),
        ));
    }

    if len > PASSWORD_MAX_LEN {
        return Err(BotError::validation(
            "password",
            format!("must be at most {} characters", PASSWORD_MAX_LEN),
        ));
    }

    Ok(())
}

pub fn validate_days(days: i64) -> BotResult<()> {
    if days <= 0 {
        return Err(BotError::validation("days", "must be greater than 0"));
    }

    if days > MAX_RENEW_DAYS {
        return Err(BotError::validation(
            "days",
            format!("cannot exceed {}", MAX_RENEW_DAYS),
        ));
    }

    Ok(())
}

pub fn validate_max_devices(max_devices: i64) -> BotResult<()> {
    if max_devices <= 0 {
        return Err(BotError::validation("max_devices", "must be greater than 0"));
    }

    if max_devices > MAX_DEVICES {
        return Err(BotError::validation(
            "max_devices",
            format!("cannot exceed {}", MAX_DEVICES),
        ));
    }

    Ok(())
}

/// Command handlers, grouped by audience
///
/// Each handler has the same shape, `async fn(&Bot, &Invocation) -> BotResult<Reply>`.
/// Errors are rendered by the dispatcher with `BotError::user_message`.

pub(super) mod admin;
pub(super) mod invite;
pub(super) mod media;
pub(super) mod user;

use crate::error::{BotError, BotResult};

/// Parse a numeric argument, naming the field on failure
pub(super) fn parse_i64(value: &str, field: &str) -> BotResult<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| BotError::validation(field, "must be a whole number"))
}

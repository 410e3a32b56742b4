/// Free-text replies to a pending conversation prompt
///
/// Recoverable mistakes (bad format, taken username, unknown code) keep the
/// prompt open so the user can try again. Anything else ends the flow.
use super::{
    format::{account_renewed, escape_html, password_changed},
    handlers::{invite, user as user_cmd},
    log_failure, Bot, Reply,
};
use crate::{
    conversation::ConversationState,
    error::{BotError, BotResult},
    user::User,
};

fn retryable(state: ConversationState, err: &BotError) -> bool {
    match state {
        ConversationState::WaitingUsername => {
            matches!(err, BotError::Validation { .. } | BotError::AlreadyExists(_))
        }
        ConversationState::WaitingPassword { .. } | ConversationState::WaitingDays { .. } => {
            matches!(err, BotError::Validation { .. })
        }
        ConversationState::WaitingInviteCode => matches!(err, BotError::InvalidCode),
        ConversationState::Idle => false,
    }
}

async fn run(bot: &Bot, user: &User, state: ConversationState, text: &str) -> BotResult<Reply> {
    match state {
        ConversationState::WaitingUsername => user_cmd::create_account(bot, user, text).await,
        ConversationState::WaitingPassword { account_id } => {
            let account = bot.accessible_account(user, account_id).await?;
            bot.ctx.accounts.change_password(account.id, text).await?;
            Ok(Reply::text(password_changed(&account.username, text)))
        }
        ConversationState::WaitingDays { account_id } => {
            let days = super::handlers::parse_i64(text, "days")?;
            let account = bot.accessible_account(user, account_id).await?;
            let renewed = bot.ctx.accounts.renew(account.id, days).await?;
            Ok(Reply::text(account_renewed(&renewed, days)))
        }
        ConversationState::WaitingInviteCode => invite::redeem_code(bot, user, text).await,
        ConversationState::Idle => Ok(Reply::text("Nothing is pending, use /start")),
    }
}

pub(super) async fn handle(bot: &Bot, user: &User, state: ConversationState, text: &str) -> Reply {
    let text = text.trim();

    match run(bot, user, state, text).await {
        Ok(reply) => {
            bot.ctx.conversations.clear_state(user.telegram_id).await;
            reply
        }
        Err(e) if retryable(state, &e) => {
            log_failure("conversation input", &e);
            Reply::text(format!(
                "❌ {}\n\nPlease try again, or send /cancel.",
                escape_html(&e.user_message())
            ))
        }
        Err(e) => {
            log_failure("conversation input", &e);
            bot.ctx.conversations.clear_state(user.telegram_id).await;
            Reply::text(format!("❌ {}", escape_html(&e.user_message())))
        }
    }
}

/// Inline button clicks
///
/// Tokens are `:`-separated, see `keyboard` for the builders. Screens that
/// belong to a single account go through the same access check as the
/// matching commands.
use super::{
    format::{account_detail, account_renewed, escape_html},
    handlers::{admin, invite, user as user_cmd},
    keyboard::{self, Keyboard},
    Bot, Reply,
};
use crate::{
    conversation::ConversationState,
    error::{BotError, BotResult},
    user::User,
};
use tracing::info;

/// What to do with the clicked message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackResponse {
    /// Toast or alert text, may be empty
    pub answer: String,
    pub show_alert: bool,
    /// Replacement text for the message carrying the buttons
    pub edit_text: Option<String>,
    pub buttons: Keyboard,
}

impl CallbackResponse {
    /// Modal alert, message left untouched
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
            show_alert: true,
            ..Default::default()
        }
    }

    /// Short toast, message left untouched
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
            ..Default::default()
        }
    }

    /// Replace the message with a new screen
    pub fn screen(text: impl Into<String>, buttons: Keyboard) -> Self {
        Self {
            edit_text: Some(text.into()),
            buttons,
            ..Default::default()
        }
    }

    fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = answer.into();
        self
    }
}

impl From<Reply> for CallbackResponse {
    fn from(reply: Reply) -> Self {
        CallbackResponse::screen(reply.text, reply.buttons)
    }
}

fn parse_id(value: &str) -> BotResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| BotError::validation("button", "malformed action"))
}

fn require_admin(bot: &Bot, user: &User) -> BotResult<()> {
    if bot.ctx.users.is_admin(user) {
        Ok(())
    } else {
        Err(BotError::Unauthorized("admin rights required".to_string()))
    }
}

async fn account_screen(bot: &Bot, user: &User, id: i64) -> BotResult<CallbackResponse> {
    let account = bot.accessible_account(user, id).await?;
    let is_admin = bot.ctx.users.is_admin(user);
    Ok(CallbackResponse::screen(
        account_detail(&account),
        keyboard::account_actions(account.id, account.status, is_admin),
    ))
}

pub(super) async fn handle(bot: &Bot, user: &User, data: &str) -> BotResult<CallbackResponse> {
    let parts: Vec<&str> = data.split(':').collect();
    let is_admin = bot.ctx.users.is_admin(user);

    match parts.as_slice() {
        ["menu", "main"] => {
            bot.ctx.conversations.clear_state(user.telegram_id).await;
            Ok(CallbackResponse::screen(
                format!(
                    "🏠 <b>Main menu</b>\n\nHello, {}!",
                    escape_html(&user.display_name())
                ),
                keyboard::main_menu(is_admin),
            ))
        }
        ["menu", "help"] => Ok(CallbackResponse::screen(
            user_cmd::help_text(is_admin, false),
            keyboard::back_to(keyboard::MAIN_MENU),
        )),
        ["accounts", "list"] => Ok(user_cmd::my_accounts_reply(bot, user).await?.into()),

        ["account", "info", id] => account_screen(bot, user, parse_id(id)?).await,
        ["account", "renew", id] => {
            let account = bot.accessible_account(user, parse_id(id)?).await?;
            Ok(CallbackResponse::screen(
                format!(
                    "🔄 <b>Renew {}</b>\n\nPick a period or enter a custom number of days.",
                    account.username
                ),
                keyboard::renew_options(account.id),
            ))
        }
        ["account", "days", id] => {
            let account = bot.accessible_account(user, parse_id(id)?).await?;
            bot.ctx
                .conversations
                .set_state(
                    user.telegram_id,
                    ConversationState::WaitingDays {
                        account_id: account.id,
                    },
                )
                .await;
            Ok(CallbackResponse::screen(
                format!(
                    "🔄 <b>Renew {}</b>\n\nSend the number of days (1-3650), or /cancel.",
                    account.username
                ),
                keyboard::back_to(&keyboard::account_info(account.id)),
            ))
        }
        ["account", "pwd", id] => {
            let account = bot.accessible_account(user, parse_id(id)?).await?;
            let reply =
                user_cmd::start_password_change(bot, user, account.id, &account.username).await?;
            Ok(reply.into())
        }
        ["account", "del", id] => {
            require_admin(bot, user)?;
            let account = bot.ctx.accounts.get(parse_id(id)?).await?;
            Ok(CallbackResponse::screen(
                format!(
                    "⚠️ <b>Delete {}?</b>\n\nThe account is removed here and on the media server. \
                     This cannot be undone.",
                    account.username
                ),
                keyboard::confirm(
                    keyboard::confirm_delete(account.id),
                    &keyboard::account_info(account.id),
                ),
            ))
        }

        ["create", "start"] => Ok(user_cmd::start_create(bot, user).await?.into()),
        ["redeem", "start"] => Ok(invite::start_redeem(bot, user).await?.into()),

        ["admin", "menu"] => {
            require_admin(bot, user)?;
            Ok(admin::menu_reply().into())
        }
        ["admin", "stats"] => {
            require_admin(bot, user)?;
            Ok(CallbackResponse::screen(
                admin::stats_text(bot).await?,
                keyboard::back_to(keyboard::ADMIN_MENU),
            ))
        }
        ["admin", "suspend", id] => {
            require_admin(bot, user)?;
            let id = parse_id(id)?;
            bot.ctx.accounts.suspend(id).await?;
            Ok(account_screen(bot, user, id).await?.with_answer("Account suspended"))
        }
        ["admin", "activate", id] => {
            require_admin(bot, user)?;
            let id = parse_id(id)?;
            bot.ctx.accounts.activate(id).await?;
            Ok(account_screen(bot, user, id).await?.with_answer("Account activated"))
        }

        ["confirm", "renew", id, days] => {
            let account = bot.accessible_account(user, parse_id(id)?).await?;
            let days = parse_id(days)?;
            let renewed = bot.ctx.accounts.renew(account.id, days).await?;
            Ok(CallbackResponse::screen(
                account_renewed(&renewed, days),
                keyboard::back_to(&keyboard::account_info(renewed.id)),
            )
            .with_answer("Renewed"))
        }
        ["confirm", "delete", id] => {
            require_admin(bot, user)?;
            let account = bot.ctx.accounts.get(parse_id(id)?).await?;
            bot.ctx.accounts.delete(account.id).await?;
            info!("{} deleted account {}", user.display_name(), account.username);
            Ok(CallbackResponse::screen(
                format!("✅ Account <b>{}</b> deleted", account.username),
                keyboard::back_to(keyboard::MY_ACCOUNTS),
            ))
        }

        ["cancel"] => {
            bot.ctx.conversations.clear_state(user.telegram_id).await;
            Ok(CallbackResponse::screen(
                "Operation cancelled",
                keyboard::main_menu(is_admin),
            ))
        }

        _ => Ok(CallbackResponse::alert("Unknown action")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_becomes_screen() {
        let response: CallbackResponse = Reply::text("hi").with_buttons(keyboard::cancel_only()).into();
        assert_eq!(response.edit_text.as_deref(), Some("hi"));
        assert_eq!(response.buttons.len(), 1);
        assert!(!response.show_alert);
    }

    #[test]
    fn test_malformed_id() {
        assert!(parse_id("12").is_ok());
        assert!(matches!(parse_id("x"), Err(BotError::Validation { .. })));
    }
}

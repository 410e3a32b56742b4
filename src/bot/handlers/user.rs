/// Commands available to every user
use super::parse_i64;
use crate::{
    bot::{
        format::{account_created, account_detail, account_list, account_renewed, escape_html,
            password_changed},
        keyboard, Bot, Invocation, Reply,
    },
    conversation::ConversationState,
    error::{BotError, BotResult},
    user::User,
};

pub async fn start(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let name = escape_html(&inv.user.display_name());

    if inv.is_group {
        let mut text = "👋 <b>Welcome to the Emby account bot!</b>\n\n\
             ⚠️ Account operations only work in a <b>private chat</b>.\n\
             💡 Open a private chat with the bot and send /help."
            .to_string();
        if inv.is_admin {
            text.push_str("\n\n🔑 Admin commands here: /grant /stats /checkemby");
        }
        return Ok(Reply::text(text));
    }

    let mut text = format!(
        "👋 <b>Welcome to the Emby account bot!</b>\n\nHello, {}!\n\n\
         Use the buttons below or send a command.",
        name
    );
    if inv.user.account_quota == 0 && !inv.is_admin {
        text.push_str(
            "\n\n🔒 You cannot create accounts yet. Redeem an invite code with /redeem \
             or ask an admin for a quota.",
        );
    }

    Ok(Reply::text(text).with_buttons(keyboard::main_menu(inv.is_admin)))
}

pub fn help_text(is_admin: bool, is_group: bool) -> String {
    if is_group {
        let mut help = "📚 <b>Help</b>\n\n\
             /start - open the bot\n\
             /help - show this help\n\n\
             ⚠️ All account operations happen in a <b>private chat</b>."
            .to_string();
        if is_admin {
            help.push_str(
                "\n\n🔑 <b>Admin:</b>\n\
                 /grant [user] [quota] - allow a user to create accounts\n\
                 /stats - system statistics\n\
                 /checkemby - media server status\n\
                 /playingstats - current playback\n\
                 /generatecode /listcodes - invite codes",
            );
        }
        return help;
    }

    let mut help = "📚 <b>Help</b>\n\n\
         <b>Basics:</b>\n\
         /start - main menu\n\
         /help - show this help\n\
         /cancel - abort the current operation\n\n\
         <b>Accounts:</b>\n\
         /myaccounts - list your accounts\n\
         /create [username] - create an account\n\
         /info &lt;username&gt; - account details\n\
         /renew &lt;username&gt; [days] - extend an account\n\
         /changepassword &lt;username&gt; [password] - change the password\n\
         /syncstatus &lt;username&gt; - media server sync state\n\
         /quota - your account quota\n\
         /redeem [code] - redeem an invite code\n\n\
         <b>Notes:</b>\n\
         • New accounts get a strong generated password\n\
         • Expired accounts need a renewal before they work again"
        .to_string();
    if is_admin {
        help.push_str("\n\n🔑 You are an admin, send /admin for admin commands");
    }
    help
}

pub async fn help(_bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    Ok(Reply::text(help_text(inv.is_admin, inv.is_group)))
}

pub async fn my_accounts(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    my_accounts_reply(bot, &inv.user).await
}

pub(crate) async fn my_accounts_reply(bot: &Bot, user: &User) -> BotResult<Reply> {
    let accounts = bot.ctx.accounts.list_by_user(user.id).await?;
    if accounts.is_empty() {
        return Ok(Reply::text(
            "📋 You have no accounts yet.\n\nUse /create to create one.",
        )
        .with_buttons(vec![
            vec![keyboard::Button::new("➕ Create account", keyboard::CREATE_START)],
            vec![keyboard::Button::new("⬅️ Main menu", keyboard::MAIN_MENU)],
        ]));
    }

    let mut text = account_list(&accounts);
    text.push_str("💡 Tap an account for details");

    let mut rows: keyboard::Keyboard = accounts
        .iter()
        .map(|a| {
            vec![keyboard::Button::new(
                format!("📝 {}", a.username),
                keyboard::account_info(a.id),
            )]
        })
        .collect();
    rows.push(vec![keyboard::Button::new("⬅️ Main menu", keyboard::MAIN_MENU)]);

    Ok(Reply::text(text).with_buttons(rows))
}

pub async fn create(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    match inv.arg(0) {
        Some(username) => create_account(bot, &inv.user, username).await,
        None => start_create(bot, &inv.user).await,
    }
}

/// Enter the username prompt, unless the user has no quota at all
pub(crate) async fn start_create(bot: &Bot, user: &User) -> BotResult<Reply> {
    if user.account_quota <= 0 {
        return Ok(not_authorized());
    }

    bot.ctx
        .conversations
        .set_state(user.telegram_id, ConversationState::WaitingUsername)
        .await;

    Ok(Reply::text(format!(
        "➕ <b>New account</b>\n\nSend the username for the new account, for example \
         <code>{}john</code>.\n\n\
         • letters, digits and underscores\n\
         • 3 to 32 characters\n\n\
         Send /cancel to abort.",
        escape_html(&bot.ctx.config.account.username_prefix)
    ))
    .with_buttons(keyboard::cancel_only()))
}

fn not_authorized() -> Reply {
    Reply::text(
        "❌ You are not allowed to create accounts yet.\n\n\
         Redeem an invite code with /redeem or ask an admin for a quota.",
    )
}

pub(crate) async fn create_account(bot: &Bot, user: &User, username: &str) -> BotResult<Reply> {
    let (account, password) = match bot.ctx.accounts.create(username, user.id).await {
        Ok(created) => created,
        Err(BotError::NotAuthorized) => return Ok(not_authorized()),
        Err(e) => return Err(e),
    };

    Ok(Reply::text(account_created(&account, &password)).with_buttons(vec![
        vec![keyboard::Button::new("📝 Details", keyboard::account_info(account.id))],
        vec![
            keyboard::Button::new("📋 My accounts", keyboard::MY_ACCOUNTS),
            keyboard::Button::new("⬅️ Main menu", keyboard::MAIN_MENU),
        ],
    ]))
}

pub async fn info(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/info <username>")?;
    let account = bot.accessible_account_by_name(&inv.user, username).await?;

    Ok(Reply::text(account_detail(&account))
        .with_buttons(keyboard::account_actions(account.id, account.status, inv.is_admin)))
}

pub async fn renew(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/renew <username> [days]")?;
    let account = bot.accessible_account_by_name(&inv.user, username).await?;

    let Some(days) = inv.arg(1) else {
        bot.ctx
            .conversations
            .set_state(
                inv.user.telegram_id,
                ConversationState::WaitingDays {
                    account_id: account.id,
                },
            )
            .await;
        return Ok(Reply::text(format!(
            "🔄 <b>Renew {}</b>\n\nSend the number of days (1-3650), or /cancel.",
            account.username
        ))
        .with_buttons(keyboard::renew_options(account.id)));
    };

    let days = parse_i64(days, "days")?;
    let renewed = bot.ctx.accounts.renew(account.id, days).await?;
    Ok(Reply::text(account_renewed(&renewed, days)))
}

pub async fn change_password(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/changepassword <username> [password]")?;
    let account = bot.accessible_account_by_name(&inv.user, username).await?;

    let Some(password) = inv.arg(1) else {
        return start_password_change(bot, &inv.user, account.id, &account.username).await;
    };

    bot.ctx.accounts.change_password(account.id, password).await?;
    Ok(Reply::text(password_changed(&account.username, password)))
}

pub(crate) async fn start_password_change(
    bot: &Bot,
    user: &User,
    account_id: i64,
    username: &str,
) -> BotResult<Reply> {
    bot.ctx
        .conversations
        .set_state(
            user.telegram_id,
            ConversationState::WaitingPassword { account_id },
        )
        .await;

    Ok(Reply::text(format!(
        "🔑 <b>Change password: {}</b>\n\nSend the new password (6-64 characters), or /cancel.",
        username
    ))
    .with_buttons(vec![vec![keyboard::Button::new(
        "❌ Cancel",
        keyboard::account_info(account_id),
    )]]))
}

pub async fn quota(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let quota = inv.user.account_quota;
    let used = bot.ctx.accounts.count_by_user(inv.user.id).await?;

    if quota == 0 {
        return Ok(Reply::text(format!(
            "📊 <b>Account quota:</b> ❌ not authorized\n\n\
             Accounts created: {}\n\n\
             💡 Redeem an invite code with /redeem or ask an admin.",
            used
        )));
    }

    let status = if used >= quota { "⚠️ full" } else { "✅ authorized" };
    Ok(Reply::text(format!(
        "📊 <b>Account quota:</b> {}\n\n\
         <b>Quota:</b> {}\n\
         <b>Created:</b> {}\n\
         <b>Remaining:</b> {}",
        status,
        quota,
        used,
        (quota - used).max(0)
    )))
}

pub async fn cancel(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let state = bot.ctx.conversations.get_state(inv.user.telegram_id).await;
    bot.ctx.conversations.clear_state(inv.user.telegram_id).await;

    if state.is_idle() {
        Ok(Reply::text("Nothing to cancel"))
    } else {
        Ok(Reply::text("Operation cancelled").with_buttons(keyboard::main_menu(inv.is_admin)))
    }
}

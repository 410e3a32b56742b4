/// Admin commands: user and account management, statistics
use super::parse_i64;
use crate::{
    account::AccountStatus,
    bot::{
        format::{escape_html, page_footer, page_offset, parse_page, status_emoji, PAGE_SIZE},
        keyboard, Bot, Invocation, Reply,
    },
    error::{BotError, BotResult},
    timeutil::{format_date, format_expire_time},
    user::{Role, User},
};

pub async fn menu(_bot: &Bot, _inv: &Invocation) -> BotResult<Reply> {
    Ok(menu_reply())
}

pub(crate) fn menu_reply() -> Reply {
    Reply::text(
        "🔑 <b>Admin commands</b>\n\n\
         <b>Users:</b>\n\
         /users [page] - list users\n\
         /grant [@user|id] [quota] - set a user's account quota\n\
         /setrole &lt;telegram_id&gt; &lt;admin|user&gt; - change a role\n\
         /blockuser &lt;telegram_id&gt; - block a user\n\
         /unblockuser &lt;telegram_id&gt; - unblock a user\n\
         /deleteuser &lt;telegram_id&gt; - delete a user (restored on next contact)\n\n\
         <b>Accounts:</b>\n\
         /accounts [page] - list all accounts\n\
         /deleteaccount &lt;username&gt; - delete an account\n\
         /suspend &lt;username&gt; - suspend an account\n\
         /activate &lt;username&gt; - reactivate an account\n\
         /setdevicelimit &lt;username&gt; &lt;devices&gt; - change the device limit\n\n\
         <b>Media server:</b>\n\
         /checkemby - connection check\n\
         /syncaccount &lt;username&gt; &lt;password&gt; - provision an unsynced account\n\
         /embyusers - users on the server\n\
         /updatepolicies - reapply the default policy to non-admin users\n\
         /playingstats - current playback\n\n\
         <b>Invite codes:</b>\n\
         /generatecode &lt;uses&gt; [days] [note] - new code\n\
         /listcodes [page] - list codes\n\
         /codeinfo &lt;code&gt; - code details and usage\n\
         /revokecode &lt;code&gt; - revoke a code\n\n\
         /stats - system statistics",
    )
    .with_buttons(keyboard::admin_menu())
}

/// Target of `/grant`: the replied-to sender, `@username` or a numeric id
async fn grant_target(bot: &Bot, inv: &Invocation) -> BotResult<(User, Option<String>)> {
    if let Some(identity) = &inv.reply_to {
        let user = bot.ctx.users.get_by_telegram_id(identity.telegram_id).await?;
        return Ok((user, inv.arg(0).map(str::to_string)));
    }

    let usage = "/grant @username [quota], /grant <telegram_id> [quota] or reply with /grant [quota]";
    let target = inv.require(0, "user", usage)?;
    let user = if target.starts_with('@') {
        bot.ctx.users.get_by_username(target).await?
    } else {
        let telegram_id = parse_i64(target, "telegram_id")?;
        bot.ctx.users.get_by_telegram_id(telegram_id).await?
    };
    Ok((user, inv.arg(1).map(str::to_string)))
}

pub async fn grant(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let (target, quota) = grant_target(bot, inv).await?;
    let quota = match quota {
        Some(q) => parse_i64(&q, "quota")?,
        None => 1,
    };
    if quota < 0 {
        return Err(BotError::validation("quota", "must not be negative"));
    }

    let target = bot.ctx.users.set_quota(target.id, quota).await?;
    let count = bot.ctx.accounts.count_by_user(target.id).await?;
    let name = escape_html(&target.display_name());

    if quota == 0 {
        let mut text = format!("⚠️ Revoked account creation for {}", name);
        if count > 0 {
            text.push_str(&format!("\nExisting accounts: {} (kept)", count));
        }
        return Ok(Reply::text(text));
    }

    let mut text = if count == 0 {
        format!("✅ {} may now create accounts\nQuota: {}", name, quota)
    } else {
        format!(
            "✅ Quota of {} set to {}\nExisting accounts: {}",
            name, quota, count
        )
    };
    if count > quota {
        text.push_str(&format!(
            "\n\n⚠️ The user is {} account(s) over the new quota",
            count - quota
        ));
    } else if count > 0 && count < quota {
        text.push_str(&format!("\nCan still create: {}", quota - count));
    }
    Ok(Reply::text(text))
}

pub async fn list_users(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let page = parse_page(inv.arg(0));
    let offset = page_offset(page);

    let users = bot.ctx.users.list(offset, PAGE_SIZE).await?;
    let total = bot.ctx.users.count().await?;
    if users.is_empty() {
        return Ok(Reply::text("No users found"));
    }

    let mut text = format!("👥 <b>Users</b> (page {}, {} total)\n\n", page, total);
    for (i, user) in users.iter().enumerate() {
        let role = if user.is_admin() { "👑" } else { "👤" };
        let blocked = if user.is_blocked { "🚫" } else { "✅" };
        text.push_str(&format!(
            "{}. {} {} {}\n   ID: <code>{}</code> | role: {} | quota: {}\n   joined: {}\n\n",
            offset + i as i64 + 1,
            role,
            escape_html(&user.display_name()),
            blocked,
            user.telegram_id,
            user.role.as_str(),
            user.account_quota,
            format_date(&user.created_at),
        ));
    }
    text.push_str(&page_footer("users", page, total));

    Ok(Reply::text(text))
}

pub async fn list_accounts(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let page = parse_page(inv.arg(0));
    let offset = page_offset(page);

    let accounts = bot.ctx.accounts.list_all_with_owner(offset, PAGE_SIZE).await?;
    let total = bot.ctx.accounts.count().await?;
    if accounts.is_empty() {
        return Ok(Reply::text("No accounts found"));
    }

    let mut text = format!("📋 <b>All accounts</b> (page {}, {} total)\n\n", page, total);
    for (i, entry) in accounts.iter().enumerate() {
        let account = &entry.account;
        text.push_str(&format!(
            "{}. <b>{}</b> {}\n   owner: {} | status: {}\n   expires: {}\n\n",
            offset + i as i64 + 1,
            account.username,
            status_emoji(account.status),
            escape_html(&entry.owner_display_name()),
            account.status.as_str(),
            format_expire_time(account.expire_at.as_ref()),
        ));
    }
    text.push_str(&page_footer("accounts", page, total));

    Ok(Reply::text(text))
}

pub async fn delete_account(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/deleteaccount <username>")?;
    let account = bot.ctx.accounts.get_by_username(username).await?;
    bot.ctx.accounts.delete(account.id).await?;

    Ok(Reply::text(format!("✅ Account <b>{}</b> deleted", account.username)))
}

pub async fn suspend(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/suspend <username>")?;
    let account = bot.ctx.accounts.get_by_username(username).await?;
    bot.ctx.accounts.suspend(account.id).await?;

    Ok(Reply::text(format!("⏸️ Account <b>{}</b> suspended", account.username)))
}

pub async fn activate(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/activate <username>")?;
    let account = bot.ctx.accounts.get_by_username(username).await?;
    bot.ctx.accounts.activate(account.id).await?;

    Ok(Reply::text(format!("✅ Account <b>{}</b> activated", account.username)))
}

pub async fn set_role(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let usage = "/setrole <telegram_id> <admin|user>";
    let telegram_id = parse_i64(inv.require(0, "telegram_id", usage)?, "telegram_id")?;
    let role = inv.require(1, "role", usage)?;

    let user = bot.ctx.users.set_role(telegram_id, role).await?;
    let emoji = if user.role == Role::Admin { "👑" } else { "👤" };
    Ok(Reply::text(format!(
        "{} {} is now <b>{}</b>",
        emoji,
        escape_html(&user.display_name()),
        user.role.as_str()
    )))
}

fn target_id(inv: &Invocation, usage: &str) -> BotResult<i64> {
    parse_i64(inv.require(0, "telegram_id", usage)?, "telegram_id")
}

pub async fn block_user(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let telegram_id = target_id(inv, "/blockuser <telegram_id>")?;
    if telegram_id == inv.user.telegram_id {
        return Err(BotError::validation("telegram_id", "you cannot block yourself"));
    }

    let user = bot.ctx.users.block(telegram_id).await?;
    Ok(Reply::text(format!("🚫 Blocked {}", escape_html(&user.display_name()))))
}

pub async fn unblock_user(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let telegram_id = target_id(inv, "/unblockuser <telegram_id>")?;
    let user = bot.ctx.users.unblock(telegram_id).await?;
    Ok(Reply::text(format!("✅ Unblocked {}", escape_html(&user.display_name()))))
}

/// Soft delete; accounts owned by the user are left untouched
pub async fn delete_user(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let telegram_id = target_id(inv, "/deleteuser <telegram_id>")?;
    if telegram_id == inv.user.telegram_id {
        return Err(BotError::validation("telegram_id", "you cannot delete yourself"));
    }

    bot.ctx.users.delete(telegram_id).await?;
    Ok(Reply::text(format!("🗑️ Deleted user {}", telegram_id)))
}

pub(crate) async fn stats_text(bot: &Bot) -> BotResult<String> {
    let users = &bot.ctx.users;
    let accounts = &bot.ctx.accounts;

    let total_users = users.count().await?;
    let admins = users.count_by_role(Role::Admin).await?;
    let regular = users.count_by_role(Role::User).await?;

    let total_accounts = accounts.count().await?;
    let active = accounts.count_by_status(AccountStatus::Active).await?;
    let suspended = accounts.count_by_status(AccountStatus::Suspended).await?;
    let expired = accounts.count_by_status(AccountStatus::Expired).await?;

    let average = if total_users > 0 {
        total_accounts as f64 / total_users as f64
    } else {
        0.0
    };

    Ok(format!(
        "📊 <b>Statistics</b>\n\n\
         <b>Users:</b>\n\
         • total: {}\n\
         • admins: {}\n\
         • regular: {}\n\n\
         <b>Accounts:</b>\n\
         • total: {}\n\
         • active: {} ✅\n\
         • suspended: {} ⏸️\n\
         • expired: {} ❌\n\n\
         <b>Average:</b> {:.2} accounts per user",
        total_users, admins, regular, total_accounts, active, suspended, expired, average
    ))
}

pub async fn stats(bot: &Bot, _inv: &Invocation) -> BotResult<Reply> {
    Ok(Reply::text(stats_text(bot).await?))
}

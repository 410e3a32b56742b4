/// Invite code commands
use super::parse_i64;
use crate::{
    bot::{
        format::{code_state, escape_html, page_footer, page_offset, parse_page, PAGE_SIZE},
        keyboard, Bot, Invocation, Reply,
    },
    conversation::ConversationState,
    error::{BotError, BotResult},
    invite::UNLIMITED_USES,
    timeutil::{format_date_time, format_expire_time},
    user::User,
};
use chrono::Utc;

/// Redemptions listed on `/codeinfo`
const USAGE_ROWS: usize = 10;

pub async fn redeem(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    match inv.arg(0) {
        Some(code) => redeem_code(bot, &inv.user, code).await,
        None => start_redeem(bot, &inv.user).await,
    }
}

/// Prompt for a code when the user is still eligible to redeem one
pub(crate) async fn start_redeem(bot: &Bot, user: &User) -> BotResult<Reply> {
    if user.used_invite_code {
        return Err(BotError::AlreadyUsed);
    }
    if user.account_quota > 0 {
        return Err(BotError::HasQuota);
    }

    bot.ctx
        .conversations
        .set_state(user.telegram_id, ConversationState::WaitingInviteCode)
        .await;

    Ok(Reply::text(
        "🎟️ <b>Redeem invite code</b>\n\nSend your invite code, or /cancel.",
    )
    .with_buttons(keyboard::cancel_only()))
}

pub(crate) async fn redeem_code(bot: &Bot, user: &User, code: &str) -> BotResult<Reply> {
    let invite = bot.ctx.invites.activate(code, user.id).await?;

    Ok(Reply::text(format!(
        "✅ <b>Invite code redeemed!</b>\n\n\
         Code: <code>{}</code>\n\
         You may now create <b>1</b> account.",
        invite.code
    ))
    .with_buttons(vec![
        vec![keyboard::Button::new("➕ Create account", keyboard::CREATE_START)],
        vec![keyboard::Button::new("⬅️ Main menu", keyboard::MAIN_MENU)],
    ]))
}

/// Quotes are stripped so `"summer promo"` and summer promo read the same
fn description(args: &[String]) -> String {
    args.join(" ")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

pub async fn generate(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let usage = "/generatecode <uses|-1> [days] [note]";
    let max_uses = parse_i64(inv.require(0, "uses", usage)?, "uses")?;

    let expire_days = match inv.arg(1) {
        Some(days) => parse_i64(days, "days")?,
        None => 0,
    };
    if expire_days < 0 {
        return Err(BotError::validation("days", "must not be negative"));
    }

    let note = description(inv.args.get(2..).unwrap_or_default());
    let code = bot
        .ctx
        .invites
        .generate(max_uses, expire_days, &note, inv.user.telegram_id)
        .await?;

    let uses = if code.max_uses == UNLIMITED_USES {
        "unlimited".to_string()
    } else {
        code.max_uses.to_string()
    };
    let mut text = format!(
        "✅ <b>Invite code generated</b>\n\n\
         Code: <code>{}</code>\n\
         Uses: {}\n\
         Expires: {}",
        code.code,
        uses,
        format_expire_time(code.expire_at.as_ref()),
    );
    if !code.description.is_empty() {
        text.push_str(&format!("\nNote: {}", escape_html(&code.description)));
    }
    Ok(Reply::text(text))
}

pub async fn list(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let page = parse_page(inv.arg(0));
    let offset = page_offset(page);

    let codes = bot.ctx.invites.list(offset, PAGE_SIZE).await?;
    let total = bot.ctx.invites.count().await?;
    if codes.is_empty() {
        return Ok(Reply::text("🎟️ No invite codes yet"));
    }

    let now = Utc::now();
    let mut text = format!("🎟️ <b>Invite codes</b> (page {}, {} total)\n\n", page, total);
    for code in &codes {
        let (emoji, state) = code_state(code, now);
        text.push_str(&format!(
            "{} <code>{}</code> {}\n   uses: {} | expires: {}\n",
            emoji,
            code.code,
            state,
            code.uses_label(),
            format_expire_time(code.expire_at.as_ref()),
        ));
        if !code.description.is_empty() {
            text.push_str(&format!("   note: {}\n", escape_html(&code.description)));
        }
        text.push('\n');
    }
    text.push_str(&page_footer("listcodes", page, total));

    Ok(Reply::text(text))
}

pub async fn info(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let code = inv.require(0, "code", "/codeinfo <code>")?;
    let details = bot.ctx.invites.get_with_usage(code).await?;
    let invite = &details.invite_code;
    let (emoji, state) = code_state(invite, Utc::now());

    let mut text = format!(
        "🎟️ <b>Invite code</b> <code>{}</code>\n\n\
         State: {} {}\n\
         Uses: {}\n\
         Expires: {}\n\
         Created by: <code>{}</code>\n\
         Created: {}\n",
        invite.code,
        emoji,
        state,
        invite.uses_label(),
        format_expire_time(invite.expire_at.as_ref()),
        invite.created_by,
        format_date_time(&invite.created_at),
    );
    if !invite.description.is_empty() {
        text.push_str(&format!("Note: {}\n", escape_html(&invite.description)));
    }

    if details.usage.is_empty() {
        text.push_str("\nNot redeemed yet");
        return Ok(Reply::text(text));
    }

    text.push_str(&format!("\n<b>Redemptions</b> ({})\n", details.usage.len()));
    for usage in details.usage.iter().take(USAGE_ROWS) {
        let who = match bot.ctx.users.get(usage.user_id).await {
            Ok(user) => escape_html(&user.display_name()),
            Err(_) => format!("user #{}", usage.user_id),
        };
        text.push_str(&format!("• {} at {}\n", who, format_date_time(&usage.used_at)));
    }
    if details.usage.len() > USAGE_ROWS {
        text.push_str(&format!("… and {} more\n", details.usage.len() - USAGE_ROWS));
    }

    Ok(Reply::text(text))
}

pub async fn revoke(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let code = inv.require(0, "code", "/revokecode <code>")?;
    let invite = bot.ctx.invites.revoke(code).await?;

    Ok(Reply::text(format!(
        "🚫 Invite code <code>{}</code> revoked ({} used)",
        invite.code,
        invite.uses_label()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_strips_quotes() {
        let args = vec!["\"summer".to_string(), "promo\"".to_string()];
        assert_eq!(description(&args), "summer promo");
        assert_eq!(description(&[]), "");
    }
}

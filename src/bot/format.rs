/// HTML rendering helpers shared by commands and callbacks
use crate::{
    account::{Account, AccountStatus, SyncStatus},
    invite::{InviteCode, InviteCodeStatus},
    timeutil::{format_date_time, format_expire_time},
};
use chrono::{DateTime, Utc};

/// Rows per page for admin listings
pub const PAGE_SIZE: i64 = 10;

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn status_emoji(status: AccountStatus) -> &'static str {
    match status {
        AccountStatus::Active => "✅",
        AccountStatus::Suspended => "⏸️",
        AccountStatus::Expired => "❌",
    }
}

pub fn sync_emoji(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "✅",
        SyncStatus::Pending => "⏳",
        SyncStatus::Failed => "❌",
    }
}

/// Effective code state: revocation wins, then expiry, then exhaustion
pub fn code_state(code: &InviteCode, now: DateTime<Utc>) -> (&'static str, &'static str) {
    if code.status == InviteCodeStatus::Revoked {
        ("🚫", "revoked")
    } else if code.is_expired_at(now) {
        ("⏰", "expired")
    } else if code.is_exhausted() {
        ("📛", "used up")
    } else {
        ("✅", "valid")
    }
}

/// 1-based page number from an optional argument
pub fn parse_page(arg: Option<&str>) -> i64 {
    arg.and_then(|a| a.parse::<i64>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

pub fn page_offset(page: i64) -> i64 {
    (page - 1) * PAGE_SIZE
}

/// "Page 1/3, use /users 2 for more" when there is more than one page
pub fn page_footer(command: &str, page: i64, total: i64) -> String {
    let pages = (total + PAGE_SIZE - 1) / PAGE_SIZE;
    if pages <= 1 {
        return String::new();
    }

    let mut footer = format!("📄 Page {}/{}\n", page, pages);
    if page < pages {
        footer.push_str(&format!(
            "Use <code>/{} {}</code> for the next page\n",
            command,
            page + 1
        ));
    }
    footer
}

pub fn account_detail(account: &Account) -> String {
    let sync = if account.emby_user_id.is_empty() {
        "❌ not synced".to_string()
    } else {
        format!("✅ synced (ID: <code>{}</code>)", escape_html(&account.emby_user_id))
    };

    format!(
        "📝 <b>Account details</b>\n\n\
         <b>Username:</b> <code>{}</code>\n\
         <b>Status:</b> {} {}\n\
         <b>Expires:</b> {}\n\
         <b>Max devices:</b> {}\n\
         <b>Created:</b> {}\n\
         <b>Media server:</b> {}",
        account.username,
        status_emoji(account.status),
        account.status.as_str(),
        format_expire_time(account.expire_at.as_ref()),
        account.max_devices,
        format_date_time(&account.created_at),
        sync,
    )
}

pub fn account_created(account: &Account, password: &str) -> String {
    format!(
        "✅ <b>Account created!</b>\n\n\
         <b>Username:</b> <code>{}</code>\n\
         <b>Password:</b> <code>{}</code>\n\
         <b>Expires:</b> {}\n\
         <b>Max devices:</b> {}\n\n\
         ⚠️ <b>Save the password now</b>, it is shown only once.\n\
         Use /changepassword {} to change it.",
        account.username,
        escape_html(password),
        format_expire_time(account.expire_at.as_ref()),
        account.max_devices,
        account.username,
    )
}

pub fn account_renewed(account: &Account, days: i64) -> String {
    format!(
        "✅ <b>Renewed!</b>\n\nAccount <b>{}</b> extended by {} days\nNew expiry: {}",
        account.username,
        days,
        format_expire_time(account.expire_at.as_ref()),
    )
}

pub fn password_changed(username: &str, password: &str) -> String {
    format!(
        "✅ <b>Password changed!</b>\n\nAccount <b>{}</b> now uses\n<code>{}</code>\n\n⚠️ Keep it somewhere safe",
        username,
        escape_html(password),
    )
}

/// Numbered list of a user's own accounts
pub fn account_list(accounts: &[Account]) -> String {
    let mut out = format!("📋 <b>Your accounts</b> ({} total)\n\n", accounts.len());
    for (i, account) in accounts.iter().enumerate() {
        out.push_str(&format!(
            "{}. <b>{}</b> {}\n   Expires: {}\n   Max devices: {}\n\n",
            i + 1,
            account.username,
            status_emoji(account.status),
            format_expire_time(account.expire_at.as_ref()),
            account.max_devices,
        ));
    }
    out
}

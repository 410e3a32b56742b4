/// Media server commands: sync state, manual provisioning, telemetry
use super::parse_i64;
use crate::{
    account::SyncOutcome,
    bot::{
        format::{escape_html, sync_emoji},
        Bot, Invocation, Reply,
    },
    error::BotResult,
    remote::MediaServer,
    timeutil::format_date_time,
};
use std::sync::Arc;
use tracing::{info, warn};

const SYNC_OFF: &str = "❌ Media server sync is disabled or not configured";

fn media_server(bot: &Bot) -> Option<&Arc<dyn MediaServer>> {
    bot.ctx.media_server()
}

/// Open to owners for their own accounts, to admins for any
pub async fn sync_status(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let username = inv.require(0, "username", "/syncstatus <username>")?;
    let account = bot.accessible_account_by_name(&inv.user, username).await?;

    let mut text = format!(
        "<b>Sync status</b>\n\nUsername: <code>{}</code>\nState: {} {}\n",
        account.username,
        sync_emoji(account.sync_status),
        account.sync_status.as_str()
    );

    if account.emby_user_id.is_empty() {
        text.push_str("Server ID: not synced\n");
    } else {
        text.push_str(&format!(
            "Server ID: <code>{}</code>\n",
            escape_html(&account.emby_user_id)
        ));
    }
    if let Some(at) = &account.last_sync_at {
        text.push_str(&format!("Last sync: {}\n", format_date_time(at)));
    }
    if !account.sync_error.is_empty() {
        text.push_str(&format!(
            "\n<b>Last error:</b>\n<pre>{}</pre>",
            escape_html(&account.sync_error)
        ));
    }

    Ok(Reply::text(text))
}

pub async fn check_server(bot: &Bot, _inv: &Invocation) -> BotResult<Reply> {
    let Some(server) = media_server(bot) else {
        return Ok(Reply::text(SYNC_OFF));
    };

    let text = match server.ping().await {
        Ok(info) => format!(
            "✅ Media server reachable\n\n<b>Name:</b> {}\n<b>Version:</b> {}\n<b>OS:</b> {}",
            escape_html(&info.server_name),
            escape_html(&info.version),
            escape_html(&info.operating_system),
        ),
        Err(e) => {
            warn!("Media server check failed: {}", e);
            format!(
                "❌ Media server unreachable\nError: {}",
                escape_html(&e.summary())
            )
        }
    };
    Ok(Reply::text(text))
}

pub async fn sync_account(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    if media_server(bot).is_none() {
        return Ok(Reply::text(SYNC_OFF));
    }

    let usage = "/syncaccount <username> <password>";
    let username = inv.require(0, "username", usage)?;
    let password = inv.require(1, "password", usage)?;

    let text = match bot.ctx.accounts.sync_account(username, password).await? {
        SyncOutcome::AlreadySynced(account) => format!(
            "⚠️ Account <code>{}</code> is already synced (ID: <code>{}</code>)",
            account.username,
            escape_html(&account.emby_user_id)
        ),
        SyncOutcome::Synced(account) => format!(
            "✅ Account synced\nUsername: <code>{}</code>\nServer ID: <code>{}</code>",
            account.username,
            escape_html(&account.emby_user_id)
        ),
    };
    Ok(Reply::text(text))
}

pub async fn list_remote_users(bot: &Bot, _inv: &Invocation) -> BotResult<Reply> {
    let Some(server) = media_server(bot) else {
        return Ok(Reply::text(SYNC_OFF));
    };

    let users = server.list_users().await?;
    if users.is_empty() {
        return Ok(Reply::text("📋 No users on the media server"));
    }

    let mut text = format!("<b>Media server users</b> ({} total)\n\n", users.len());
    for (i, user) in users.iter().enumerate() {
        let state = if user.policy.is_disabled {
            "❌ disabled"
        } else {
            "✅ enabled"
        };
        let admin = if user.policy.is_administrator { " 👑" } else { "" };
        text.push_str(&format!(
            "{}. <code>{}</code>{}\n   state: {}\n   ID: <code>{}</code>\n\n",
            i + 1,
            escape_html(&user.name),
            admin,
            state,
            escape_html(&user.id),
        ));
    }
    Ok(Reply::text(text))
}

/// Local limit always; the remote stream limit when the account is synced
pub async fn set_device_limit(bot: &Bot, inv: &Invocation) -> BotResult<Reply> {
    let usage = "/setdevicelimit <username> <devices>";
    let username = inv.require(0, "username", usage)?;
    let limit = parse_i64(inv.require(1, "devices", usage)?, "devices")?;

    let account = bot.ctx.accounts.get_by_username(username).await?;
    let account = bot.ctx.accounts.set_device_limit(account.id, limit).await?;
    info!("Device limit of {} set to {}", account.username, limit);

    let mut text = format!(
        "✅ <b>Device limit updated</b>\n\nAccount: <code>{}</code>\nMax devices: <b>{}</b>",
        account.username, account.max_devices
    );
    if !account.sync_error.is_empty() {
        text.push_str(&format!(
            "\n\n⚠️ Media server not updated: {}",
            escape_html(&account.sync_error)
        ));
    }
    Ok(Reply::text(text))
}

pub(crate) async fn playing_stats_text(server: &dyn MediaServer) -> BotResult<String> {
    let sessions = server.get_sessions().await?;
    if sessions.is_empty() {
        return Ok("📺 No active sessions".to_string());
    }

    let mut playing = Vec::new();
    let mut paused = Vec::new();

    for session in &sessions {
        let Some(item) = &session.now_playing_item else {
            continue;
        };
        if !session.is_playing() {
            paused.push(format!(
                "👤 <b>{}</b> - paused",
                escape_html(&session.user_name)
            ));
            continue;
        }

        let method = session
            .play_state
            .as_ref()
            .map(|s| s.play_method.as_str())
            .unwrap_or("");
        let mut entry = format!(
            "👤 <b>{}</b>\n   📱 {} ({})\n   🎬 {}\n   ⏱️ {:.1}% | {}",
            escape_html(&session.user_name),
            escape_html(&session.device_name),
            escape_html(&session.client),
            escape_html(&item.display_name()),
            session.progress(),
            escape_html(method),
        );
        if let Some(transcoding) = session.transcoding_info.as_ref().filter(|_| session.is_transcoding()) {
            entry.push_str(&format!(
                " | transcoding ({:.1}%)",
                transcoding.completion_percentage
            ));
        }
        playing.push(entry);
    }

    let mut text = "📺 <b>Playback</b>\n\n".to_string();
    if !playing.is_empty() {
        text.push_str(&format!("<b>Playing ({}):</b>\n", playing.len()));
        text.push_str(&playing.join("\n\n"));
        text.push('\n');
    }
    if !paused.is_empty() {
        if !playing.is_empty() {
            text.push('\n');
        }
        text.push_str(&format!("<b>Paused ({}):</b>\n", paused.len()));
        text.push_str(&paused.join("\n"));
        text.push('\n');
    }
    text.push_str(&format!("\n📊 Sessions: {}", sessions.len()));

    Ok(text)
}

pub async fn playing_stats(bot: &Bot, _inv: &Invocation) -> BotResult<Reply> {
    let Some(server) = media_server(bot) else {
        return Ok(Reply::text(SYNC_OFF));
    };
    Ok(Reply::text(playing_stats_text(server.as_ref()).await?))
}

pub async fn update_policies(bot: &Bot, _inv: &Invocation) -> BotResult<Reply> {
    let Some(server) = media_server(bot) else {
        return Ok(Reply::text(SYNC_OFF));
    };

    let outcome = server.batch_update_non_admin_policies().await?;
    info!(
        "Batch policy update: {} updated, {} failed",
        outcome.updated, outcome.failed
    );

    Ok(Reply::text(format!(
        "✅ <b>Policies updated</b>\n\n\
         • updated: {}\n\
         • failed: {}\n\
         • administrators skipped",
        outcome.updated, outcome.failed
    )))
}

/// Telegram transport
///
/// Long-polls for updates and hands each one to the `Bot` on its own task,
/// so a slow media-server call never stalls other chats.

pub mod api;

pub use api::TelegramApi;

use crate::bot::{Bot, IncomingMessage};
use crate::user::ExternalIdentity;
use anyhow::Result;
use api::{CallbackQuery, Message, Update};
use std::time::Duration;
use tracing::{error, info, warn};

/// Delay before polling again after a failed `getUpdates`
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Poll forever; returns only if the task is cancelled
pub async fn run_polling(api: TelegramApi, bot: Bot) -> Result<()> {
    info!("Telegram polling started");
    let mut offset = 0;

    loop {
        let updates = match api.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {:#}", e);
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let api = api.clone();
            let bot = bot.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_update(&api, &bot, update).await {
                    error!("Failed to handle update: {:#}", e);
                }
            });
        }
    }
}

async fn handle_update(api: &TelegramApi, bot: &Bot, update: Update) -> Result<()> {
    if let Some(message) = update.message {
        handle_message(api, bot, message).await
    } else if let Some(query) = update.callback_query {
        handle_callback(api, bot, query).await
    } else {
        Ok(())
    }
}

async fn handle_message(api: &TelegramApi, bot: &Bot, message: Message) -> Result<()> {
    let (Some(from), Some(text)) = (message.from.as_ref(), message.text.as_ref()) else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }

    let incoming = IncomingMessage {
        from: ExternalIdentity::from(from),
        is_group: message.chat.is_group(),
        text: text.clone(),
        reply_to: message
            .reply_to_message
            .as_ref()
            .and_then(|m| m.from.as_ref())
            .map(ExternalIdentity::from),
    };

    let reply = bot.handle_message(&incoming).await;
    if !reply.text.is_empty() {
        api.send_message(message.chat.id, &reply.text, &reply.buttons)
            .await?;
    }
    Ok(())
}

async fn handle_callback(api: &TelegramApi, bot: &Bot, query: CallbackQuery) -> Result<()> {
    let data = query.data.as_deref().unwrap_or_default();
    let response = bot
        .handle_callback(&ExternalIdentity::from(&query.from), data)
        .await;

    api.answer_callback(&query.id, &response.answer, response.show_alert)
        .await?;

    if let (Some(text), Some(message)) = (&response.edit_text, &query.message) {
        api.edit_message(message.chat.id, message.message_id, text, &response.buttons)
            .await?;
    }
    Ok(())
}

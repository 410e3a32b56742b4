/// Minimal Telegram Bot API client: long polling, messages, button answers
use crate::{
    bot::Keyboard,
    config::TelegramConfig,
    user::ExternalIdentity,
};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Envelope around every Bot API result
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: Chat,
    pub text: Option<String>,
    pub reply_to_message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        matches!(self.kind.as_str(), "group" | "supergroup")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<&TgUser> for ExternalIdentity {
    fn from(user: &TgUser) -> Self {
        ExternalIdentity {
            telegram_id: user.id,
            username: user.username.clone().unwrap_or_default(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

/// `reply_markup` for a keyboard, `None` when it has no buttons
fn reply_markup(buttons: &Keyboard) -> Option<serde_json::Value> {
    if buttons.is_empty() {
        return None;
    }
    let rows: Vec<Vec<InlineButton<'_>>> = buttons
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineButton {
                    text: &b.text,
                    callback_data: &b.data,
                })
                .collect()
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

#[derive(Clone)]
pub struct TelegramApi {
    http: Client,
    base_url: String,
    poll_timeout: u64,
}

impl TelegramApi {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // The HTTP timeout has to outlive the long poll
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout + 10))
            .build()
            .context("Failed to create Telegram HTTP client")?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
            poll_timeout: config.poll_timeout,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Telegram {} request failed", method))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Telegram {} returned an unreadable body", method))?;

        if !body.ok {
            return Err(anyhow!(
                "Telegram {} failed: {}",
                method,
                body.description.unwrap_or_default()
            ));
        }
        body.result
            .ok_or_else(|| anyhow!("Telegram {} returned no result", method))
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        debug!("Polling updates from offset {}", offset);
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str, buttons: &Keyboard) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup(buttons) {
            payload["reply_markup"] = markup;
        }
        self.call::<serde_json::Value>("sendMessage", payload).await?;
        Ok(())
    }

    pub async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        buttons: &Keyboard,
    ) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup(buttons) {
            payload["reply_markup"] = markup;
        }
        self.call::<serde_json::Value>("editMessageText", payload).await?;
        Ok(())
    }

    pub async fn answer_callback(&self, query_id: &str, text: &str, show_alert: bool) -> Result<()> {
        self.call::<serde_json::Value>(
            "answerCallbackQuery",
            json!({
                "callback_query_id": query_id,
                "text": text,
                "show_alert": show_alert,
            }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Button;

    #[test]
    fn test_decode_message_update() {
        let raw = r#"{
            "update_id": 7,
            "message": {
                "message_id": 1,
                "from": {"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada"},
                "chat": {"id": -100, "type": "supergroup"},
                "text": "/start"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let message = update.message.unwrap();
        assert!(message.chat.is_group());

        let identity = ExternalIdentity::from(message.from.as_ref().unwrap());
        assert_eq!(identity.telegram_id, 42);
        assert_eq!(identity.username, "ada");
        assert_eq!(identity.last_name, "");
    }

    #[test]
    fn test_reply_markup() {
        assert!(reply_markup(&Vec::new()).is_none());

        let markup = reply_markup(&vec![vec![Button::new("Go", "menu:main")]]).unwrap();
        assert_eq!(markup["inline_keyboard"][0][0]["callback_data"], "menu:main");
    }
}

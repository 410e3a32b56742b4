/// End-to-end chat flows through the bot, without a transport or media server
use emby_account_bot::{
    bot::{keyboard, Bot, IncomingMessage, Reply},
    config::{AccountConfig, BotConfig, LoggingConfig, RemoteConfig, StorageConfig, TelegramConfig},
    context::AppContext,
    conversation::ConversationState,
    db::create_memory_pool,
    user::ExternalIdentity,
};
use std::path::PathBuf;
use tokio_test::assert_ok;

const ADMIN: i64 = 1;

async fn bot() -> Bot {
    let config = BotConfig {
        telegram: TelegramConfig {
            token: "1:test".to_string(),
            admin_ids: vec![ADMIN],
            api_url: "http://127.0.0.1:9".to_string(),
            poll_timeout: 1,
        },
        storage: StorageConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        account: AccountConfig::default(),
        remote: RemoteConfig {
            enable_sync: false,
            ..RemoteConfig::default()
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "text".to_string(),
        },
    };
    let pool = create_memory_pool().await.unwrap();
    Bot::new(AppContext::with_pool(config, pool, None))
}

fn identity(telegram_id: i64) -> ExternalIdentity {
    ExternalIdentity {
        telegram_id,
        username: format!("user{}", telegram_id),
        first_name: format!("User {}", telegram_id),
        ..Default::default()
    }
}

async fn say(bot: &Bot, from: i64, text: &str) -> Reply {
    bot.handle_message(&IncomingMessage {
        from: identity(from),
        is_group: false,
        text: text.to_string(),
        reply_to: None,
    })
    .await
}

async fn say_in_group(bot: &Bot, from: i64, text: &str) -> Reply {
    bot.handle_message(&IncomingMessage {
        from: identity(from),
        is_group: true,
        text: text.to_string(),
        reply_to: None,
    })
    .await
}

async fn state(bot: &Bot, telegram_id: i64) -> ConversationState {
    bot.context().conversations.get_state(telegram_id).await
}

/// First `<code>...</code>` span of a reply
fn code_in(text: &str) -> String {
    let start = text.find("<code>").unwrap() + "<code>".len();
    let end = text[start..].find("</code>").unwrap() + start;
    text[start..end].to_string()
}

#[tokio::test]
async fn test_group_commands_are_whitelisted() {
    let bot = bot().await;

    let reply = say_in_group(&bot, 2, "/create alice").await;
    assert!(reply.text.contains("private chat"));

    let reply = say_in_group(&bot, 2, "/help@emby_bot").await;
    assert!(reply.text.contains("Help"));

    let reply = say_in_group(&bot, 2, "just chatting").await;
    assert!(reply.text.contains("/help"));
}

#[tokio::test]
async fn test_admin_gate() {
    let bot = bot().await;

    let reply = say(&bot, 2, "/stats").await;
    assert!(reply.text.contains("requires admin rights"));

    let reply = say(&bot, ADMIN, "/stats").await;
    assert!(reply.text.contains("Statistics"));

    let reply = say(&bot, 2, "/nosuchcommand").await;
    assert!(reply.text.contains("Unknown command"));
}

#[tokio::test]
async fn test_blocked_user_is_rejected() {
    let bot = bot().await;
    say(&bot, 2, "/start").await;

    let reply = say(&bot, ADMIN, "/blockuser 2").await;
    assert!(reply.text.contains("Blocked"));

    let reply = say(&bot, 2, "/start").await;
    assert!(reply.text.contains("blocked"));

    let response = bot.handle_callback(&identity(2), keyboard::MAIN_MENU).await;
    assert!(response.show_alert);

    let reply = say(&bot, ADMIN, "/blockuser 1").await;
    assert!(reply.text.starts_with("❌"));

    say(&bot, ADMIN, "/unblockuser 2").await;
    let reply = say(&bot, 2, "/start").await;
    assert!(reply.text.contains("Welcome"));
}

#[tokio::test]
async fn test_create_flow_with_prompt() {
    let bot = bot().await;

    let reply = say(&bot, 2, "/create").await;
    assert!(reply.text.contains("not allowed to create accounts"));
    assert!(state(&bot, 2).await.is_idle());

    let reply = say(&bot, ADMIN, "/grant 2 1").await;
    assert!(reply.text.contains("may now create accounts"));

    let reply = say(&bot, 2, "/create").await;
    assert!(reply.text.contains("New account"));
    assert_eq!(state(&bot, 2).await, ConversationState::WaitingUsername);

    // A malformed name keeps the prompt open
    let reply = say(&bot, 2, "ab").await;
    assert!(reply.text.contains("at least 3 characters"));
    assert_eq!(state(&bot, 2).await, ConversationState::WaitingUsername);

    let reply = say(&bot, 2, "Alice").await;
    assert!(reply.text.contains("Account created"));
    assert!(reply.text.contains("<code>alice</code>"));
    assert!(state(&bot, 2).await.is_idle());

    let reply = say(&bot, 2, "/create bob").await;
    assert!(reply.text.contains("quota exceeded"));

    let reply = say(&bot, 2, "/myaccounts").await;
    assert!(reply.text.contains("alice"));
    assert_eq!(reply.buttons.len(), 2);
}

#[tokio::test]
async fn test_cancel_clears_pending_prompt() {
    let bot = bot().await;
    say(&bot, 2, "/start").await;
    say(&bot, ADMIN, "/grant 2 1").await;

    say(&bot, 2, "/create").await;
    let reply = say(&bot, 2, "/cancel").await;
    assert!(reply.text.contains("cancelled"));
    assert!(state(&bot, 2).await.is_idle());

    let reply = say(&bot, 2, "/cancel").await;
    assert_eq!(reply.text, "Nothing to cancel");
}

#[tokio::test]
async fn test_invite_code_flow() {
    let bot = bot().await;

    let reply = say(&bot, ADMIN, "/generatecode 1 7 \"launch party\"").await;
    assert!(reply.text.contains("Invite code generated"));
    assert!(reply.text.contains("launch party"));
    let code = code_in(&reply.text);
    assert_eq!(code.len(), 8);

    let reply = say(&bot, 3, "/redeem").await;
    assert!(reply.text.contains("Send your invite code"));
    assert_eq!(state(&bot, 3).await, ConversationState::WaitingInviteCode);

    // Unknown codes can be retried
    let reply = say(&bot, 3, "ZZZZZZZZ").await;
    assert!(reply.text.contains("invalid invite code"));
    assert_eq!(state(&bot, 3).await, ConversationState::WaitingInviteCode);

    let reply = say(&bot, 3, &code.to_lowercase()).await;
    assert!(reply.text.contains("redeemed"));
    assert!(state(&bot, 3).await.is_idle());

    let user = assert_ok!(bot.context().users.get_by_telegram_id(3).await);
    assert_eq!(user.account_quota, 1);
    assert!(user.used_invite_code);

    let reply = say(&bot, 3, "/redeem").await;
    assert!(reply.text.contains("already used an invite code"));

    let reply = say(&bot, 4, &format!("/redeem {}", code)).await;
    assert!(reply.text.contains("used up"));

    let reply = say(&bot, ADMIN, &format!("/codeinfo {}", code)).await;
    assert!(reply.text.contains("Redemptions"));
    assert!(reply.text.contains("@user3"));

    let reply = say(&bot, ADMIN, "/listcodes").await;
    assert!(reply.text.contains(&code));
}

#[tokio::test]
async fn test_callbacks_respect_ownership() {
    let bot = bot().await;
    say(&bot, 2, "/start").await;
    say(&bot, ADMIN, "/grant 2 1").await;
    say(&bot, 2, "/create alice").await;

    let account = bot
        .context()
        .accounts
        .get_by_username("alice")
        .await
        .unwrap();

    let response = bot
        .handle_callback(&identity(2), &keyboard::account_info(account.id))
        .await;
    assert!(response.edit_text.unwrap().contains("alice"));

    let response = bot
        .handle_callback(&identity(3), &keyboard::account_info(account.id))
        .await;
    assert!(response.show_alert);
    assert!(response.edit_text.is_none());

    // Deleting needs admin rights even for the owner
    let response = bot
        .handle_callback(&identity(2), &keyboard::confirm_delete(account.id))
        .await;
    assert!(response.show_alert);

    let response = bot
        .handle_callback(&identity(2), &keyboard::confirm_renew(account.id, 30))
        .await;
    assert!(response.edit_text.unwrap().contains("Renewed"));

    let response = bot.handle_callback(&identity(2), "bogus:token").await;
    assert_eq!(response.answer, "Unknown action");

    let response = bot
        .handle_callback(&identity(ADMIN), &keyboard::confirm_delete(account.id))
        .await;
    assert!(response.edit_text.unwrap().contains("deleted"));
    assert!(bot.context().accounts.get(account.id).await.is_err());
}

#[tokio::test]
async fn test_renew_prompt_accepts_days() {
    let bot = bot().await;
    say(&bot, 2, "/start").await;
    say(&bot, ADMIN, "/grant 2 1").await;
    say(&bot, 2, "/create alice").await;

    let reply = say(&bot, 2, "/renew alice").await;
    assert_eq!(reply.buttons.len(), 4);
    assert!(matches!(
        state(&bot, 2).await,
        ConversationState::WaitingDays { .. }
    ));

    let reply = say(&bot, 2, "soon").await;
    assert!(reply.text.contains("whole number"));

    let reply = say(&bot, 2, "60").await;
    assert!(reply.text.contains("extended by 60 days"));
    assert!(state(&bot, 2).await.is_idle());
}

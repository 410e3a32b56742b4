/// Background task implementations
use crate::{context::AppContext, db, error::BotResult};
use tracing::warn;

/// Remove conversation states past their TTL
pub async fn sweep_conversations(ctx: &AppContext) -> usize {
    ctx.conversations.sweep().await
}

/// Mark active accounts whose expiry has passed
pub async fn expire_accounts(ctx: &AppContext) -> BotResult<u64> {
    ctx.accounts.expire_due().await
}

/// Health check - database always, media server when sync is on
pub async fn health_check(ctx: &AppContext) -> BotResult<()> {
    db::test_connection(&ctx.db).await?;

    // An unreachable media server degrades sync but is not fatal
    if let Some(server) = ctx.media_server() {
        if let Err(e) = server.ping().await {
            warn!("Media server health check failed: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::config::{
        AccountConfig, BotConfig, LoggingConfig, RemoteConfig, StorageConfig, TelegramConfig,
    };
    use crate::conversation::ConversationState;
    use crate::db::create_memory_pool;
    use crate::user::ExternalIdentity;
    use chrono::{Duration, Utc};
    use std::path::PathBuf;

    fn config() -> BotConfig {
        BotConfig {
            telegram: TelegramConfig {
                token: "1:test".to_string(),
                admin_ids: vec![],
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
        }
    }

    async fn context() -> AppContext {
        let pool = create_memory_pool().await.unwrap();
        AppContext::with_pool(config(), pool, None)
    }

    #[tokio::test]
    async fn test_health_check_without_remote() {
        let ctx = context().await;
        assert!(health_check(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_states() {
        let ctx = context().await;
        ctx.conversations
            .set_state(7, ConversationState::WaitingInviteCode)
            .await;

        assert_eq!(sweep_conversations(&ctx).await, 0);
        assert_eq!(
            ctx.conversations.get_state(7).await,
            ConversationState::WaitingInviteCode
        );
    }

    #[tokio::test]
    async fn test_expire_accounts() {
        let ctx = context().await;
        let identity = ExternalIdentity {
            telegram_id: 100,
            username: "owner".to_string(),
            ..Default::default()
        };
        let owner = ctx.users.get_or_create(&identity).await.unwrap();
        let owner = ctx.users.set_quota(owner.id, 2).await.unwrap();
        let (account, _) = ctx.accounts.create("lapsed", owner.id).await.unwrap();

        sqlx::query("UPDATE accounts SET expire_at = ? WHERE id = ?")
            .bind(db::format_timestamp(&(Utc::now() - Duration::days(1))))
            .bind(account.id)
            .execute(&ctx.db)
            .await
            .unwrap();

        assert_eq!(expire_accounts(&ctx).await.unwrap(), 1);
        assert_eq!(
            ctx.accounts.get(account.id).await.unwrap().status,
            AccountStatus::Expired
        );
        assert_eq!(expire_accounts(&ctx).await.unwrap(), 0);
    }
}

/// Application context and dependency injection
use crate::{
    account::{AccountService, SyncOptions},
    config::BotConfig,
    conversation::ConversationStateMachine,
    db,
    error::BotResult,
    invite::InviteCodeService,
    remote::MediaServer,
    store::{SqliteAccountStore, SqliteInviteCodeStore, SqliteUserStore},
    user::UserService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<BotConfig>,
    pub db: SqlitePool,
    pub users: Arc<UserService>,
    pub accounts: Arc<AccountService>,
    pub invites: Arc<InviteCodeService>,
    pub conversations: ConversationStateMachine,
    /// `None` in offline mode
    pub remote: Option<Arc<dyn MediaServer>>,
}

impl AppContext {
    /// Open the configured database, apply migrations and wire the services
    pub async fn new(config: BotConfig, remote: Option<Arc<dyn MediaServer>>) -> BotResult<Self> {
        config.validate()?;

        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.database_path, options).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::with_pool(config, pool, remote))
    }

    /// Wire services over an existing, migrated pool
    pub fn with_pool(
        config: BotConfig,
        pool: SqlitePool,
        remote: Option<Arc<dyn MediaServer>>,
    ) -> Self {
        let user_store = Arc::new(SqliteUserStore::new(pool.clone()));
        let account_store = Arc::new(SqliteAccountStore::new(pool.clone()));
        let code_store = Arc::new(SqliteInviteCodeStore::new(pool.clone()));

        let users = Arc::new(UserService::new(
            user_store.clone(),
            config.telegram.admin_ids.iter().copied(),
        ));
        let accounts = Arc::new(AccountService::new(
            account_store,
            user_store.clone(),
            remote.clone(),
            config.account.clone(),
            SyncOptions::from(&config.remote),
        ));
        let invites = Arc::new(InviteCodeService::new(code_store, user_store));

        Self {
            config: Arc::new(config),
            db: pool,
            users,
            accounts,
            invites,
            conversations: ConversationStateMachine::new(),
            remote,
        }
    }

    /// Remote client, only when synchronization is enabled
    pub fn media_server(&self) -> Option<&Arc<dyn MediaServer>> {
        if self.config.remote.enable_sync {
            self.remote.as_ref()
        } else {
            None
        }
    }
}

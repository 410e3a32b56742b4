/// Persistence contracts for accounts, users and invite codes
///
/// Services depend on these traits only. The SQLite implementations live in
/// `sqlite` and push conflict detection down to unique constraints.

pub mod sqlite;

pub use sqlite::{SqliteAccountStore, SqliteInviteCodeStore, SqliteUserStore};

use crate::{
    account::{Account, AccountStatus, AccountWithOwner},
    error::BotResult,
    invite::{InviteCode, InviteCodeUsage, InviteCodeWithUsage},
    user::{Role, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Account persistence
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account and return it with its id (`AlreadyExists` on duplicate username)
    async fn create(&self, account: &Account) -> BotResult<Account>;

    async fn get(&self, id: i64) -> BotResult<Option<Account>>;

    async fn get_by_username(&self, username: &str) -> BotResult<Option<Account>>;

    async fn get_with_owner(&self, id: i64) -> BotResult<Option<AccountWithOwner>>;

    /// All accounts of one owner, newest first
    async fn list_by_user(&self, user_id: i64) -> BotResult<Vec<Account>>;

    async fn list_all(&self, offset: i64, limit: i64) -> BotResult<Vec<Account>>;

    async fn list_all_with_owner(&self, offset: i64, limit: i64)
        -> BotResult<Vec<AccountWithOwner>>;

    /// Full read-modify-write of a single row
    async fn update(&self, account: &Account) -> BotResult<()>;

    /// Hard delete, returns whether a row was removed
    async fn delete(&self, id: i64) -> BotResult<bool>;

    async fn count(&self) -> BotResult<i64>;

    async fn count_by_user(&self, user_id: i64) -> BotResult<i64>;

    async fn count_by_status(&self, status: AccountStatus) -> BotResult<i64>;

    /// Flip active accounts whose expiry has passed to expired
    async fn expire_due(&self, now: DateTime<Utc>) -> BotResult<u64>;
}

/// User persistence (soft delete via `deleted_at`)
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user (`AlreadyExists` on duplicate telegram id)
    async fn create(&self, user: &User) -> BotResult<User>;

    async fn get(&self, id: i64) -> BotResult<Option<User>>;

    async fn get_by_telegram_id(&self, telegram_id: i64) -> BotResult<Option<User>>;

    /// Lookup that also returns soft-deleted rows
    async fn get_by_telegram_id_any(&self, telegram_id: i64) -> BotResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> BotResult<Option<User>>;

    async fn update(&self, user: &User) -> BotResult<()>;

    async fn soft_delete(&self, id: i64, now: DateTime<Utc>) -> BotResult<bool>;

    async fn restore(&self, id: i64) -> BotResult<()>;

    async fn list(&self, offset: i64, limit: i64) -> BotResult<Vec<User>>;

    async fn count(&self) -> BotResult<i64>;

    async fn count_by_role(&self, role: Role) -> BotResult<i64>;
}

/// Invite code persistence
#[async_trait]
pub trait InviteCodeStore: Send + Sync {
    /// Insert a new code (`AlreadyExists` on collision)
    async fn create(&self, code: &InviteCode) -> BotResult<InviteCode>;

    async fn get(&self, id: i64) -> BotResult<Option<InviteCode>>;

    async fn get_by_code(&self, code: &str) -> BotResult<Option<InviteCode>>;

    async fn get_with_usage(&self, code: &str) -> BotResult<Option<InviteCodeWithUsage>>;

    async fn update(&self, code: &InviteCode) -> BotResult<()>;

    async fn list(&self, offset: i64, limit: i64) -> BotResult<Vec<InviteCode>>;

    async fn count(&self) -> BotResult<i64>;

    async fn get_usage_by_user(&self, user_id: i64) -> BotResult<Option<InviteCodeUsage>>;

    /// Atomically grant quota 1, set the user's one-shot flag, record the
    /// usage row and count the use. Fails `AlreadyUsed` if the user already
    /// redeemed, or with the code's invalid state if it can no longer be used.
    async fn redeem(&self, code_id: i64, user_id: i64, now: DateTime<Utc>)
        -> BotResult<InviteCode>;
}

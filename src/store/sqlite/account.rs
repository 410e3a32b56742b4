/// SQLite account store
use crate::{
    account::{Account, AccountStatus, AccountWithOwner, SyncStatus},
    db::{format_timestamp, parse_optional_timestamp, parse_timestamp},
    error::{BotError, BotResult},
    store::AccountStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const ACCOUNT_COLUMNS: &str = "accounts.id, accounts.username, accounts.password_hash, \
     accounts.user_id, accounts.status, accounts.expire_at, accounts.max_devices, \
     accounts.emby_user_id, accounts.sync_status, accounts.last_sync_at, accounts.sync_error, \
     accounts.created_at, accounts.updated_at";

#[derive(Clone)]
pub struct SqliteAccountStore {
    db: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn account_from_row(row: &SqliteRow) -> BotResult<Account> {
        let status: String = row.try_get("status")?;
        let sync_status: String = row.try_get("sync_status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Account {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            user_id: row.try_get("user_id")?,
            status: AccountStatus::from_str(&status)?,
            expire_at: parse_optional_timestamp(row.try_get("expire_at")?)?,
            max_devices: row.try_get("max_devices")?,
            emby_user_id: row.try_get("emby_user_id")?,
            sync_status: SyncStatus::from_str(&sync_status)?,
            last_sync_at: parse_optional_timestamp(row.try_get("last_sync_at")?)?,
            sync_error: row.try_get("sync_error")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn with_owner_from_row(row: &SqliteRow) -> BotResult<AccountWithOwner> {
        Ok(AccountWithOwner {
            account: Self::account_from_row(row)?,
            owner_username: row
                .try_get::<Option<String>, _>("owner_username")?
                .unwrap_or_default(),
            owner_first_name: row
                .try_get::<Option<String>, _>("owner_first_name")?
                .unwrap_or_default(),
            owner_telegram_id: row
                .try_get::<Option<i64>, _>("owner_telegram_id")?
                .unwrap_or_default(),
        })
    }

    fn with_owner_query(filter: &str) -> String {
        format!(
            "SELECT {}, users.username AS owner_username, users.first_name AS owner_first_name, \
             users.telegram_id AS owner_telegram_id \
             FROM accounts LEFT JOIN users ON users.id = accounts.user_id {}",
            ACCOUNT_COLUMNS, filter
        )
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn create(&self, account: &Account) -> BotResult<Account> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, user_id, status, expire_at, max_devices,
                                  emby_user_id, sync_status, last_sync_at, sync_error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.user_id)
        .bind(account.status.as_str())
        .bind(account.expire_at.as_ref().map(format_timestamp))
        .bind(account.max_devices)
        .bind(&account.emby_user_id)
        .bind(account.sync_status.as_str())
        .bind(account.last_sync_at.as_ref().map(format_timestamp))
        .bind(&account.sync_error)
        .bind(format_timestamp(&account.created_at))
        .bind(format_timestamp(&account.updated_at))
        .execute(&self.db)
        .await
        .map_err(|e| BotError::from_insert(e, format!("account {}", account.username)))?;

        let mut created = account.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get(&self, id: i64) -> BotResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn get_by_username(&self, username: &str) -> BotResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE username = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn get_with_owner(&self, id: i64) -> BotResult<Option<AccountWithOwner>> {
        let row = sqlx::query(&Self::with_owner_query("WHERE accounts.id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::with_owner_from_row).transpose()
    }

    async fn list_by_user(&self, user_id: i64) -> BotResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::account_from_row).collect()
    }

    async fn list_all(&self, offset: i64, limit: i64) -> BotResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            ACCOUNT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::account_from_row).collect()
    }

    async fn list_all_with_owner(
        &self,
        offset: i64,
        limit: i64,
    ) -> BotResult<Vec<AccountWithOwner>> {
        let rows = sqlx::query(&Self::with_owner_query(
            "ORDER BY accounts.created_at DESC, accounts.id DESC LIMIT ? OFFSET ?",
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::with_owner_from_row).collect()
    }

    async fn update(&self, account: &Account) -> BotResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET username = ?, password_hash = ?, user_id = ?, status = ?, expire_at = ?,
                max_devices = ?, emby_user_id = ?, sync_status = ?, last_sync_at = ?,
                sync_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.user_id)
        .bind(account.status.as_str())
        .bind(account.expire_at.as_ref().map(format_timestamp))
        .bind(account.max_devices)
        .bind(&account.emby_user_id)
        .bind(account.sync_status.as_str())
        .bind(account.last_sync_at.as_ref().map(format_timestamp))
        .bind(&account.sync_error)
        .bind(format_timestamp(&Utc::now()))
        .bind(account.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::NotFound(format!("account {}", account.id)));
        }

        Ok(())
    }

    async fn delete(&self, id: i64) -> BotResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> BotResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_by_user(&self, user_id: i64) -> BotResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_by_status(&self, status: AccountStatus) -> BotResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> BotResult<u64> {
        let now = format_timestamp(&now);
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = 'expired', updated_at = ?
            WHERE status = 'active' AND expire_at IS NOT NULL AND expire_at <= ?
            "#,
        )
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use chrono::Duration;

    async fn setup() -> (SqliteAccountStore, i64) {
        let db = create_memory_pool().await.unwrap();
        let now = format_timestamp(&Utc::now());
        let owner_id = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_name, created_at, updated_at) VALUES (7, 'owner', 'Own', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&db)
        .await
        .unwrap()
        .last_insert_rowid();

        (SqliteAccountStore::new(db), owner_id)
    }

    fn sample(username: &str, owner: i64, expire_at: Option<DateTime<Utc>>) -> Account {
        Account::new(
            username.to_string(),
            "hash".to_string(),
            owner,
            expire_at,
            3,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, owner) = setup().await;
        let created = store
            .create(&sample("alice", owner, Some(Utc::now() + Duration::days(30))))
            .await
            .unwrap();
        assert!(created.id > 0);

        let fetched = store.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.status, AccountStatus::Active);
        assert_eq!(fetched.sync_status, SyncStatus::Pending);
        assert!(fetched.expire_at.is_some());

        assert!(store.get(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (store, owner) = setup().await;
        store.create(&sample("alice", owner, None)).await.unwrap();

        let err = store.create(&sample("alice", owner, None)).await.unwrap_err();
        assert!(matches!(err, BotError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (store, owner) = setup().await;
        let mut acc = store.create(&sample("bob", owner, None)).await.unwrap();

        acc.mark_synced("remote-9", Utc::now());
        acc.suspend();
        store.update(&acc).await.unwrap();

        let fetched = store.get(acc.id).await.unwrap().unwrap();
        assert_eq!(fetched.emby_user_id, "remote-9");
        assert_eq!(fetched.status, AccountStatus::Suspended);
        assert!(fetched.is_synced());

        assert!(store.delete(acc.id).await.unwrap());
        assert!(!store.delete(acc.id).await.unwrap());
        assert!(store.get(acc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_join_and_counts() {
        let (store, owner) = setup().await;
        store.create(&sample("one", owner, None)).await.unwrap();
        store.create(&sample("two", owner, None)).await.unwrap();

        let listed = store.list_all_with_owner(0, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].owner_display_name(), "@owner");
        assert_eq!(listed[0].owner_telegram_id, 7);

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.count_by_user(owner).await.unwrap(), 2);
        assert_eq!(store.count_by_status(AccountStatus::Active).await.unwrap(), 2);
        assert_eq!(store.list_all(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expire_due() {
        let (store, owner) = setup().await;
        let now = Utc::now();
        store
            .create(&sample("old", owner, Some(now - Duration::days(1))))
            .await
            .unwrap();
        store
            .create(&sample("fresh", owner, Some(now + Duration::days(1))))
            .await
            .unwrap();
        store.create(&sample("forever", owner, None)).await.unwrap();

        assert_eq!(store.expire_due(now).await.unwrap(), 1);
        let old = store.get_by_username("old").await.unwrap().unwrap();
        assert_eq!(old.status, AccountStatus::Expired);
        assert_eq!(store.expire_due(now).await.unwrap(), 0);
    }
}

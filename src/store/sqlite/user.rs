/// SQLite user store
use crate::{
    db::{format_timestamp, parse_optional_timestamp, parse_timestamp},
    error::{BotError, BotResult},
    store::UserStore,
    user::{Role, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, role, is_blocked, \
     account_quota, used_invite_code, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct SqliteUserStore {
    db: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn user_from_row(row: &SqliteRow) -> BotResult<User> {
        let role: String = row.try_get("role")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(User {
            id: row.try_get("id")?,
            telegram_id: row.try_get("telegram_id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            role: Role::from_str(&role)?,
            is_blocked: row.try_get("is_blocked")?,
            account_quota: row.try_get("account_quota")?,
            used_invite_code: row.try_get("used_invite_code")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            deleted_at: parse_optional_timestamp(row.try_get("deleted_at")?)?,
        })
    }

    async fn fetch_one_where(&self, filter: &str, value: i64) -> BotResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, filter))
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::user_from_row).transpose()
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, user: &User) -> BotResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (telegram_id, username, first_name, last_name, role, is_blocked,
                               account_quota, used_invite_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.telegram_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_blocked)
        .bind(user.account_quota.max(0))
        .bind(user.used_invite_code)
        .bind(format_timestamp(&user.created_at))
        .bind(format_timestamp(&user.updated_at))
        .execute(&self.db)
        .await
        .map_err(|e| BotError::from_insert(e, format!("user {}", user.telegram_id)))?;

        let mut created = user.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get(&self, id: i64) -> BotResult<Option<User>> {
        self.fetch_one_where("id = ? AND deleted_at IS NULL", id).await
    }

    async fn get_by_telegram_id(&self, telegram_id: i64) -> BotResult<Option<User>> {
        self.fetch_one_where("telegram_id = ? AND deleted_at IS NULL", telegram_id)
            .await
    }

    async fn get_by_telegram_id_any(&self, telegram_id: i64) -> BotResult<Option<User>> {
        self.fetch_one_where("telegram_id = ?", telegram_id).await
    }

    async fn get_by_username(&self, username: &str) -> BotResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ? COLLATE NOCASE AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn update(&self, user: &User) -> BotResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, first_name = ?, last_name = ?, role = ?, is_blocked = ?,
                account_quota = ?, used_invite_code = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_blocked)
        .bind(user.account_quota.max(0))
        .bind(user.used_invite_code)
        .bind(format_timestamp(&Utc::now()))
        .bind(user.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::NotFound(format!("user {}", user.telegram_id)));
        }

        Ok(())
    }

    async fn soft_delete(&self, id: i64, now: DateTime<Utc>) -> BotResult<bool> {
        let now = format_timestamp(&now);
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn restore(&self, id: i64) -> BotResult<()> {
        sqlx::query("UPDATE users SET deleted_at = NULL, updated_at = ? WHERE id = ?")
            .bind(format_timestamp(&Utc::now()))
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn list(&self, offset: i64, limit: i64) -> BotResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::user_from_row).collect()
    }

    async fn count(&self) -> BotResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_by_role(&self, role: Role) -> BotResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = ? AND deleted_at IS NULL",
        )
        .bind(role.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }
}

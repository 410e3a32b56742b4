/// SQLite invite code store
use crate::{
    db::{format_timestamp, parse_optional_timestamp, parse_timestamp},
    error::{BotError, BotResult},
    invite::{InviteCode, InviteCodeStatus, InviteCodeUsage, InviteCodeWithUsage},
    store::InviteCodeStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const CODE_COLUMNS: &str = "id, code, max_uses, current_uses, description, expire_at, status, \
     created_by, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteInviteCodeStore {
    db: SqlitePool,
}

impl SqliteInviteCodeStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn code_from_row(row: &SqliteRow) -> BotResult<InviteCode> {
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(InviteCode {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            max_uses: row.try_get("max_uses")?,
            current_uses: row.try_get("current_uses")?,
            description: row.try_get("description")?,
            expire_at: parse_optional_timestamp(row.try_get("expire_at")?)?,
            status: InviteCodeStatus::from_str(&status)?,
            created_by: row.try_get("created_by")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn usage_from_row(row: &SqliteRow) -> BotResult<InviteCodeUsage> {
        let used_at: String = row.try_get("used_at")?;

        Ok(InviteCodeUsage {
            id: row.try_get("id")?,
            invite_code_id: row.try_get("invite_code_id")?,
            user_id: row.try_get("user_id")?,
            used_at: parse_timestamp(&used_at)?,
        })
    }
}

#[async_trait]
impl InviteCodeStore for SqliteInviteCodeStore {
    async fn create(&self, code: &InviteCode) -> BotResult<InviteCode> {
        let result = sqlx::query(
            r#"
            INSERT INTO invite_codes (code, max_uses, current_uses, description, expire_at,
                                      status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code.code)
        .bind(code.max_uses)
        .bind(code.current_uses)
        .bind(&code.description)
        .bind(code.expire_at.as_ref().map(format_timestamp))
        .bind(code.status.as_str())
        .bind(code.created_by)
        .bind(format_timestamp(&code.created_at))
        .bind(format_timestamp(&code.updated_at))
        .execute(&self.db)
        .await
        .map_err(|e| BotError::from_insert(e, format!("invite code {}", code.code)))?;

        let mut created = code.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get(&self, id: i64) -> BotResult<Option<InviteCode>> {
        let row = sqlx::query(&format!("SELECT {} FROM invite_codes WHERE id = ?", CODE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Self::code_from_row).transpose()
    }

    async fn get_by_code(&self, code: &str) -> BotResult<Option<InviteCode>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM invite_codes WHERE code = ?",
            CODE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::code_from_row).transpose()
    }

    async fn get_with_usage(&self, code: &str) -> BotResult<Option<InviteCodeWithUsage>> {
        let invite_code = match self.get_by_code(code).await? {
            Some(c) => c,
            None => return Ok(None),
        };

        let rows = sqlx::query(
            r#"
            SELECT id, invite_code_id, user_id, used_at
            FROM invite_code_usage
            WHERE invite_code_id = ?
            ORDER BY used_at DESC, id DESC
            "#,
        )
        .bind(invite_code.id)
        .fetch_all(&self.db)
        .await?;

        let usage = rows
            .iter()
            .map(Self::usage_from_row)
            .collect::<BotResult<Vec<_>>>()?;

        Ok(Some(InviteCodeWithUsage { invite_code, usage }))
    }

    async fn update(&self, code: &InviteCode) -> BotResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invite_codes
            SET max_uses = ?, current_uses = ?, description = ?, expire_at = ?, status = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(code.max_uses)
        .bind(code.current_uses)
        .bind(&code.description)
        .bind(code.expire_at.as_ref().map(format_timestamp))
        .bind(code.status.as_str())
        .bind(format_timestamp(&Utc::now()))
        .bind(code.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BotError::NotFound(format!("invite code {}", code.code)));
        }

        Ok(())
    }

    async fn list(&self, offset: i64, limit: i64) -> BotResult<Vec<InviteCode>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM invite_codes ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            CODE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Self::code_from_row).collect()
    }

    async fn count(&self) -> BotResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invite_codes")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn get_usage_by_user(&self, user_id: i64) -> BotResult<Option<InviteCodeUsage>> {
        let row = sqlx::query(
            "SELECT id, invite_code_id, user_id, used_at FROM invite_code_usage WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::usage_from_row).transpose()
    }

    async fn redeem(
        &self,
        code_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> BotResult<InviteCode> {
        let stamp = format_timestamp(&now);
        let mut tx = self.db.begin().await?;

        // One-shot flag doubles as the per-user lock
        let granted = sqlx::query(
            r#"
            UPDATE users
            SET account_quota = 1, used_invite_code = 1, updated_at = ?
            WHERE id = ? AND used_invite_code = 0 AND deleted_at IS NULL
            "#,
        )
        .bind(&stamp)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if granted.rows_affected() == 0 {
            return Err(BotError::AlreadyUsed);
        }

        let counted = sqlx::query(
            r#"
            UPDATE invite_codes
            SET current_uses = current_uses + 1,
                status = CASE
                    WHEN (expire_at IS NOT NULL AND expire_at <= ?)
                      OR (max_uses != -1 AND current_uses + 1 >= max_uses)
                    THEN 'expired'
                    ELSE status
                END,
                updated_at = ?
            WHERE id = ?
              AND status = 'active'
              AND (expire_at IS NULL OR expire_at > ?)
              AND (max_uses = -1 OR current_uses < max_uses)
            "#,
        )
        .bind(&stamp)
        .bind(&stamp)
        .bind(code_id)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        if counted.rows_affected() == 0 {
            let row = sqlx::query(&format!(
                "SELECT {} FROM invite_codes WHERE id = ?",
                CODE_COLUMNS
            ))
            .bind(code_id)
            .fetch_optional(&mut *tx)
            .await?;

            return match row.as_ref().map(Self::code_from_row).transpose()? {
                Some(code) => {
                    code.check_redeemable(now)?;
                    Err(BotError::CodeExhausted)
                }
                None => Err(BotError::InvalidCode),
            };
        }

        sqlx::query(
            "INSERT INTO invite_code_usage (invite_code_id, user_id, used_at) VALUES (?, ?, ?)",
        )
        .bind(code_id)
        .bind(user_id)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| match BotError::from_insert(e, "usage".to_string()) {
            BotError::AlreadyExists(_) => BotError::AlreadyUsed,
            other => other,
        })?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM invite_codes WHERE id = ?",
            CODE_COLUMNS
        ))
        .bind(code_id)
        .fetch_one(&mut *tx)
        .await?;
        let code = Self::code_from_row(&row)?;

        tx.commit().await?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use crate::invite::UNLIMITED_USES;
    use chrono::Duration;

    async fn insert_user(db: &SqlitePool, telegram_id: i64) -> i64 {
        let now = format_timestamp(&Utc::now());
        sqlx::query(
            "INSERT INTO users (telegram_id, username, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(telegram_id)
        .bind(format!("user{}", telegram_id))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    fn new_code(code: &str, max_uses: i64, expire_at: Option<DateTime<Utc>>) -> InviteCode {
        let now = Utc::now();
        InviteCode {
            id: 0,
            code: code.to_string(),
            max_uses,
            current_uses: 0,
            description: "test".to_string(),
            expire_at,
            status: InviteCodeStatus::Active,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_collision() {
        let store = SqliteInviteCodeStore::new(create_memory_pool().await.unwrap());
        let created = store.create(&new_code("ABCDEFGH", 1, None)).await.unwrap();
        assert!(created.id > 0);

        let err = store.create(&new_code("ABCDEFGH", 1, None)).await.unwrap_err();
        assert!(matches!(err, BotError::AlreadyExists(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redeem_grants_quota_once() {
        let db = create_memory_pool().await.unwrap();
        let store = SqliteInviteCodeStore::new(db.clone());
        let code = store
            .create(&new_code("UNLIMIT2", UNLIMITED_USES, None))
            .await
            .unwrap();
        let user_id = insert_user(&db, 10).await;

        let redeemed = store.redeem(code.id, user_id, Utc::now()).await.unwrap();
        assert_eq!(redeemed.current_uses, 1);
        assert_eq!(redeemed.status, InviteCodeStatus::Active);

        let (quota, used): (i64, bool) =
            sqlx::query_as("SELECT account_quota, used_invite_code FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(quota, 1);
        assert!(used);

        let err = store.redeem(code.id, user_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::AlreadyUsed));

        let usage = store.get_usage_by_user(user_id).await.unwrap().unwrap();
        assert_eq!(usage.invite_code_id, code.id);

        let with_usage = store.get_with_usage("UNLIMIT2").await.unwrap().unwrap();
        assert_eq!(with_usage.usage.len(), 1);
        assert_eq!(with_usage.invite_code.current_uses, 1);
    }

    #[tokio::test]
    async fn test_single_use_code_exhausts() {
        let db = create_memory_pool().await.unwrap();
        let store = SqliteInviteCodeStore::new(db.clone());
        let code = store.create(&new_code("SINGLE23", 1, None)).await.unwrap();
        let first = insert_user(&db, 20).await;
        let second = insert_user(&db, 21).await;

        let redeemed = store.redeem(code.id, first, Utc::now()).await.unwrap();
        assert_eq!(redeemed.status, InviteCodeStatus::Expired);

        let err = store.redeem(code.id, second, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::CodeExhausted));

        // Failed redemption leaves the second user untouched
        let quota: i64 = sqlx::query_scalar("SELECT account_quota FROM users WHERE id = ?")
            .bind(second)
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(quota, 0);
        assert!(store.get_usage_by_user(second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redeem_expired_and_revoked() {
        let db = create_memory_pool().await.unwrap();
        let store = SqliteInviteCodeStore::new(db.clone());
        let user_id = insert_user(&db, 30).await;

        let stale = store
            .create(&new_code(
                "EXPIRED2",
                5,
                Some(Utc::now() - Duration::hours(1)),
            ))
            .await
            .unwrap();
        let err = store.redeem(stale.id, user_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::CodeExpired));

        let mut revoked = store.create(&new_code("REVOKED2", 5, None)).await.unwrap();
        revoked.revoke();
        store.update(&revoked).await.unwrap();
        let err = store.redeem(revoked.id, user_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::CodeRevoked));

        let err = store.redeem(9999, user_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::InvalidCode));
    }
}

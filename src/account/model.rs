/// Account data model
use crate::error::{BotError, BotResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Expired,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> BotResult<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "expired" => Ok(AccountStatus::Expired),
            _ => Err(BotError::Internal(format!("Invalid account status: {}", s))),
        }
    }
}

/// Last known agreement between the local account and its remote mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> BotResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(BotError::Internal(format!("Invalid sync status: {}", s))),
        }
    }
}

/// A provisioned media-server account owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub user_id: i64,
    pub status: AccountStatus,
    /// None means the account never expires
    pub expire_at: Option<DateTime<Utc>>,
    pub max_devices: i64,
    /// Empty until the first successful sync
    pub emby_user_id: String,
    pub sync_status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build an unsaved account (id 0) in the active state
    pub fn new(
        username: String,
        password_hash: String,
        user_id: i64,
        expire_at: Option<DateTime<Utc>>,
        max_devices: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            username,
            password_hash,
            user_id,
            status: AccountStatus::Active,
            expire_at,
            max_devices,
            emby_user_id: String::new(),
            sync_status: SyncStatus::Pending,
            last_sync_at: None,
            sync_error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn is_suspended(&self) -> bool {
        self.status == AccountStatus::Suspended
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expire_at, Some(t) if t <= now)
    }

    /// Active and not past its expiry
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && !self.is_expired_at(now)
    }

    /// Days left before expiry, -1 for permanent accounts
    pub fn days_until_expire(&self, now: DateTime<Utc>) -> i64 {
        match self.expire_at {
            None => -1,
            Some(t) => (t - now).num_days().max(0),
        }
    }

    pub fn activate(&mut self) {
        self.status = AccountStatus::Active;
    }

    pub fn suspend(&mut self) {
        self.status = AccountStatus::Suspended;
    }

    pub fn mark_expired(&mut self) {
        self.status = AccountStatus::Expired;
    }

    /// Extend expiry by `days`.
    ///
    /// A future expiry is extended in place; a past or absent expiry restarts
    /// from `now`, so renewing a permanent account makes it time-limited.
    /// Only an `expired` status flips back to `active`; suspension is kept.
    pub fn renew(&mut self, days: i64, now: DateTime<Utc>) {
        let base = match self.expire_at {
            Some(t) if t > now => t,
            _ => now,
        };
        self.expire_at = Some(base + Duration::days(days));

        if self.status == AccountStatus::Expired {
            self.status = AccountStatus::Active;
        }
    }

    /// Both the remote id and the sync status agree
    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced && !self.emby_user_id.is_empty()
    }

    /// Record a successful sync. An empty id keeps the previously known one;
    /// with no id at all the sync is recorded as failed instead.
    pub fn mark_synced(&mut self, remote_id: &str, now: DateTime<Utc>) {
        if !remote_id.is_empty() {
            self.emby_user_id = remote_id.to_string();
        }

        if self.emby_user_id.is_empty() {
            self.mark_sync_failed("remote server returned an empty user id", now);
            return;
        }

        self.sync_status = SyncStatus::Synced;
        self.sync_error.clear();
        self.last_sync_at = Some(now);
    }

    /// Record a failed sync; the remote id is left untouched
    pub fn mark_sync_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.sync_status = SyncStatus::Failed;
        self.sync_error = error.into();
        self.last_sync_at = Some(now);
    }

    pub fn mark_sync_pending(&mut self) {
        self.sync_status = SyncStatus::Pending;
        self.sync_error.clear();
    }
}

/// Account joined with its owner's display fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountWithOwner {
    #[serde(flatten)]
    pub account: Account,
    pub owner_username: String,
    pub owner_first_name: String,
    pub owner_telegram_id: i64,
}

impl AccountWithOwner {
    pub fn owner_display_name(&self) -> String {
        if !self.owner_username.is_empty() {
            format!("@{}", self.owner_username)
        } else if !self.owner_first_name.is_empty() {
            self.owner_first_name.clone()
        } else {
            self.owner_telegram_id.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(now: DateTime<Utc>) -> Account {
        Account::new(
            "alice".to_string(),
            "hash".to_string(),
            1,
            Some(now + Duration::days(30)),
            3,
            now,
        )
    }

    #[test]
    fn test_validity_follows_status_and_expiry() {
        let now = Utc::now();
        let mut acc = account(now);
        assert!(acc.is_valid_at(now));

        acc.suspend();
        assert!(!acc.is_valid_at(now));

        acc.activate();
        acc.expire_at = Some(now - Duration::seconds(1));
        assert!(!acc.is_valid_at(now));

        acc.expire_at = None;
        assert!(acc.is_valid_at(now));
    }

    #[test]
    fn test_renew_extends_future_expiry() {
        let now = Utc::now();
        let mut acc = account(now);
        acc.renew(10, now);
        assert_eq!(acc.expire_at, Some(now + Duration::days(40)));
    }

    #[test]
    fn test_renew_expired_restarts_from_now() {
        let now = Utc::now();
        let mut acc = account(now);
        acc.expire_at = Some(now - Duration::days(5));
        acc.mark_expired();

        acc.renew(30, now);
        assert_eq!(acc.expire_at, Some(now + Duration::days(30)));
        assert_eq!(acc.status, AccountStatus::Active);
    }

    #[test]
    fn test_renew_keeps_suspension() {
        let now = Utc::now();
        let mut acc = account(now);
        acc.suspend();
        acc.renew(30, now);
        assert_eq!(acc.status, AccountStatus::Suspended);
    }

    #[test]
    fn test_renew_permanent_becomes_time_limited() {
        let now = Utc::now();
        let mut acc = account(now);
        acc.expire_at = None;
        acc.renew(7, now);
        assert_eq!(acc.expire_at, Some(now + Duration::days(7)));
    }

    #[test]
    fn test_sync_markers_keep_invariant() {
        let now = Utc::now();
        let mut acc = account(now);

        acc.mark_synced("", now);
        assert_eq!(acc.sync_status, SyncStatus::Failed);
        assert!(!acc.is_synced());

        acc.mark_synced("remote-1", now);
        assert!(acc.is_synced());
        assert!(acc.sync_error.is_empty());

        acc.mark_sync_failed("boom", now);
        assert_eq!(acc.emby_user_id, "remote-1");
        assert_eq!(acc.sync_error, "boom");
        assert!(!acc.is_synced());
    }

    #[test]
    fn test_days_until_expire() {
        let now = Utc::now();
        let mut acc = account(now);
        assert_eq!(acc.days_until_expire(now), 30);
        acc.expire_at = None;
        assert_eq!(acc.days_until_expire(now), -1);
    }
}

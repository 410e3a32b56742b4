/// Invite code data model
use crate::error::{BotError, BotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// -1 for max_uses means unlimited
pub const UNLIMITED_USES: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteCodeStatus {
    Active,
    Expired,
    /// Terminal
    Revoked,
}

impl InviteCodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteCodeStatus::Active => "active",
            InviteCodeStatus::Expired => "expired",
            InviteCodeStatus::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> BotResult<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(InviteCodeStatus::Active),
            "expired" => Ok(InviteCodeStatus::Expired),
            "revoked" => Ok(InviteCodeStatus::Revoked),
            _ => Err(BotError::Internal(format!("Invalid invite code status: {}", s))),
        }
    }
}

/// Redeemable code granting a quota of one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteCode {
    pub id: i64,
    pub code: String,
    pub max_uses: i64,
    pub current_uses: i64,
    pub description: String,
    pub expire_at: Option<DateTime<Utc>>,
    pub status: InviteCodeStatus,
    /// Telegram id of the admin who generated it
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InviteCode {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expire_at, Some(t) if t <= now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses != UNLIMITED_USES && self.current_uses >= self.max_uses
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteCodeStatus::Active && !self.is_expired_at(now) && !self.is_exhausted()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Reason the code cannot be redeemed, checked revoked, expired, exhausted
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> BotResult<()> {
        if self.status == InviteCodeStatus::Revoked {
            return Err(BotError::CodeRevoked);
        }
        if self.is_expired_at(now) {
            return Err(BotError::CodeExpired);
        }
        if self.is_exhausted() {
            return Err(BotError::CodeExhausted);
        }
        if self.status != InviteCodeStatus::Active {
            return Err(BotError::CodeExpired);
        }
        Ok(())
    }

    pub fn revoke(&mut self) {
        self.status = InviteCodeStatus::Revoked;
    }

    pub fn uses_label(&self) -> String {
        if self.max_uses == UNLIMITED_USES {
            format!("{}/unlimited", self.current_uses)
        } else {
            format!("{}/{}", self.current_uses, self.max_uses)
        }
    }
}

/// Immutable redemption record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteCodeUsage {
    pub id: i64,
    pub invite_code_id: i64,
    pub user_id: i64,
    pub used_at: DateTime<Utc>,
}

/// Code with its redemption history, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteCodeWithUsage {
    pub invite_code: InviteCode,
    pub usage: Vec<InviteCodeUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(max_uses: i64, now: DateTime<Utc>) -> InviteCode {
        InviteCode {
            id: 1,
            code: "ABCD2345".to_string(),
            max_uses,
            current_uses: 0,
            description: String::new(),
            expire_at: Some(now + Duration::days(30)),
            status: InviteCodeStatus::Active,
            created_by: 42,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_single_use_code_exhausts() {
        let now = Utc::now();
        let mut ic = code(1, now);
        assert!(ic.is_valid_at(now));

        ic.current_uses = 1;
        assert!(ic.is_exhausted());
        assert!(!ic.is_valid_at(now));
        assert!(matches!(ic.check_redeemable(now), Err(BotError::CodeExhausted)));
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let now = Utc::now();
        let mut ic = code(UNLIMITED_USES, now);
        ic.current_uses = 100;
        assert!(!ic.is_exhausted());
        assert!(ic.is_valid_at(now));
    }

    #[test]
    fn test_check_priority() {
        let now = Utc::now();
        let mut ic = code(1, now);
        ic.current_uses = 1;
        ic.expire_at = Some(now - Duration::days(1));
        assert!(matches!(ic.check_redeemable(now), Err(BotError::CodeExpired)));

        ic.revoke();
        assert!(matches!(ic.check_redeemable(now), Err(BotError::CodeRevoked)));
    }

    #[test]
    fn test_expired_status_without_reaching_limits() {
        let now = Utc::now();
        let mut ic = code(5, now);
        ic.status = InviteCodeStatus::Expired;
        assert!(!ic.is_valid_at(now));
        assert!(matches!(ic.check_redeemable(now), Err(BotError::CodeExpired)));
    }
}

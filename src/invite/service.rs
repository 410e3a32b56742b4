/// Invite code generation and redemption
use super::model::{InviteCode, InviteCodeStatus, InviteCodeUsage, InviteCodeWithUsage, UNLIMITED_USES};
use crate::{
    error::{BotError, BotResult},
    store::{InviteCodeStore, UserStore},
    validation::normalize_code,
};
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Unambiguous characters (no I, O, 0, 1)
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 8;

const MAX_GENERATE_ATTEMPTS: usize = 5;

/// Random code over `CODE_ALPHABET`
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub struct InviteCodeService {
    codes: Arc<dyn InviteCodeStore>,
    users: Arc<dyn UserStore>,
}

impl InviteCodeService {
    pub fn new(codes: Arc<dyn InviteCodeStore>, users: Arc<dyn UserStore>) -> Self {
        Self { codes, users }
    }

    /// Create a new active code.
    ///
    /// `max_uses` is -1 (unlimited) or positive; `expire_days <= 0` means no
    /// expiry. Collisions are retried with a fresh code.
    pub async fn generate(
        &self,
        max_uses: i64,
        expire_days: i64,
        description: &str,
        created_by: i64,
    ) -> BotResult<InviteCode> {
        if max_uses != UNLIMITED_USES && max_uses <= 0 {
            return Err(BotError::InvalidMaxUses);
        }

        let now = Utc::now();
        let expire_at = (expire_days > 0).then(|| now + Duration::days(expire_days));

        let mut last_err = BotError::Internal("invite code generation not attempted".to_string());
        for attempt in 1..=MAX_GENERATE_ATTEMPTS {
            let candidate = InviteCode {
                id: 0,
                code: generate_code(),
                max_uses,
                current_uses: 0,
                description: description.trim().to_string(),
                expire_at,
                status: InviteCodeStatus::Active,
                created_by,
                created_at: now,
                updated_at: now,
            };

            match self.codes.create(&candidate).await {
                Ok(created) => {
                    info!("Invite code {} generated by {}", created.code, created_by);
                    return Ok(created);
                }
                Err(e @ BotError::AlreadyExists(_)) => {
                    warn!("Invite code collision on attempt {}", attempt);
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err)
    }

    /// Redeem `code` for `user_id`, granting a quota of one
    pub async fn activate(&self, code: &str, user_id: i64) -> BotResult<InviteCode> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(BotError::InvalidCode);
        }

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("user {}", user_id)))?;

        if user.used_invite_code {
            return Err(BotError::AlreadyUsed);
        }
        if user.account_quota > 0 {
            return Err(BotError::HasQuota);
        }

        let invite = self
            .codes
            .get_by_code(&code)
            .await?
            .ok_or(BotError::InvalidCode)?;

        let now = Utc::now();
        invite.check_redeemable(now)?;

        let redeemed = self.codes.redeem(invite.id, user.id, now).await?;
        info!("Invite code {} redeemed by user {}", redeemed.code, user.telegram_id);
        Ok(redeemed)
    }

    pub async fn get(&self, id: i64) -> BotResult<InviteCode> {
        self.codes
            .get(id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("invite code {}", id)))
    }

    pub async fn get_by_code(&self, code: &str) -> BotResult<InviteCode> {
        let code = normalize_code(code);
        self.codes
            .get_by_code(&code)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("invite code {}", code)))
    }

    pub async fn get_with_usage(&self, code: &str) -> BotResult<InviteCodeWithUsage> {
        let code = normalize_code(code);
        self.codes
            .get_with_usage(&code)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("invite code {}", code)))
    }

    pub async fn get_usage_by_user(&self, user_id: i64) -> BotResult<Option<InviteCodeUsage>> {
        self.codes.get_usage_by_user(user_id).await
    }

    pub async fn list(&self, offset: i64, limit: i64) -> BotResult<Vec<InviteCode>> {
        self.codes.list(offset, limit).await
    }

    pub async fn count(&self) -> BotResult<i64> {
        self.codes.count().await
    }

    /// Revoke by code string; revocation is terminal
    pub async fn revoke(&self, code: &str) -> BotResult<InviteCode> {
        let mut invite = self.get_by_code(code).await?;
        invite.revoke();
        self.codes.update(&invite).await?;

        info!("Invite code {} revoked", invite.code);
        Ok(invite)
    }
}

/// User data model
use crate::error::{BotError, BotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> BotResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(BotError::InvalidRole(s.to_string())),
        }
    }
}

/// Identity fields carried by an inbound chat event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A principal interacting with the bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_blocked: bool,
    /// 0 means not authorized to create accounts
    pub account_quota: i64,
    pub used_invite_code: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Unsaved user for a first contact
    pub fn from_identity(identity: &ExternalIdentity, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            telegram_id: identity.telegram_id,
            username: identity.username.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: Role::User,
            is_blocked: false,
            account_quota: 0,
            used_invite_code: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => String::new(),
        }
    }

    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            return format!("@{}", self.username);
        }

        let full_name = self.full_name();
        if !full_name.is_empty() {
            full_name
        } else {
            self.telegram_id.to_string()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Blocked users cannot do anything, regardless of role
    pub fn can_access(&self) -> bool {
        !self.is_blocked
    }

    /// Whether the stored display fields differ from the event's
    pub fn profile_differs(&self, identity: &ExternalIdentity) -> bool {
        self.username != identity.username
            || self.first_name != identity.first_name
            || self.last_name != identity.last_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> ExternalIdentity {
        ExternalIdentity {
            telegram_id: 1001,
            username: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[test]
    fn test_new_user_defaults() {
        let user = User::from_identity(&identity(), Utc::now());
        assert_eq!(user.role, Role::User);
        assert_eq!(user.account_quota, 0);
        assert!(user.can_access());
        assert!(!user.used_invite_code);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = User::from_identity(&identity(), Utc::now());
        assert_eq!(user.display_name(), "Ada Lovelace");

        user.username = "ada".to_string();
        assert_eq!(user.display_name(), "@ada");

        user.username.clear();
        user.first_name.clear();
        user.last_name.clear();
        assert_eq!(user.display_name(), "1001");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str("ADMIN").unwrap(), Role::Admin);
        assert!(matches!(
            Role::from_str("owner"),
            Err(BotError::InvalidRole(_))
        ));
    }
}

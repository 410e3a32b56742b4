/// User service: identity resolution, roles, blocking and quota
use super::model::{ExternalIdentity, Role, User};
use crate::{
    error::{BotError, BotResult},
    store::UserStore,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct UserService {
    store: Arc<dyn UserStore>,
    /// Telegram ids with admin rights regardless of stored role
    admin_ids: HashSet<i64>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, admin_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            store,
            admin_ids: admin_ids.into_iter().collect(),
        }
    }

    /// Resolve the principal behind an inbound event, creating it on first
    /// contact. Display fields are refreshed when they changed and a
    /// soft-deleted user is restored.
    pub async fn get_or_create(&self, identity: &ExternalIdentity) -> BotResult<User> {
        if let Some(user) = self.store.get_by_telegram_id(identity.telegram_id).await? {
            return self.refresh_profile(user, identity).await;
        }

        if let Some(user) = self.store.get_by_telegram_id_any(identity.telegram_id).await? {
            return self.revive(user, identity).await;
        }

        match self.store.create(&User::from_identity(identity, Utc::now())).await {
            Ok(user) => {
                info!("New user {} ({})", user.display_name(), user.telegram_id);
                Ok(user)
            }
            // Lost a first-contact race; the winner's row is authoritative
            Err(BotError::AlreadyExists(_)) => {
                let user = self
                    .store
                    .get_by_telegram_id_any(identity.telegram_id)
                    .await?
                    .ok_or_else(|| BotError::NotFound(format!("user {}", identity.telegram_id)))?;
                if user.deleted_at.is_some() {
                    self.revive(user, identity).await
                } else {
                    Ok(user)
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn revive(&self, user: User, identity: &ExternalIdentity) -> BotResult<User> {
        self.store.restore(user.id).await?;
        info!("Restored user {}", user.telegram_id);

        let restored = self.require(user.telegram_id).await?;
        self.refresh_profile(restored, identity).await
    }

    async fn refresh_profile(&self, mut user: User, identity: &ExternalIdentity) -> BotResult<User> {
        if !user.profile_differs(identity) {
            return Ok(user);
        }

        user.username = identity.username.clone();
        user.first_name = identity.first_name.clone();
        user.last_name = identity.last_name.clone();

        // Stale display fields are harmless
        if let Err(e) = self.store.update(&user).await {
            warn!("Failed to refresh profile for {}: {}", user.telegram_id, e);
        }
        Ok(user)
    }

    async fn require(&self, telegram_id: i64) -> BotResult<User> {
        self.store
            .get_by_telegram_id(telegram_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("user {}", telegram_id)))
    }

    pub async fn get(&self, id: i64) -> BotResult<User> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("user {}", id)))
    }

    pub async fn get_by_telegram_id(&self, telegram_id: i64) -> BotResult<User> {
        self.require(telegram_id).await
    }

    /// Lookup by chat username, with or without a leading `@`
    pub async fn get_by_username(&self, username: &str) -> BotResult<User> {
        let username = username.trim().trim_start_matches('@');
        self.store
            .get_by_username(username)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("user @{}", username)))
    }

    pub async fn list(&self, offset: i64, limit: i64) -> BotResult<Vec<User>> {
        self.store.list(offset, limit).await
    }

    pub async fn count(&self) -> BotResult<i64> {
        self.store.count().await
    }

    pub async fn count_by_role(&self, role: Role) -> BotResult<i64> {
        self.store.count_by_role(role).await
    }

    /// Explicit profile refresh for an existing user
    pub async fn update_profile(&self, identity: &ExternalIdentity) -> BotResult<User> {
        let user = self.require(identity.telegram_id).await?;
        self.refresh_profile(user, identity).await
    }

    /// Accepts only `admin` or `user`
    pub async fn set_role(&self, telegram_id: i64, role: &str) -> BotResult<User> {
        let role = Role::from_str(role)?;
        let mut user = self.require(telegram_id).await?;
        user.role = role;
        self.store.update(&user).await?;

        info!("User {} role set to {}", telegram_id, role.as_str());
        Ok(user)
    }

    pub async fn block(&self, telegram_id: i64) -> BotResult<User> {
        self.set_blocked(telegram_id, true).await
    }

    pub async fn unblock(&self, telegram_id: i64) -> BotResult<User> {
        self.set_blocked(telegram_id, false).await
    }

    async fn set_blocked(&self, telegram_id: i64, blocked: bool) -> BotResult<User> {
        let mut user = self.require(telegram_id).await?;
        user.is_blocked = blocked;
        self.store.update(&user).await?;

        info!("User {} blocked={}", telegram_id, blocked);
        Ok(user)
    }

    /// Set the account quota; negative values clamp to zero
    pub async fn set_quota(&self, user_id: i64, quota: i64) -> BotResult<User> {
        let mut user = self.get(user_id).await?;
        user.account_quota = quota.max(0);
        self.store.update(&user).await?;
        Ok(user)
    }

    pub async fn mark_invite_code_used(&self, user_id: i64) -> BotResult<()> {
        let mut user = self.get(user_id).await?;
        user.used_invite_code = true;
        self.store.update(&user).await
    }

    /// Fail with `Blocked` for blocked principals
    pub async fn check_access(&self, telegram_id: i64) -> BotResult<()> {
        let user = self.require(telegram_id).await?;
        if !user.can_access() {
            return Err(BotError::Blocked);
        }
        Ok(())
    }

    /// Stored admin role or a configured admin id
    pub fn is_admin(&self, user: &User) -> bool {
        user.is_admin() || self.is_configured_admin(user.telegram_id)
    }

    pub fn is_configured_admin(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }

    /// Soft delete; the row is restored on the user's next contact
    pub async fn delete(&self, telegram_id: i64) -> BotResult<()> {
        let user = self.require(telegram_id).await?;
        if !self.store.soft_delete(user.id, Utc::now()).await? {
            return Err(BotError::NotFound(format!("user {}", telegram_id)));
        }

        info!("User {} deleted", telegram_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;
    use crate::store::SqliteUserStore;

    async fn service(admin_ids: Vec<i64>) -> UserService {
        let db = create_memory_pool().await.unwrap();
        UserService::new(Arc::new(SqliteUserStore::new(db)), admin_ids)
    }

    fn identity(telegram_id: i64, username: &str) -> ExternalIdentity {
        ExternalIdentity {
            telegram_id,
            username: username.to_string(),
            first_name: "First".to_string(),
            last_name: String::new(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let svc = service(vec![]).await;
        let first = svc.get_or_create(&identity(1, "alice")).await.unwrap();
        let second = svc.get_or_create(&identity(1, "alice")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.account_quota, 0);
        assert_eq!(svc.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_profile_refresh_on_contact() {
        let svc = service(vec![]).await;
        svc.get_or_create(&identity(2, "old_name")).await.unwrap();

        let refreshed = svc.get_or_create(&identity(2, "new_name")).await.unwrap();
        assert_eq!(refreshed.username, "new_name");
        assert!(svc.get_by_username("@new_name").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_first_contact() {
        let svc = service(vec![]).await;
        let id = identity(3, "racer");

        let (a, b) = tokio::join!(svc.get_or_create(&id), svc.get_or_create(&id));
        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(svc.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleted_user_is_restored() {
        let svc = service(vec![]).await;
        let user = svc.get_or_create(&identity(4, "gone")).await.unwrap();
        svc.delete(4).await.unwrap();
        assert!(svc.get_by_telegram_id(4).await.is_err());

        let back = svc.get_or_create(&identity(4, "gone")).await.unwrap();
        assert_eq!(back.id, user.id);
        assert!(back.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_roles_and_blocking() {
        let svc = service(vec![99]).await;
        let user = svc.get_or_create(&identity(5, "bob")).await.unwrap();
        let configured = svc.get_or_create(&identity(99, "root")).await.unwrap();

        assert!(!svc.is_admin(&user));
        assert!(svc.is_admin(&configured));

        assert!(matches!(
            svc.set_role(5, "owner").await.unwrap_err(),
            BotError::InvalidRole(_)
        ));
        let promoted = svc.set_role(5, "admin").await.unwrap();
        assert!(svc.is_admin(&promoted));
        assert_eq!(svc.count_by_role(Role::Admin).await.unwrap(), 1);

        svc.block(5).await.unwrap();
        assert!(matches!(svc.check_access(5).await.unwrap_err(), BotError::Blocked));
        svc.unblock(5).await.unwrap();
        svc.check_access(5).await.unwrap();
    }

    #[tokio::test]
    async fn test_quota_clamps_to_zero() {
        let svc = service(vec![]).await;
        let user = svc.get_or_create(&identity(6, "carol")).await.unwrap();

        assert_eq!(svc.set_quota(user.id, 3).await.unwrap().account_quota, 3);
        assert_eq!(svc.set_quota(user.id, -2).await.unwrap().account_quota, 0);

        svc.mark_invite_code_used(user.id).await.unwrap();
        assert!(svc.get(user.id).await.unwrap().used_invite_code);
    }
}

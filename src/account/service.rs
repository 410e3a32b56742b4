/// Account service: validation, quota gating and the sync protocol
use super::model::{Account, AccountStatus, AccountWithOwner};
use crate::{
    config::{AccountConfig, RemoteConfig},
    crypto::{generate_password, hash_password},
    error::{BotError, BotResult},
    remote::{MediaServer, RemoteError, RemoteResult, UserPolicy},
    store::{AccountStore, UserStore},
    validation::{sanitize_username, validate_days, validate_max_devices, validate_password,
        validate_username},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which mutations are mirrored to the remote server
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub enable_sync: bool,
    pub sync_on_create: bool,
    pub sync_on_delete: bool,
}

impl From<&RemoteConfig> for SyncOptions {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            enable_sync: config.enable_sync,
            sync_on_create: config.sync_on_create,
            sync_on_delete: config.sync_on_delete,
        }
    }
}

/// Result of a manual re-provisioning request
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    AlreadySynced(Account),
    Synced(Account),
}

/// Remote operations that mirror a local mutation on an already-provisioned account
enum Mirror<'a> {
    Password(&'a str),
    Enable,
    Disable,
    DeviceLimit(i64),
}

impl Mirror<'_> {
    fn label(&self) -> &'static str {
        match self {
            Mirror::Password(_) => "update password",
            Mirror::Enable => "activate",
            Mirror::Disable => "suspend",
            Mirror::DeviceLimit(_) => "set device limit",
        }
    }
}

pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    users: Arc<dyn UserStore>,
    remote: Option<Arc<dyn MediaServer>>,
    config: AccountConfig,
    sync: SyncOptions,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        users: Arc<dyn UserStore>,
        remote: Option<Arc<dyn MediaServer>>,
        config: AccountConfig,
        sync: SyncOptions,
    ) -> Self {
        Self {
            accounts,
            users,
            remote,
            config,
            sync,
        }
    }

    /// Remote client when synchronization is switched on
    fn remote(&self) -> Option<&Arc<dyn MediaServer>> {
        if self.sync.enable_sync {
            self.remote.as_ref()
        } else {
            None
        }
    }

    pub fn sync_enabled(&self) -> bool {
        self.remote().is_some()
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Create an account with a generated password.
    ///
    /// Returns the plaintext password; it is not stored anywhere.
    pub async fn create(&self, username: &str, user_id: i64) -> BotResult<(Account, String)> {
        let username = self.check_new_account(username, user_id).await?;
        let password = generate_password(self.config.password_length);
        let account = self.insert_and_provision(username, &password, user_id).await?;
        Ok((account, password))
    }

    /// Create an account with a caller-chosen password
    pub async fn create_with_password(
        &self,
        username: &str,
        password: &str,
        user_id: i64,
    ) -> BotResult<Account> {
        validate_password(password)?;
        let username = self.check_new_account(username, user_id).await?;
        self.insert_and_provision(username, password, user_id).await
    }

    /// Shape, uniqueness, quota and hard-limit checks; returns the sanitized name
    async fn check_new_account(&self, username: &str, user_id: i64) -> BotResult<String> {
        let username = sanitize_username(username);
        validate_username(&username)?;

        if self.accounts.get_by_username(&username).await?.is_some() {
            return Err(BotError::AlreadyExists(format!("username {}", username)));
        }

        let owner = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("user {}", user_id)))?;
        let owned = self.accounts.count_by_user(user_id).await?;

        if owner.account_quota == 0 {
            return Err(BotError::NotAuthorized);
        }
        if owned >= owner.account_quota {
            return Err(BotError::QuotaExceeded {
                used: owned,
                quota: owner.account_quota,
            });
        }

        let limit = if owner.is_admin() {
            self.config.max_accounts_per_admin
        } else {
            self.config.max_accounts_per_user
        };
        if limit >= 0 && owned >= limit {
            return Err(BotError::AccountLimitExceeded { used: owned, limit });
        }

        Ok(username)
    }

    async fn insert_and_provision(
        &self,
        username: String,
        password: &str,
        user_id: i64,
    ) -> BotResult<Account> {
        let now = Utc::now();
        let account = Account::new(
            username.clone(),
            hash_password(password)?,
            user_id,
            Some(now + Duration::days(self.config.default_expire_days)),
            self.config.default_max_devices,
            now,
        );

        let mut account = self
            .accounts
            .create(&account)
            .await
            .map_err(|e| match e {
                BotError::AlreadyExists(_) => BotError::AlreadyExists(format!("username {}", username)),
                other => other,
            })?;

        info!("Account {} created for user {}", account.username, user_id);

        if self.sync.sync_on_create {
            if let Some(remote) = self.remote() {
                if let Err(e) = self.provision(remote.as_ref(), &mut account, password).await {
                    warn!(
                        "Account {} created locally but remote sync failed: {}",
                        account.username, e
                    );
                }
                self.persist_sync(&account).await;
            }
        }

        Ok(account)
    }

    /// Create the remote mirror and record the outcome on the account.
    ///
    /// A name conflict is treated as a previous half-finished attempt: the
    /// existing remote user is adopted.
    async fn provision(
        &self,
        remote: &dyn MediaServer,
        account: &mut Account,
        password: &str,
    ) -> RemoteResult<()> {
        match remote.create_user(&account.username, password).await {
            Ok(user) => {
                let policy = UserPolicy::default_for(account.max_devices);
                match remote.update_user_policy(&user.id, &policy).await {
                    Ok(()) => info!(
                        "Default policy applied to {} (max devices {})",
                        account.username, account.max_devices
                    ),
                    Err(e) => warn!("Failed to apply default policy to {}: {}", account.username, e),
                }
                account.mark_synced(&user.id, Utc::now());
                Ok(())
            }
            Err(RemoteError::UserAlreadyExists) => {
                match remote.get_user_by_name(&account.username).await {
                    Ok(existing) => {
                        info!("Adopted existing remote user for {}", account.username);
                        account.mark_synced(&existing.id, Utc::now());
                        Ok(())
                    }
                    Err(e) => {
                        account.mark_sync_failed(
                            format!("user exists but lookup failed: {}", e),
                            Utc::now(),
                        );
                        Err(e)
                    }
                }
            }
            Err(e) => {
                account.mark_sync_failed(e.to_string(), Utc::now());
                Err(e)
            }
        }
    }

    /// Second write after a sync attempt; failures are logged only
    async fn persist_sync(&self, account: &Account) {
        if let Err(e) = self.accounts.update(account).await {
            error!("Failed to record sync state for {}: {}", account.username, e);
        }
    }

    /// Push a local mutation to an already-provisioned remote user
    async fn mirror(&self, account: &mut Account, op: Mirror<'_>) {
        let remote = match self.remote() {
            Some(remote) if !account.emby_user_id.is_empty() => remote,
            _ => return,
        };

        let remote_id = account.emby_user_id.clone();
        let label = op.label();
        let result = match op {
            Mirror::Password(password) => remote.update_password(&remote_id, password).await,
            Mirror::Enable => remote.enable_user(&remote_id).await,
            Mirror::Disable => remote.disable_user(&remote_id).await,
            Mirror::DeviceLimit(limit) => remote.set_max_active_sessions(&remote_id, limit).await,
        };

        match result {
            Ok(()) => account.mark_synced(&remote_id, Utc::now()),
            Err(e) => {
                warn!(
                    "Account {}: {} applied locally but remote sync failed: {}",
                    account.username, label, e
                );
                account.mark_sync_failed(format!("{} failed: {}", label, e), Utc::now());
            }
        }

        self.persist_sync(account).await;
    }

    async fn load(&self, id: i64) -> BotResult<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("account {}", id)))
    }

    pub async fn get(&self, id: i64) -> BotResult<Account> {
        self.load(id).await
    }

    pub async fn get_by_username(&self, username: &str) -> BotResult<Account> {
        let username = sanitize_username(username);
        self.accounts
            .get_by_username(&username)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("account {}", username)))
    }

    pub async fn get_with_owner(&self, id: i64) -> BotResult<AccountWithOwner> {
        self.accounts
            .get_with_owner(id)
            .await?
            .ok_or_else(|| BotError::NotFound(format!("account {}", id)))
    }

    pub async fn list_by_user(&self, user_id: i64) -> BotResult<Vec<Account>> {
        self.accounts.list_by_user(user_id).await
    }

    pub async fn list_all(&self, offset: i64, limit: i64) -> BotResult<Vec<Account>> {
        self.accounts.list_all(offset, limit).await
    }

    pub async fn list_all_with_owner(
        &self,
        offset: i64,
        limit: i64,
    ) -> BotResult<Vec<AccountWithOwner>> {
        self.accounts.list_all_with_owner(offset, limit).await
    }

    /// Extend expiry by `days` (local only)
    pub async fn renew(&self, id: i64, days: i64) -> BotResult<Account> {
        validate_days(days)?;

        let mut account = self.load(id).await?;
        account.renew(days, Utc::now());
        self.accounts.update(&account).await?;

        info!("Account {} renewed by {} days", account.username, days);
        Ok(account)
    }

    pub async fn change_password(&self, id: i64, new_password: &str) -> BotResult<()> {
        validate_password(new_password)?;

        let mut account = self.load(id).await?;
        account.password_hash = hash_password(new_password)?;
        self.accounts.update(&account).await?;

        self.mirror(&mut account, Mirror::Password(new_password)).await;
        Ok(())
    }

    pub async fn suspend(&self, id: i64) -> BotResult<()> {
        let mut account = self.load(id).await?;
        account.suspend();
        self.accounts.update(&account).await?;

        self.mirror(&mut account, Mirror::Disable).await;
        Ok(())
    }

    pub async fn activate(&self, id: i64) -> BotResult<()> {
        let mut account = self.load(id).await?;
        account.activate();
        self.accounts.update(&account).await?;

        self.mirror(&mut account, Mirror::Enable).await;
        Ok(())
    }

    /// Persist a new device limit and push it as the remote stream limit
    pub async fn set_device_limit(&self, id: i64, max_devices: i64) -> BotResult<Account> {
        validate_max_devices(max_devices)?;

        let mut account = self.load(id).await?;
        account.max_devices = max_devices;
        self.accounts.update(&account).await?;

        self.mirror(&mut account, Mirror::DeviceLimit(max_devices)).await;
        Ok(account)
    }

    /// Hard delete. The remote user is removed first when configured; a
    /// missing remote user counts as removed and other remote failures are
    /// logged without blocking the local delete.
    pub async fn delete(&self, id: i64) -> BotResult<()> {
        let account = self.load(id).await?;

        if self.sync.sync_on_delete && !account.emby_user_id.is_empty() {
            if let Some(remote) = self.remote() {
                match remote.delete_user(&account.emby_user_id).await {
                    Ok(()) | Err(RemoteError::UserNotFound) => {}
                    Err(e) => warn!("Failed to delete remote user for {}: {}", account.username, e),
                }
            }
        }

        if !self.accounts.delete(id).await? {
            return Err(BotError::NotFound(format!("account {}", id)));
        }

        info!("Account {} deleted", account.username);
        Ok(())
    }

    /// Manually provision an unsynced account with a new password
    pub async fn sync_account(&self, username: &str, password: &str) -> BotResult<SyncOutcome> {
        let mut account = self.get_by_username(username).await?;
        if account.is_synced() {
            return Ok(SyncOutcome::AlreadySynced(account));
        }

        validate_password(password)?;
        let remote = self
            .remote()
            .cloned()
            .ok_or(BotError::Remote(RemoteError::SyncDisabled))?;

        account.password_hash = hash_password(password)?;
        account.mark_sync_pending();
        let result = self.provision(remote.as_ref(), &mut account, password).await;
        self.accounts.update(&account).await?;

        match result {
            Ok(()) => {
                info!("Account {} synced manually", account.username);
                Ok(SyncOutcome::Synced(account))
            }
            Err(e) => Err(BotError::Remote(e)),
        }
    }

    /// Fail with `Unauthorized` unless the account belongs to `user_id`
    pub async fn check_ownership(&self, account_id: i64, user_id: i64) -> BotResult<Account> {
        let account = self.load(account_id).await?;
        if account.user_id != user_id {
            return Err(BotError::Unauthorized(
                "account does not belong to user".to_string(),
            ));
        }
        Ok(account)
    }

    pub async fn count(&self) -> BotResult<i64> {
        self.accounts.count().await
    }

    pub async fn count_by_user(&self, user_id: i64) -> BotResult<i64> {
        self.accounts.count_by_user(user_id).await
    }

    pub async fn count_by_status(&self, status: AccountStatus) -> BotResult<i64> {
        self.accounts.count_by_status(status).await
    }

    /// Mark every active account past its expiry as expired (local only)
    pub async fn expire_due(&self) -> BotResult<u64> {
        self.accounts.expire_due(Utc::now()).await
    }
}

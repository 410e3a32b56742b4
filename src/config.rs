/// Configuration management for the account bot
use crate::error::{BotError, BotResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub storage: StorageConfig,
    pub account: AccountConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Chat transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    /// Telegram ids treated as admins regardless of stored role
    pub admin_ids: Vec<i64>,
    pub api_url: String,
    /// Long-poll timeout in seconds
    pub poll_timeout: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Account provisioning defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub default_expire_days: i64,
    pub default_max_devices: i64,
    pub password_length: usize,
    pub username_prefix: String,
    pub max_accounts_per_user: i64,
    /// -1 means unlimited
    pub max_accounts_per_admin: i64,
}

/// Media-server synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server_url: String,
    pub api_key: String,
    pub enable_sync: bool,
    pub sync_on_create: bool,
    pub sync_on_delete: bool,
    /// Per-request timeout in seconds
    pub timeout: u64,
    pub retry_count: u32,
    /// Linear backoff unit in milliseconds (attempt * unit)
    pub retry_backoff_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            default_expire_days: 30,
            default_max_devices: 3,
            password_length: 12,
            username_prefix: "emby_".to_string(),
            max_accounts_per_user: 5,
            max_accounts_per_admin: -1,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8096".to_string(),
            api_key: String::new(),
            enable_sync: true,
            sync_on_create: true,
            sync_on_delete: true,
            timeout: 30,
            retry_count: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl RemoteConfig {
    /// Sync only runs when enabled and both endpoint and key are present
    pub fn is_configured(&self) -> bool {
        self.enable_sync && !self.server_url.is_empty() && !self.api_key.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl BotConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BotResult<Self> {
        dotenv::dotenv().ok();

        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| BotError::Config("TELEGRAM_BOT_TOKEN required".to_string()))?;

        // Parse admin ids from comma-separated list
        let admin_ids = env::var("TELEGRAM_ADMIN_IDS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| BotError::Config(format!("Invalid admin id: {}", s)))
            })
            .collect::<BotResult<Vec<i64>>>()?;

        let api_url = env::var("TELEGRAM_API_URL")
            .unwrap_or_else(|_| "https://api.telegram.org".to_string());
        let poll_timeout = env_or("TELEGRAM_POLL_TIMEOUT", 30);

        let database_path: PathBuf = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "data/emby.db".to_string())
            .into();
        let max_connections = env_or("DATABASE_MAX_CONNECTIONS", 5);

        let account_defaults = AccountConfig::default();
        let mut password_length = env_or("ACCOUNT_PASSWORD_LENGTH", account_defaults.password_length);
        if password_length < 8 {
            password_length = 12;
        }

        let account = AccountConfig {
            default_expire_days: env_or(
                "ACCOUNT_DEFAULT_EXPIRE_DAYS",
                account_defaults.default_expire_days,
            ),
            default_max_devices: env_or(
                "ACCOUNT_DEFAULT_MAX_DEVICES",
                account_defaults.default_max_devices,
            ),
            password_length,
            username_prefix: env::var("ACCOUNT_USERNAME_PREFIX")
                .unwrap_or(account_defaults.username_prefix),
            max_accounts_per_user: env_or(
                "ACCOUNT_MAX_PER_USER",
                account_defaults.max_accounts_per_user,
            ),
            max_accounts_per_admin: env_or(
                "ACCOUNT_MAX_PER_ADMIN",
                account_defaults.max_accounts_per_admin,
            ),
        };

        let remote_defaults = RemoteConfig::default();
        let remote = RemoteConfig {
            server_url: env::var("EMBY_SERVER_URL")
                .unwrap_or(remote_defaults.server_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: env::var("EMBY_API_KEY").unwrap_or_default(),
            enable_sync: env_or("EMBY_ENABLE_SYNC", remote_defaults.enable_sync),
            sync_on_create: env_or("EMBY_SYNC_ON_CREATE", remote_defaults.sync_on_create),
            sync_on_delete: env_or("EMBY_SYNC_ON_DELETE", remote_defaults.sync_on_delete),
            timeout: env_or("EMBY_TIMEOUT", remote_defaults.timeout),
            retry_count: env_or("EMBY_RETRY_COUNT", remote_defaults.retry_count),
            retry_backoff_ms: env_or("EMBY_RETRY_BACKOFF_MS", remote_defaults.retry_backoff_ms),
        };

        let logging = LoggingConfig {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
        };

        Ok(BotConfig {
            telegram: TelegramConfig {
                token,
                admin_ids,
                api_url,
                poll_timeout,
            },
            storage: StorageConfig {
                database_path,
                max_connections,
            },
            account,
            remote,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> BotResult<()> {
        if self.telegram.token.is_empty() {
            return Err(BotError::Config("Telegram token cannot be empty".to_string()));
        }

        if self.account.default_expire_days < 1 {
            return Err(BotError::Config(
                "Default expire days must be at least 1".to_string(),
            ));
        }

        if !(1..=100).contains(&self.account.default_max_devices) {
            return Err(BotError::Config(
                "Default max devices must be between 1 and 100".to_string(),
            ));
        }

        if self.account.max_accounts_per_user < 0 {
            return Err(BotError::Config(
                "Max accounts per user cannot be negative".to_string(),
            ));
        }

        if self.account.max_accounts_per_admin < -1 {
            return Err(BotError::Config(
                "Max accounts per admin must be -1 (unlimited) or non-negative".to_string(),
            ));
        }

        if self.remote.enable_sync && self.remote.api_key.is_empty() {
            tracing::warn!("EMBY_ENABLE_SYNC is set but EMBY_API_KEY is empty, sync will be off");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> BotConfig {
        BotConfig {
            telegram: TelegramConfig {
                token: "123:abc".to_string(),
                admin_ids: vec![42],
                api_url: "https://api.telegram.org".to_string(),
                poll_timeout: 30,
            },
            storage: StorageConfig {
                database_path: PathBuf::from("data/emby.db"),
                max_connections: 5,
            },
            account: AccountConfig::default(),
            remote: RemoteConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut config = sample_config();
        config.telegram.token.clear();
        assert!(matches!(config.validate(), Err(BotError::Config(_))));
    }

    #[test]
    fn test_device_bounds_checked() {
        let mut config = sample_config();
        config.account.default_max_devices = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_configured_requires_key() {
        let mut remote = RemoteConfig::default();
        assert!(!remote.is_configured());

        remote.api_key = "secret".to_string();
        assert!(remote.is_configured());

        remote.enable_sync = false;
        assert!(!remote.is_configured());
    }
}

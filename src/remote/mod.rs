/// Remote media-server integration
///
/// `MediaServer` is the seam the account service depends on. `EmbyClient`
/// implements it over HTTP with linear-backoff retries; tests substitute
/// in-memory fakes.

pub mod client;
pub mod error;
pub mod models;

pub use client::EmbyClient;
pub use error::RemoteError;
pub use models::{
    CreateUserRequest, NowPlayingItem, PlayState, RemoteUser, SessionInfo, SystemInfo,
    TranscodingInfo, UserPolicy,
};

use async_trait::async_trait;
use tracing::warn;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Outcome of a bulk policy rewrite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub updated: usize,
    pub failed: usize,
}

/// Remote user-management API
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Liveness check
    async fn ping(&self) -> RemoteResult<SystemInfo>;

    /// Provision a user with an initial password
    async fn create_user(&self, name: &str, password: &str) -> RemoteResult<RemoteUser>;

    async fn get_user(&self, id: &str) -> RemoteResult<RemoteUser>;

    async fn list_users(&self) -> RemoteResult<Vec<RemoteUser>>;

    async fn delete_user(&self, id: &str) -> RemoteResult<()>;

    async fn update_password(&self, id: &str, password: &str) -> RemoteResult<()>;

    async fn update_user_policy(&self, id: &str, policy: &UserPolicy) -> RemoteResult<()>;

    /// Active sessions (read-only telemetry)
    async fn get_sessions(&self) -> RemoteResult<Vec<SessionInfo>>;

    async fn get_user_by_name(&self, name: &str) -> RemoteResult<RemoteUser> {
        self.list_users()
            .await?
            .into_iter()
            .find(|u| u.name == name)
            .ok_or(RemoteError::UserNotFound)
    }

    async fn get_user_policy(&self, id: &str) -> RemoteResult<UserPolicy> {
        Ok(self.get_user(id).await?.policy)
    }

    async fn enable_user(&self, id: &str) -> RemoteResult<()> {
        let mut policy = self.get_user_policy(id).await?;
        policy.is_disabled = false;
        self.update_user_policy(id, &policy).await
    }

    async fn disable_user(&self, id: &str) -> RemoteResult<()> {
        let mut policy = self.get_user_policy(id).await?;
        policy.is_disabled = true;
        self.update_user_policy(id, &policy).await
    }

    /// Device limit maps onto the simultaneous stream limit
    async fn set_max_active_sessions(&self, id: &str, limit: i64) -> RemoteResult<()> {
        let mut policy = self.get_user_policy(id).await?;
        policy.simultaneous_stream_limit = models::clamp_limit(limit);
        self.update_user_policy(id, &policy).await
    }

    /// Reset every non-admin user to the default policy, keeping each
    /// user's stream limit and disabled flag
    async fn batch_update_non_admin_policies(&self) -> RemoteResult<BatchOutcome> {
        let users = self.list_users().await?;
        let mut outcome = BatchOutcome::default();

        for user in users.iter().filter(|u| !u.policy.is_administrator) {
            let mut policy = user.policy.normalized();
            policy.is_disabled = user.policy.is_disabled;

            match self.update_user_policy(&user.id, &policy).await {
                Ok(()) => outcome.updated += 1,
                Err(e) => {
                    warn!("Failed to update policy for {}: {}", user.name, e);
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory server that stores posted policies
    #[derive(Default)]
    struct PolicyServer {
        users: Mutex<Vec<RemoteUser>>,
        posted: Mutex<HashMap<String, UserPolicy>>,
        reject: Mutex<Option<String>>,
    }

    impl PolicyServer {
        fn add(&self, id: &str, policy: UserPolicy) {
            self.users.lock().unwrap().push(RemoteUser {
                id: id.to_string(),
                name: id.to_string(),
                policy,
                ..Default::default()
            });
        }

        fn posted(&self, id: &str) -> Option<UserPolicy> {
            self.posted.lock().unwrap().get(id).cloned()
        }
    }

    #[async_trait]
    impl MediaServer for PolicyServer {
        async fn ping(&self) -> RemoteResult<SystemInfo> {
            Ok(SystemInfo::default())
        }

        async fn create_user(&self, _name: &str, _password: &str) -> RemoteResult<RemoteUser> {
            Err(RemoteError::Client("not supported".to_string()))
        }

        async fn get_user(&self, id: &str) -> RemoteResult<RemoteUser> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id)
                .cloned()
                .ok_or(RemoteError::UserNotFound)
        }

        async fn list_users(&self) -> RemoteResult<Vec<RemoteUser>> {
            Ok(self.users.lock().unwrap().clone())
        }

        async fn delete_user(&self, _id: &str) -> RemoteResult<()> {
            Ok(())
        }

        async fn update_password(&self, _id: &str, _password: &str) -> RemoteResult<()> {
            Ok(())
        }

        async fn update_user_policy(&self, id: &str, policy: &UserPolicy) -> RemoteResult<()> {
            if self.reject.lock().unwrap().as_deref() == Some(id) {
                return Err(RemoteError::Server {
                    status: 500,
                    body: "policy write failed".to_string(),
                });
            }
            self.posted
                .lock()
                .unwrap()
                .insert(id.to_string(), policy.clone());
            Ok(())
        }

        async fn get_sessions(&self) -> RemoteResult<Vec<SessionInfo>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_disable_keeps_unmodelled_policy_fields() {
        let server = PolicyServer::default();
        let policy: UserPolicy = serde_json::from_value(json!({
            "SimultaneousStreamLimit": 2,
            "AccessSchedules": [{"DayOfWeek": "Monday", "StartHour": 0.0, "EndHour": 12.0}],
            "BlockUnratedItems": ["Movie"]
        }))
        .unwrap();
        server.add("u1", policy);

        server.disable_user("u1").await.unwrap();

        let posted = server.posted("u1").unwrap();
        assert!(posted.is_disabled);
        assert_eq!(posted.simultaneous_stream_limit, 2);
        let wire = serde_json::to_value(&posted).unwrap();
        assert_eq!(wire["AccessSchedules"][0]["DayOfWeek"], "Monday");
        assert_eq!(wire["BlockUnratedItems"][0], "Movie");
    }

    #[tokio::test]
    async fn test_batch_update_skips_admins_and_counts_failures() {
        let server = PolicyServer::default();
        server.add(
            "admin",
            UserPolicy {
                is_administrator: true,
                enable_content_deletion: true,
                ..Default::default()
            },
        );
        server.add(
            "disabled",
            UserPolicy {
                is_disabled: true,
                simultaneous_stream_limit: 4,
                max_parental_rating: 18,
                enable_content_deletion: true,
                ..Default::default()
            },
        );
        server.add("broken", UserPolicy::default());
        *server.reject.lock().unwrap() = Some("broken".to_string());

        let outcome = server.batch_update_non_admin_policies().await.unwrap();
        assert_eq!(outcome, BatchOutcome { updated: 1, failed: 1 });

        assert!(server.posted("admin").is_none());
        assert!(server.posted("broken").is_none());

        let reset = server.posted("disabled").unwrap();
        assert!(reset.is_disabled);
        assert_eq!(reset.simultaneous_stream_limit, 4);
        assert_eq!(reset.max_parental_rating, 10);
        assert!(!reset.enable_content_deletion);
        assert!(reset.enable_all_folders);
    }
}

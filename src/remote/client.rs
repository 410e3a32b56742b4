/// HTTP client for the Emby user-management API
///
/// Every call goes through `execute`, which retries non-terminal failures
/// with linear backoff (`attempt * unit`). Terminal failures (bad API key,
/// unknown user, name conflict) return immediately.
use super::{
    models::{CreateUserRequest, RemoteUser, SessionInfo, SystemInfo, UserPolicy},
    MediaServer, RemoteError, RemoteResult,
};
use crate::{
    config::RemoteConfig,
    error::{BotError, BotResult},
};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const TOKEN_HEADER: &str = "X-Emby-Token";

/// Emby API client
#[derive(Clone)]
pub struct EmbyClient {
    http: Client,
    base_url: String,
    api_key: String,
    enabled: bool,
    retry_count: u32,
    backoff: Duration,
}

impl EmbyClient {
    /// Build a client from configuration
    pub fn new(config: &RemoteConfig) -> BotResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("emby-account-bot/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BotError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            enabled: config.enable_sync,
            retry_count: config.retry_count,
            backoff: config.backoff_unit(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn url(&self, path: &str) -> String {
        format!("{}/emby{}", self.base_url, path)
    }

    /// Send a request with retries and return the raw response body
    async fn execute<F>(&self, method: Method, path: &str, decorate: F) -> RemoteResult<String>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
    {
        if !self.enabled {
            return Err(RemoteError::SyncDisabled);
        }

        let url = self.url(path);
        let mut last_err = RemoteError::ServerUnavailable("no attempt made".to_string());

        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                debug!("Emby retry attempt {} for {} {}", attempt, method, path);
                tokio::time::sleep(self.backoff * attempt).await;
            }

            let request = self
                .http
                .request(method.clone(), &url)
                .header(TOKEN_HEADER, &self.api_key)
                .header(header::ACCEPT, "application/json");

            match self.send_once(decorate(request)).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    warn!("Emby request {} {} failed: {}", method, path, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn send_once(&self, request: RequestBuilder) -> RemoteResult<String> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::ServerUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::ServerUnavailable(e.to_string()))?;

        debug!("Emby response status {}", status);

        if status.is_client_error() || status.is_server_error() {
            return Err(RemoteError::from_status(status.as_u16(), body));
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let body = self.execute(Method::GET, path, |r| r).await?;
        decode(&body)
    }

    async fn post_json<B, T>(&self, path: &str, payload: &B) -> RemoteResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = self.execute(Method::POST, path, |r| r.json(payload)).await?;
        decode(&body)
    }

    async fn post_no_content<B: Serialize + Sync>(&self, path: &str, payload: &B) -> RemoteResult<()> {
        self.execute(Method::POST, path, |r| r.json(payload)).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> RemoteResult<T> {
    serde_json::from_str(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl MediaServer for EmbyClient {
    async fn ping(&self) -> RemoteResult<SystemInfo> {
        let info: SystemInfo = self.get_json("/System/Info").await?;
        info!("Emby server connected: {} ({})", info.server_name, info.version);
        Ok(info)
    }

    async fn create_user(&self, name: &str, password: &str) -> RemoteResult<RemoteUser> {
        let request = CreateUserRequest {
            name: name.to_string(),
            password: password.to_string(),
        };
        let user: RemoteUser = self.post_json("/Users/New", &request).await?;
        info!("Emby user created: {} ({})", user.name, user.id);

        if password.is_empty() || user.password_set() {
            return Ok(user);
        }

        // Some server versions ignore the password on creation
        warn!("Password not set on creation for {}, setting it separately", user.name);
        if let Err(e) = self.update_password(&user.id, password).await {
            if let Err(cleanup) = self.delete_user(&user.id).await {
                warn!("Failed to remove half-created user {}: {}", user.name, cleanup);
            }
            return Err(e);
        }

        match self.get_user(&user.id).await {
            Ok(refreshed) => Ok(refreshed),
            Err(e) => {
                warn!("Failed to re-fetch user {}: {}", user.name, e);
                Ok(user)
            }
        }
    }

    async fn get_user(&self, id: &str) -> RemoteResult<RemoteUser> {
        self.get_json(&format!("/Users/{}", id)).await
    }

    async fn list_users(&self) -> RemoteResult<Vec<RemoteUser>> {
        self.get_json("/Users").await
    }

    async fn delete_user(&self, id: &str) -> RemoteResult<()> {
        self.execute(Method::DELETE, &format!("/Users/{}", id), |r| r)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: &str, password: &str) -> RemoteResult<()> {
        // The server expects a form body carrying only NewPw
        let form = [("NewPw", password)];
        self.execute(Method::POST, &format!("/Users/{}/Password", id), |r| {
            r.form(&form)
        })
        .await?;
        Ok(())
    }

    async fn update_user_policy(&self, id: &str, policy: &UserPolicy) -> RemoteResult<()> {
        self.post_no_content(&format!("/Users/{}/Policy", id), policy)
            .await
    }

    async fn get_sessions(&self) -> RemoteResult<Vec<SessionInfo>> {
        self.get_json("/Sessions").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enable_sync: bool) -> RemoteConfig {
        RemoteConfig {
            server_url: "http://127.0.0.1:1/".to_string(),
            api_key: "key".to_string(),
            enable_sync,
            retry_count: 0,
            retry_backoff_ms: 1,
            timeout: 1,
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn test_url_building() {
        let client = EmbyClient::new(&config(true)).unwrap();
        assert_eq!(client.url("/Users"), "http://127.0.0.1:1/emby/Users");
    }

    #[tokio::test]
    async fn test_disabled_client_short_circuits() {
        let client = EmbyClient::new(&config(false)).unwrap();
        assert!(!client.is_enabled());
        assert_eq!(client.ping().await.unwrap_err(), RemoteError::SyncDisabled);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let client = EmbyClient::new(&config(true)).unwrap();
        let err = client.list_users().await.unwrap_err();
        assert!(matches!(err, RemoteError::ServerUnavailable(_)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<SystemInfo>("<html>").unwrap_err();
        assert!(matches!(err, RemoteError::InvalidResponse(_)));
    }
}

// Gogg - Offline GOG Library Archiver
// Copyright (C) 2025 Gogg contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Token lifecycle
//!
//! The stored token moves through three observable states:
//!
//! - **Missing** - no row yet; every operation fails asking for a login.
//! - **Fresh** - expiry is comfortably in the future; the cached access
//!   token is returned as-is.
//! - **Expiring or invalid** - within the safety window of expiry, or with
//!   an empty field; the refresher is called and the new token persisted.
//!
//! A refresh failure never mutates the stored token, so a transient outage
//! leaves the previous (possibly still valid) token intact.
//!
//! The interactive browser sign-in is outside this crate; it hands over an
//! authorization code which [`GogAuthClient::exchange_code`] turns into the
//! first token set.

use crate::api::client::ApiClient;
use crate::error::{GoggError, Result};
use crate::storage::{TokenRecord, TokenRepository};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// GOG's OAuth token endpoint
pub const TOKEN_URL: &str = "https://auth.gog.com/token";

/// OAuth client credentials of the official Galaxy client, shared by all
/// third-party tooling for this service.
pub const CLIENT_ID: &str = "46899977096215655";
pub const CLIENT_SECRET: &str = "9d85c43b1482497dbbce61f6e4aa173a433796eeae2ca8c5f6129f2dc4de46d9";

/// Tokens expiring within this window are refreshed proactively.
fn safety_window() -> Duration {
    Duration::minutes(5)
}

/// Result of a successful token exchange or refresh
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access: String,
    pub refresh: String,
    /// Lifetime in seconds, relative to now
    pub expires_in: i64,
}

/// Collaborator that turns a refresh token into a new token set
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn perform_token_refresh(
        &self,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> Result<RefreshedToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_refreshed(self) -> Result<RefreshedToken> {
        if let Some(description) = self.error_description {
            return Err(GoggError::NeedsLogin(format!(
                "token endpoint rejected the request: {description}"
            )));
        }
        match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() => Ok(RefreshedToken {
                access,
                refresh,
                expires_in: self.expires_in.unwrap_or(0),
            }),
            _ => Err(GoggError::NeedsLogin(
                "token endpoint returned an incomplete token set".to_string(),
            )),
        }
    }
}

/// Client for the OAuth token endpoint
#[derive(Debug, Clone)]
pub struct GogAuthClient {
    api: ApiClient,
    token_url: String,
}

impl GogAuthClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Point the client at a different token endpoint (tests).
    pub fn with_token_url(api: ApiClient, token_url: impl Into<String>) -> Self {
        Self {
            api,
            token_url: token_url.into(),
        }
    }

    /// Exchange the authorization code from the browser sign-in for the
    /// first token set.
    pub async fn exchange_code(
        &self,
        cancel: &CancellationToken,
        code: &str,
    ) -> Result<RefreshedToken> {
        let form = [
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("grant_type", "authorization_code"),
            ("code", code),
            (
                "redirect_uri",
                "https://embed.gog.com/on_login_success?origin=client",
            ),
        ];
        let (status, response): (_, TokenResponse) =
            self.api.post_form(cancel, &self.token_url, &form).await?;
        if !status.is_success() {
            return Err(GoggError::NeedsLogin(format!(
                "token endpoint returned {status}"
            )));
        }
        response.into_refreshed()
    }
}

#[async_trait]
impl TokenRefresher for GogAuthClient {
    async fn perform_token_refresh(
        &self,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> Result<RefreshedToken> {
        let form = [
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let (status, response): (_, TokenResponse) =
            self.api.post_form(cancel, &self.token_url, &form).await?;
        if !status.is_success() {
            return Err(GoggError::NeedsLogin(format!(
                "token refresh returned {status}"
            )));
        }
        response.into_refreshed()
    }
}

/// Hands out a currently-valid access token, refreshing through the
/// collaborator when the stored one is expiring or incomplete.
pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
    refresher: Arc<dyn TokenRefresher>,
}

impl TokenService {
    pub fn new(tokens: Arc<dyn TokenRepository>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { tokens, refresher }
    }

    /// A valid access token, refreshed and persisted if necessary.
    pub async fn current_token(&self, cancel: &CancellationToken) -> Result<String> {
        let Some(stored) = self.tokens.get().await? else {
            return Err(GoggError::NeedsLogin(
                "no stored token; sign in first".to_string(),
            ));
        };

        let fresh = stored.is_complete() && Utc::now() + safety_window() < stored.expires_at;
        if fresh {
            return Ok(stored.access);
        }

        let refreshed = self
            .refresher
            .perform_token_refresh(cancel, &stored.refresh)
            .await?;

        let record = TokenRecord {
            access: refreshed.access,
            refresh: refreshed.refresh,
            expires_at: Utc::now() + Duration::seconds(refreshed.expires_in),
        };
        self.tokens.upsert(&record).await?;

        Ok(record.access)
    }

    /// Persist a token set obtained outside the refresh path (first login).
    pub async fn store(&self, token: &RefreshedToken) -> Result<()> {
        let record = TokenRecord {
            access: token.access.clone(),
            refresh: token.refresh.clone(),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        self.tokens.upsert(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeRefresher {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn perform_token_refresh(
            &self,
            _cancel: &CancellationToken,
            refresh_token: &str,
        ) -> Result<RefreshedToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(GoggError::NeedsLogin("refresh rejected".to_string()));
            }
            Ok(RefreshedToken {
                access: "new-access".to_string(),
                refresh: format!("{refresh_token}-rotated"),
                expires_in: 3600,
            })
        }
    }

    async fn service(fail: bool) -> (TokenService, Arc<dyn TokenRepository>, Arc<FakeRefresher>) {
        let db = Database::new_in_memory().await.unwrap();
        let tokens: Arc<dyn TokenRepository> = Arc::new(db.tokens());
        let refresher = FakeRefresher::new(fail);
        (
            TokenService::new(Arc::clone(&tokens), refresher.clone()),
            tokens,
            refresher,
        )
    }

    #[tokio::test]
    async fn missing_token_requires_login() {
        let (service, _tokens, refresher) = service(false).await;
        let cancel = CancellationToken::new();
        let result = service.current_token(&cancel).await;
        assert!(matches!(result, Err(GoggError::NeedsLogin(_))));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let (service, tokens, refresher) = service(false).await;
        let cancel = CancellationToken::new();

        tokens
            .upsert(&TokenRecord {
                access: "cached".to_string(),
                refresh: "refresh".to_string(),
                expires_at: Utc::now() + Duration::hours(2),
            })
            .await
            .unwrap();

        assert_eq!(service.current_token(&cancel).await.unwrap(), "cached");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_and_persisted() {
        let (service, tokens, refresher) = service(false).await;
        let cancel = CancellationToken::new();

        tokens
            .upsert(&TokenRecord {
                access: "stale".to_string(),
                refresh: "refresh".to_string(),
                // Inside the 5-minute safety window
                expires_at: Utc::now() + Duration::minutes(2),
            })
            .await
            .unwrap();

        assert_eq!(service.current_token(&cancel).await.unwrap(), "new-access");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

        let stored = tokens.get().await.unwrap().unwrap();
        assert_eq!(stored.access, "new-access");
        assert_eq!(stored.refresh, "refresh-rotated");
        assert!(stored.expires_at > Utc::now() + Duration::minutes(30));
    }

    #[tokio::test]
    async fn incomplete_token_triggers_refresh() {
        let (service, tokens, refresher) = service(false).await;
        let cancel = CancellationToken::new();

        tokens
            .upsert(&TokenRecord {
                access: String::new(),
                refresh: "refresh".to_string(),
                expires_at: Utc::now() + Duration::hours(2),
            })
            .await
            .unwrap();

        assert_eq!(service.current_token(&cancel).await.unwrap(), "new-access");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_leaves_stored_token_untouched() {
        let (service, tokens, _refresher) = service(true).await;
        let cancel = CancellationToken::new();

        let original = TokenRecord {
            access: "stale".to_string(),
            refresh: "refresh".to_string(),
            expires_at: Utc::now() + Duration::minutes(1),
        };
        tokens.upsert(&original).await.unwrap();

        let result = service.current_token(&cancel).await;
        assert!(matches!(result, Err(GoggError::NeedsLogin(_))));

        let stored = tokens.get().await.unwrap().unwrap();
        assert_eq!(stored.access, "stale");
        assert_eq!(stored.refresh, "refresh");
    }
}

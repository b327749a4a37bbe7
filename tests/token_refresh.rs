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


//! Token refresh against a mock OAuth endpoint

use chrono::{Duration, Utc};
use gogg::api::{ApiClient, GogAuthClient, TokenService};
use gogg::error::GoggError;
use gogg::storage::{Database, TokenRecord, TokenRepository};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(access: &str, refresh: &str) -> String {
    format!(
        r#"{{"access_token":{access:?},"refresh_token":{refresh:?},"expires_in":3600,"token_type":"bearer"}}"#
    )
}

#[tokio::test]
async fn expiring_token_is_refreshed_through_the_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(token_body("fresh-access", "fresh-refresh")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let db = Database::new_in_memory().await.unwrap();
    let tokens: Arc<dyn TokenRepository> = Arc::new(db.tokens());
    tokens
        .upsert(&TokenRecord {
            access: "old-access".to_string(),
            refresh: "old-refresh".to_string(),
            // Inside the safety window, so a refresh is forced.
            expires_at: Utc::now() + Duration::minutes(1),
        })
        .await
        .unwrap();

    let auth_client = GogAuthClient::with_token_url(
        ApiClient::new().unwrap(),
        format!("{}/token", server.uri()),
    );
    let service = TokenService::new(Arc::clone(&tokens), Arc::new(auth_client));

    let access = service
        .current_token(&CancellationToken::new())
        .await
        .expect("refresh succeeds");
    assert_eq!(access, "fresh-access");

    let stored = tokens.get().await.unwrap().unwrap();
    assert_eq!(stored.access, "fresh-access");
    assert_eq!(stored.refresh, "fresh-refresh");
    assert!(stored.expires_at > Utc::now() + Duration::minutes(30));
}

#[tokio::test]
async fn endpoint_error_description_means_login_is_needed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"error":"invalid_grant","error_description":"Refresh token is invalid"}"#,
        ))
        .mount(&server)
        .await;

    let db = Database::new_in_memory().await.unwrap();
    let tokens: Arc<dyn TokenRepository> = Arc::new(db.tokens());
    let original = TokenRecord {
        access: "old-access".to_string(),
        refresh: "revoked".to_string(),
        expires_at: Utc::now() - Duration::minutes(1),
    };
    tokens.upsert(&original).await.unwrap();

    let auth_client = GogAuthClient::with_token_url(
        ApiClient::new().unwrap(),
        format!("{}/token", server.uri()),
    );
    let service = TokenService::new(Arc::clone(&tokens), Arc::new(auth_client));

    let result = service.current_token(&CancellationToken::new()).await;
    assert!(matches!(result, Err(GoggError::NeedsLogin(_))), "{result:?}");

    // The rejected refresh must not touch the stored token.
    let stored = tokens.get().await.unwrap().unwrap();
    assert_eq!(stored.access, "old-access");
    assert_eq!(stored.refresh, "revoked");
}

#[tokio::test]
async fn authorization_code_exchange_yields_a_token_set() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(token_body("first-access", "first-refresh")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth_client = GogAuthClient::with_token_url(
        ApiClient::new().unwrap(),
        format!("{}/token", server.uri()),
    );
    let token = auth_client
        .exchange_code(&CancellationToken::new(), "abc123")
        .await
        .expect("exchange succeeds");

    assert_eq!(token.access, "first-access");
    assert_eq!(token.refresh, "first-refresh");
    assert_eq!(token.expires_in, 3600);

    // Store-after-login persists the set for later current_token calls.
    let db = Database::new_in_memory().await.unwrap();
    let tokens: Arc<dyn TokenRepository> = Arc::new(db.tokens());
    let service = TokenService::new(Arc::clone(&tokens), Arc::new(NoRefresh));
    service.store(&token).await.unwrap();
    let access = service
        .current_token(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(access, "first-access");
}

struct NoRefresh;

#[async_trait::async_trait]
impl gogg::api::TokenRefresher for NoRefresh {
    async fn perform_token_refresh(
        &self,
        _cancel: &CancellationToken,
        _refresh_token: &str,
    ) -> gogg::error::Result<gogg::api::RefreshedToken> {
        Err(GoggError::NeedsLogin("refresh not expected".to_string()))
    }
}

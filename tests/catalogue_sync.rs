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


//! Catalogue synchronization against a mock service

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gogg::api::{ApiClient, LibraryClient, RefreshedToken, TokenRefresher, TokenService};
use gogg::error::{GoggError, Result};
use gogg::storage::{Database, GameRepository, TokenRecord, TokenRepository};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Refresher that must never be reached (the stored token stays fresh)
struct NoRefresh;

#[async_trait]
impl TokenRefresher for NoRefresh {
    async fn perform_token_refresh(
        &self,
        _cancel: &CancellationToken,
        _refresh_token: &str,
    ) -> Result<RefreshedToken> {
        Err(GoggError::NeedsLogin("refresh not expected".to_string()))
    }
}

async fn auth_with_fresh_token(db: &Database) -> TokenService {
    let tokens: Arc<dyn TokenRepository> = Arc::new(db.tokens());
    tokens
        .upsert(&TokenRecord {
            access: "test-access".to_string(),
            refresh: "test-refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .expect("seed token");
    TokenService::new(tokens, Arc::new(NoRefresh))
}

fn details_body(title: &str) -> String {
    format!(r#"{{"title":{title:?},"downloads":[],"extras":[],"dlcs":[]}}"#)
}

#[tokio::test]
async fn refresh_follows_pagination_and_skips_bad_games() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/data/games"))
        .and(header("Authorization", "Bearer test-access"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"owned":[1,2],"next":"/games?page=2"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/games"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"owned":[3]}"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/account/gameDetails/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(details_body("Game One")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/gameDetails/2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(details_body("")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/gameDetails/3.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(details_body("Game Three")))
        .mount(&server)
        .await;

    let db = Database::new_in_memory().await.expect("database");
    let auth = auth_with_fresh_token(&db).await;
    let games: Arc<dyn GameRepository> = Arc::new(db.games());

    let fractions = Arc::new(Mutex::new(Vec::new()));
    let fractions2 = Arc::clone(&fractions);

    let cancel = CancellationToken::new();
    let library = LibraryClient::with_base(ApiClient::new().unwrap(), server.uri());
    library
        .refresh(&cancel, &auth, Arc::clone(&games), 3, move |fraction| {
            fractions2.lock().unwrap().push(fraction);
        })
        .await
        .expect("refresh succeeds");

    let one = games.get_by_id(1).await.unwrap().expect("game 1 stored");
    assert_eq!(one.title, "Game One");
    let three = games.get_by_id(3).await.unwrap().expect("game 3 stored");
    assert_eq!(three.title, "Game Three");
    // The empty-title game is skipped, not stored.
    assert!(games.get_by_id(2).await.unwrap().is_none());

    // Workers may report out of order; the set of fractions is fixed.
    let mut fractions = fractions.lock().unwrap().clone();
    fractions.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(fractions.len(), 3);
    for (fraction, expected) in fractions.iter().zip([1.0 / 3.0, 2.0 / 3.0, 1.0]) {
        assert!((fraction - expected).abs() < 1e-9);
    }
}

#[tokio::test]
async fn self_referential_next_link_terminates() {
    let server = MockServer::start().await;

    // `next` points back at the same endpoint, spelled with a trailing
    // slash; canonicalization must detect the cycle.
    Mock::given(method("GET"))
        .and(path("/user/data/games"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"owned":[7],"next":"/user/data/games/"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/data/games/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"owned":[7],"next":"/user/data/games/"}"#,
        ))
        // At most one re-fetch of the canonically-equal URL.
        .expect(0..=1)
        .mount(&server)
        .await;

    let library = LibraryClient::with_base(ApiClient::new().unwrap(), server.uri());
    let cancel = CancellationToken::new();
    let ids = library
        .owned_game_ids(&cancel, "token")
        .await
        .expect("pagination terminates");

    assert!(!ids.is_empty());
    assert!(ids.iter().all(|id| *id == 7));
}

#[tokio::test]
async fn empty_account_reports_full_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/data/games"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"owned":[]}"#))
        .mount(&server)
        .await;

    let db = Database::new_in_memory().await.unwrap();
    let auth = auth_with_fresh_token(&db).await;
    let games: Arc<dyn GameRepository> = Arc::new(db.games());

    // Pre-existing records must survive an empty-account refresh.
    games
        .put(&gogg::storage::GameRecord {
            id: 99,
            title: "Leftover".to_string(),
            data: "{}".to_string(),
        })
        .await
        .unwrap();

    let fractions = Arc::new(Mutex::new(Vec::new()));
    let fractions2 = Arc::clone(&fractions);
    let library = LibraryClient::with_base(ApiClient::new().unwrap(), server.uri());
    library
        .refresh(
            &CancellationToken::new(),
            &auth,
            Arc::clone(&games),
            2,
            move |fraction| {
                fractions2.lock().unwrap().push(fraction);
            },
        )
        .await
        .unwrap();

    assert_eq!(*fractions.lock().unwrap(), vec![1.0]);
    assert!(games.get_by_id(99).await.unwrap().is_some());
}

#[tokio::test]
async fn out_of_range_worker_count_is_rejected_before_any_request() {
    let db = Database::new_in_memory().await.unwrap();
    let auth = auth_with_fresh_token(&db).await;
    let games: Arc<dyn GameRepository> = Arc::new(db.games());

    // The base URL is never contacted: validation fails first.
    let library = LibraryClient::with_base(ApiClient::new().unwrap(), "http://127.0.0.1:9");
    for workers in [0, 21] {
        let result = library
            .refresh(
                &CancellationToken::new(),
                &auth,
                Arc::clone(&games),
                workers,
                |_| {},
            )
            .await;
        assert!(matches!(result, Err(GoggError::Validation(_))), "{result:?}");
    }
}

#[tokio::test]
async fn detail_fetch_failures_do_not_abort_the_sync() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/data/games"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"owned":[1,2]}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/gameDetails/1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/gameDetails/2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(details_body("Survivor")))
        .mount(&server)
        .await;

    let db = Database::new_in_memory().await.unwrap();
    let auth = auth_with_fresh_token(&db).await;
    let games: Arc<dyn GameRepository> = Arc::new(db.games());

    let library = LibraryClient::with_base(ApiClient::new().unwrap(), server.uri());
    library
        .refresh(&CancellationToken::new(), &auth, Arc::clone(&games), 2, |_| {})
        .await
        .expect("per-game failures are warnings");

    assert!(games.get_by_id(1).await.unwrap().is_none());
    assert_eq!(games.get_by_id(2).await.unwrap().unwrap().title, "Survivor");
}

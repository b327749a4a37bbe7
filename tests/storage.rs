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


//! Persistence behavior across real database files

use chrono::{Duration, Utc};
use gogg::storage::{Database, GameRecord, GameRepository, TokenRecord, TokenRepository};

fn record(id: i64, title: &str) -> GameRecord {
    GameRecord {
        id,
        title: title.to_string(),
        data: format!(r#"{{"title":{title:?}}}"#),
    }
}

#[tokio::test]
async fn catalogue_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("games.db");

    {
        let db = Database::new(&path).await.unwrap();
        let games = db.games();
        games.put(&record(1, "Outcast")).await.unwrap();
        games.put(&record(2, "Anachronox")).await.unwrap();
        db.close().await;
    }

    // Re-opening runs migrations again; they must be idempotent.
    let db = Database::new(&path).await.unwrap();
    let games = db.games();
    let all = games.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].title, "Outcast");
    assert_eq!(all[1].title, "Anachronox");
}

#[tokio::test]
async fn search_by_title_is_case_sensitive() {
    let db = Database::new_in_memory().await.unwrap();
    let games = db.games();
    games.put(&record(1, "Baldur's Gate")).await.unwrap();

    assert_eq!(games.search_by_title("Gate").await.unwrap().len(), 1);
    assert!(games.search_by_title("gate").await.unwrap().is_empty());
}

#[tokio::test]
async fn token_row_stays_single_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("games.db");

    {
        let db = Database::new(&path).await.unwrap();
        let tokens = db.tokens();
        for i in 0..3 {
            tokens
                .upsert(&TokenRecord {
                    access: format!("access-{i}"),
                    refresh: format!("refresh-{i}"),
                    expires_at: Utc::now() + Duration::hours(1),
                })
                .await
                .unwrap();
        }
        db.close().await;
    }

    let db = Database::new(&path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(db.tokens().get().await.unwrap().unwrap().access, "access-2");
}

#[tokio::test]
async fn concurrent_upserts_converge_to_one_row_per_game() {
    let db = Database::new_in_memory().await.unwrap();
    let games = std::sync::Arc::new(db.games());

    let mut handles = Vec::new();
    for round in 0..8 {
        let games = std::sync::Arc::clone(&games);
        handles.push(tokio::spawn(async move {
            games
                .put(&record(42, &format!("Title v{round}")))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let all = games.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, 42);
    assert!(all[0].title.starts_with("Title v"));
}

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


//! Game catalogue repository

use crate::error::Result;
use crate::storage::models::GameRecord;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Catalogue access used by the synchronizer and the command surface.
///
/// Implementations must be safe to call from multiple tasks; methods are
/// cancellable at their await points.
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Insert or replace the record with the same `id`.
    async fn put(&self, game: &GameRecord) -> Result<()>;

    /// Fetch one record; `None` when no row matches.
    async fn get_by_id(&self, id: i64) -> Result<Option<GameRecord>>;

    /// All records, ordered by id.
    async fn list(&self) -> Result<Vec<GameRecord>>;

    /// Case-sensitive substring match on the title.
    async fn search_by_title(&self, needle: &str) -> Result<Vec<GameRecord>>;

    /// Remove every record.
    async fn clear(&self) -> Result<()>;
}

/// SQLite-backed [`GameRepository`]
#[derive(Debug, Clone)]
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameRepository for SqliteGameRepository {
    async fn put(&self, game: &GameRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO games (id, title, data) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                data = excluded.data
            "#,
        )
        .bind(game.id)
        .bind(&game.title)
        .bind(&game.data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<GameRecord>> {
        let record = sqlx::query_as::<_, GameRecord>(
            "SELECT id, title, data FROM games WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<GameRecord>> {
        let records = sqlx::query_as::<_, GameRecord>(
            "SELECT id, title, data FROM games ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn search_by_title(&self, needle: &str) -> Result<Vec<GameRecord>> {
        // instr() keeps the match case-sensitive; LIKE would fold ASCII case.
        let records = sqlx::query_as::<_, GameRecord>(
            "SELECT id, title, data FROM games WHERE instr(title, ?) > 0 ORDER BY id",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM games").execute(&self.pool).await?;
        Ok(())
    }
}

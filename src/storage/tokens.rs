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


//! Token repository
//!
//! The store keeps at most one token row; `upsert` pins the id to 1 and
//! replaces all fields atomically.

use crate::error::Result;
use crate::storage::models::TokenRecord;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Persistent storage for the single OAuth token set
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// The stored token; `None` before the first sign-in.
    async fn get(&self) -> Result<Option<TokenRecord>>;

    /// Replace the stored token.
    async fn upsert(&self, token: &TokenRecord) -> Result<()>;
}

/// SQLite-backed [`TokenRepository`]
#[derive(Debug, Clone)]
pub struct SqliteTokenRepository {
    pool: SqlitePool,
}

impl SqliteTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for SqliteTokenRepository {
    async fn get(&self) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>(
            "SELECT access, refresh, expires_at FROM tokens WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert(&self, token: &TokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tokens (id, access, refresh, expires_at) VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access = excluded.access,
                refresh = excluded.refresh,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&token.access)
        .bind(&token.refresh)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

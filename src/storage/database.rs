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


//! Database connection and management
//!
//! SQLite configuration: WAL journal for concurrent readers, foreign keys
//! on, normal synchronous mode, 30 s busy timeout. Migrations run on every
//! open. The in-memory constructor backs the unit tests.

use crate::error::{GoggError, Result};
use crate::storage::games::SqliteGameRepository;
use crate::storage::tokens::SqliteTokenRepository;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    ConnectOptions,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Database manager holding the connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>, // None for in-memory databases
}

impl Database {
    /// Open (creating if missing) the database at `database_path` and run
    /// migrations.
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GoggError::internal(format!(
                        "failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let connection_string = format!("sqlite://{}?mode=rwc", path.display());
        let connect_opts = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;

        Ok(db)
    }

    /// Create an in-memory database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;

        let db = Self { pool, path: None };
        db.migrate().await?;

        Ok(db)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        crate::storage::migrations::run_migrations(&self.pool).await
    }

    /// Reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Database file path; `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Game repository bound to this database
    pub fn games(&self) -> SqliteGameRepository {
        SqliteGameRepository::new(self.pool.clone())
    }

    /// Token repository bound to this database
    pub fn tokens(&self) -> SqliteTokenRepository {
        SqliteTokenRepository::new(self.pool.clone())
    }

    /// Close the database, waiting for active connections to finish.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Default database location.
    ///
    /// `$GOGG_HOME/games.db`, else `$XDG_DATA_HOME/gogg/games.db`, else
    /// `$HOME/.gogg/games.db`.
    pub fn default_path() -> PathBuf {
        if let Ok(home) = std::env::var("GOGG_HOME") {
            if !home.is_empty() {
                return PathBuf::from(home).join("games.db");
            }
        }
        if let Ok(data) = std::env::var("XDG_DATA_HOME") {
            if !data.is_empty() {
                return PathBuf::from(data).join("gogg").join("games.db");
            }
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".gogg").join("games.db")
    }
}

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


//! Persistent catalogue and token storage (SQLite via sqlx)

pub mod database;
pub mod games;
pub mod migrations;
pub mod models;
pub mod tokens;

pub use database::Database;
pub use games::{GameRepository, SqliteGameRepository};
pub use models::{GameRecord, TokenRecord};
pub use tokens::{SqliteTokenRepository, TokenRepository};

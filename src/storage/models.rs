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


//! Database entity models
//!
//! Timestamps are stored as RFC 3339 TEXT; the raw game-detail payload is
//! stored verbatim so re-parsing stays faithful to what the service sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One owned game in the local catalogue, keyed by the service's numeric id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct GameRecord {
    pub id: i64,
    pub title: String,
    /// Raw game-detail JSON as returned by the service
    pub data: String,
}

/// The single stored OAuth token set (row id pinned to 1)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TokenRecord {
    pub access: String,
    pub refresh: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    /// True when every field is usable
    pub fn is_complete(&self) -> bool {
        !self.access.is_empty() && !self.refresh.is_empty()
    }
}

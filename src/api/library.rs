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


//! Catalogue synchronizer
//!
//! Mirrors the authenticated user's owned-game list into the local store:
//! fetch the paginated id list, clear the catalogue, then fan per-game
//! detail fetches out over the worker pool and upsert each result. Detail
//! fetch failures and empty titles are logged and skipped; the sync as a
//! whole only fails on auth errors, list-fetch errors or cancellation.
//!
//! Pagination follows the `next` link until it is absent or resolves to a
//! URL already visited. The canonical form drops a trailing slash and an
//! empty query string, which is what breaks self-referential `next` loops
//! the service has been seen to produce.

use crate::api::auth::TokenService;
use crate::api::client::ApiClient;
use crate::error::{GoggError, Result};
use crate::pool;
use crate::storage::{GameRecord, GameRepository};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Base URL of the service's account endpoints
pub const EMBED_BASE: &str = "https://embed.gog.com";

#[derive(Debug, Deserialize)]
struct OwnedGamesPage {
    #[serde(default)]
    owned: Vec<i64>,
    #[serde(default)]
    next: Option<String>,
}

/// Client for the owned-games and game-details endpoints
#[derive(Debug, Clone)]
pub struct LibraryClient {
    api: ApiClient,
    base: String,
}

impl LibraryClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            base: EMBED_BASE.to_string(),
        }
    }

    /// Point the client at a different service base (tests).
    pub fn with_base(api: ApiClient, base: impl Into<String>) -> Self {
        Self {
            api,
            base: base.into(),
        }
    }

    /// Re-sync the catalogue.
    ///
    /// `progress` receives the completed fraction in `0.0..=1.0`; it is
    /// called once per finished game and once with `1.0` when the account
    /// owns nothing.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
        auth: &TokenService,
        games: Arc<dyn GameRepository>,
        num_workers: usize,
        progress: impl Fn(f64) + Send + Sync + 'static,
    ) -> Result<()> {
        pool::validate_workers(num_workers)?;

        let token = auth.current_token(cancel).await?;

        let ids = self.owned_game_ids(cancel, &token).await?;
        let total = ids.len();
        if total == 0 {
            progress(1.0);
            return Ok(());
        }
        log::info!("refreshing catalogue: {total} owned game(s)");

        games.clear().await?;

        let completed = Arc::new(AtomicUsize::new(0));
        let progress = Arc::new(progress);
        let client = self.clone();

        let errors = pool::run(cancel, ids, num_workers, move |cancel, id| {
            let client = client.clone();
            let token = token.clone();
            let games = Arc::clone(&games);
            let completed = Arc::clone(&completed);
            let progress = Arc::clone(&progress);
            async move {
                match client.fetch_game_details(&cancel, &token, id).await {
                    Ok((title, raw)) if !title.is_empty() => {
                        if let Err(e) = games.put(&GameRecord { id, title, data: raw }).await {
                            log::warn!("game {id}: failed to store details: {e}");
                        }
                    }
                    Ok(_) => log::warn!("game {id}: empty title, skipping"),
                    Err(e) => log::warn!("game {id}: failed to fetch details: {e}"),
                }
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                (*progress)(done as f64 / total as f64);
                Ok(())
            }
        })
        .await;
        debug_assert!(errors.is_empty(), "library workers report via logs");

        if cancel.is_cancelled() {
            return Err(GoggError::Cancelled);
        }
        Ok(())
    }

    /// All owned game ids, following pagination.
    pub async fn owned_game_ids(
        &self,
        cancel: &CancellationToken,
        token: &str,
    ) -> Result<Vec<i64>> {
        let mut url = format!("{}/user/data/games", self.base);
        let mut seen: HashSet<String> = HashSet::new();
        let mut ids = Vec::new();

        loop {
            if !seen.insert(canonicalize(&url)) {
                // The next link pointed somewhere we already fetched.
                break;
            }

            let page: OwnedGamesPage = self.api.get_json(cancel, &url, Some(token)).await?;
            ids.extend(page.owned);

            match page.next {
                Some(next) if !next.is_empty() => {
                    url = resolve_next(&url, &next)?;
                }
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Title and raw payload for one game. The payload is stored verbatim.
    pub async fn fetch_game_details(
        &self,
        cancel: &CancellationToken,
        token: &str,
        id: i64,
    ) -> Result<(String, String)> {
        let url = format!("{}/account/gameDetails/{id}.json", self.base);
        let raw = self.api.get_text(cancel, &url, Some(token)).await?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| GoggError::internal(format!("game {id}: invalid details JSON: {e}")))?;
        let title = value
            .get("title")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        Ok((title, raw))
    }
}

/// Canonical URL form used for pagination cycle detection: trailing slash
/// and empty query dropped.
fn canonicalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let trimmed = url.path().trim_end_matches('/').to_string();
            url.set_path(&trimmed);
            if url.query().is_some_and(|q| q.is_empty()) {
                url.set_query(None);
            }
            url.to_string()
        }
        Err(_) => raw.trim_end_matches('/').to_string(),
    }
}

/// Resolve a possibly-relative `next` link against the page it came from.
fn resolve_next(current: &str, next: &str) -> Result<String> {
    let base = Url::parse(current)
        .map_err(|e| GoggError::internal(format!("invalid page url {current:?}: {e}")))?;
    let resolved = base
        .join(next)
        .map_err(|e| GoggError::internal(format!("invalid next link {next:?}: {e}")))?;
    Ok(resolved.to_string())
}

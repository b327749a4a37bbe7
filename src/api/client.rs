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


//! HTTP client for GOG API calls
//!
//! All non-download requests go through [`ApiClient`]: a 30-second request
//! timeout, up to 3 attempts with exponential backoff starting at one
//! second, retrying on transport failures and 5xx responses. Only GETs are
//! retried. Every call takes a cancellation token and aborts at the next
//! suspension point once it fires.
//!
//! Download transfers use separately-built clients (no total timeout, and a
//! redirect-free probe client) exposed at the bottom of this module.

use crate::error::{GoggError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Maximum attempts per request (1 initial + 2 retries)
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff, doubled per attempt: 1s, 2s
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

/// Per-request timeout for API calls
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("gogg/", env!("CARGO_PKG_VERSION"));

/// Await a reqwest future, mapping cancellation to [`GoggError::Cancelled`].
pub(crate) async fn send_cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = reqwest::Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(GoggError::Cancelled),
        result = fut => result.map_err(GoggError::from),
    }
}

async fn sleep_cancellable(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(GoggError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Retry-aware client for the service's JSON endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    max_retries: u32,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            max_retries: MAX_RETRY_ATTEMPTS,
        })
    }

    /// GET `url` and deserialize the JSON body.
    pub async fn get_json<T>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.get_with_retry(cancel, url, bearer).await?;
        let body = send_cancellable(cancel, response.text()).await?;
        serde_json::from_str(&body)
            .map_err(|e| GoggError::internal(format!("invalid response from {url}: {e}")))
    }

    /// GET `url` and return the raw body text.
    pub async fn get_text(
        &self,
        cancel: &CancellationToken,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<String> {
        let response = self.get_with_retry(cancel, url, bearer).await?;
        send_cancellable(cancel, response.text()).await
    }

    /// GET with bounded retries on transport failures and 5xx responses.
    pub async fn get_with_retry(
        &self,
        cancel: &CancellationToken,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request = self.http.get(url);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(GoggError::Cancelled),
                result = request.send() => result,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.is_server_error() && attempt < self.max_retries {
                        log::warn!("GET {url}: status {status}, retrying (attempt {attempt})");
                        self.backoff(cancel, attempt).await?;
                        continue;
                    }
                    return Err(GoggError::status(
                        format!("GET {url} returned {status}"),
                        status.as_u16(),
                    ));
                }
                Err(e) if attempt < self.max_retries => {
                    log::warn!("GET {url}: {e}, retrying (attempt {attempt})");
                    self.backoff(cancel, attempt).await?;
                }
                Err(e) => {
                    return Err(GoggError::network(format!("GET {url}: {e}")));
                }
            }
        }
    }

    /// POST a form and deserialize the JSON body. Not retried: the callers
    /// are token-exchange operations that must not be replayed blindly.
    pub async fn post_form<T>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<(StatusCode, T)>
    where
        T: DeserializeOwned,
    {
        let response =
            send_cancellable(cancel, self.http.post(url).form(form).send()).await?;
        let status = response.status();
        let body = send_cancellable(cancel, response.text()).await?;
        let parsed = serde_json::from_str(&body)
            .map_err(|e| GoggError::internal(format!("invalid response from {url}: {e}")))?;
        Ok((status, parsed))
    }

    async fn backoff(&self, cancel: &CancellationToken, attempt: u32) -> Result<()> {
        let delay = Duration::from_secs(INITIAL_RETRY_DELAY_SECS << (attempt - 1));
        sleep_cancellable(cancel, delay).await
    }
}

/// Client for file transfers: no total timeout (large files on slow links
/// must complete), 30 s to establish the connection.
pub fn download_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

/// Client that never follows redirects, used to resolve CDN locations and
/// canonical filenames by hand.
pub fn no_redirect_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

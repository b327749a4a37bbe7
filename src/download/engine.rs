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


//! Download engine
//!
//! Executes one game's file downloads: a single-threaded planning phase
//! builds the task list and announces the estimated overall size, then the
//! worker pool runs per-file transfers.
//!
//! Each transfer follows a fixed sequence: resolve the CDN redirect (the
//! API's manual URLs return 302s whose Location carries the canonical
//! filename with its extension), probe the size with an authenticated HEAD,
//! open the target file (append when resuming), issue the ranged GET, and
//! stream chunks through the global throttle into a buffered writer while
//! emitting one progress line per write.
//!
//! Cancellation policy: a partial file is deleted when the run was started
//! without `resume` (nothing will pick it up), and kept otherwise so a
//! later resumed run can continue from its length. A server that answers a
//! ranged request with 200 gets the file truncated and rewritten from
//! offset zero; appending the full body after the existing prefix could
//! never converge to the right bytes.

use crate::api::client::{download_client, no_redirect_client, send_cancellable};
use crate::api::library::EMBED_BASE;
use crate::catalog::model::GameDetails;
use crate::download::progress::{FileProgress, ProgressSink, ProgressUpdate};
use crate::download::task::{self, base_name, sanitize_path, DownloadTask};
use crate::download::throttle;
use crate::error::{GoggError, Result};
use crate::pool;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, LOCATION, RANGE};
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

/// Disk write buffer size
const COPY_BUFFER_SZ: usize = 32 * 1024;

/// Filters and behavior switches for one download run
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Language filter, matched case-insensitively ("en", "fr", ...)
    pub language: String,
    /// "windows", "mac", "linux" or "all"
    pub platform: String,
    pub include_extras: bool,
    pub include_dlcs: bool,
    /// Continue partially-downloaded files instead of restarting them
    pub resume: bool,
    /// Put main installer files directly in the game root instead of a
    /// per-platform subdir; `extras/` and `dlcs/...` keep their layout
    pub flatten: bool,
    /// Drop files whose URL or name mentions "patch"
    pub skip_patches: bool,
    pub num_workers: usize,
}

/// Per-game download driver
#[derive(Clone)]
pub struct Downloader {
    /// Transfer client: no total timeout, follows redirects
    client: reqwest::Client,
    /// Probe client: never follows redirects
    probe: reqwest::Client,
    embed_base: String,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: download_client()?,
            probe: no_redirect_client()?,
            embed_base: EMBED_BASE.to_string(),
        })
    }

    /// Use a different service base for relative manual URLs (tests).
    pub fn with_embed_base(base: impl Into<String>) -> Result<Self> {
        let mut downloader = Self::new()?;
        downloader.embed_base = base.into();
        Ok(downloader)
    }

    /// Download every selected file of `game` under `download_path`.
    ///
    /// Emits one `start` progress line, then per-file `file_progress`
    /// lines, and finishes by writing `metadata.json` into the game's
    /// output root. Per-file failures are collected; the first one is
    /// reported in the aggregate error after all workers drain.
    pub async fn download_game_files(
        &self,
        cancel: &CancellationToken,
        access_token: &str,
        game: &GameDetails,
        download_path: &Path,
        opts: &DownloadOptions,
        sink: Arc<ProgressSink>,
    ) -> Result<()> {
        pool::validate_workers(opts.num_workers)?;

        tokio::fs::create_dir_all(download_path).await?;

        let overall_total = game.estimate_storage_size(
            &opts.language,
            &opts.platform,
            opts.include_extras,
            opts.include_dlcs,
        );
        sink.emit(&ProgressUpdate::start(overall_total))?;

        let tasks = task::build_task_list(game, opts, &self.embed_base);
        log::info!(
            "downloading {}: {} file(s), ~{} byte(s)",
            game.title,
            tasks.len(),
            overall_total
        );

        let game_root = download_path.join(sanitize_path(&game.title));

        let engine = self.clone();
        let token = access_token.to_string();
        let root = game_root.clone();
        let errors = pool::run(cancel, tasks, opts.num_workers, move |cancel, task| {
            let engine = engine.clone();
            let token = token.clone();
            let root = root.clone();
            let sink = Arc::clone(&sink);
            async move { engine.download_file(&cancel, &token, &root, task, &sink).await }
        })
        .await;

        if cancel.is_cancelled() {
            return Err(GoggError::Cancelled);
        }

        // Keep a queryable copy of what was downloaded next to the files.
        tokio::fs::create_dir_all(&game_root).await?;
        let metadata = serde_json::to_string_pretty(game)?;
        tokio::fs::write(game_root.join("metadata.json"), metadata).await?;

        if errors.iter().any(|e| matches!(e, GoggError::Cancelled)) {
            return Err(GoggError::Cancelled);
        }
        match errors.first() {
            None => Ok(()),
            Some(first) => Err(GoggError::DownloadsFailed {
                failed: errors.len(),
                first: first.to_string(),
            }),
        }
    }

    /// Transfer one file: redirect resolution, HEAD sizing, open, ranged
    /// GET, throttled streaming copy.
    async fn download_file(
        &self,
        cancel: &CancellationToken,
        token: &str,
        game_root: &Path,
        task: DownloadTask,
        sink: &ProgressSink,
    ) -> Result<()> {
        let (url, filename) = self.resolve_redirect(cancel, token, &task).await?;

        let filename = match urlencoding::decode(&filename) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => filename,
        };

        let target_dir = if task.flatten || task.subdir.is_empty() {
            game_root.to_path_buf()
        } else {
            game_root.join(&task.subdir)
        };
        tokio::fs::create_dir_all(&target_dir).await?;
        let file_path = target_dir.join(&filename);

        let (file, start_offset) = open_target(&file_path, task.resume).await?;

        let result = self
            .transfer(cancel, token, &url, &filename, &file_path, file, start_offset, &task, sink)
            .await;

        if matches!(result, Err(GoggError::Cancelled)) && !task.resume {
            // Nothing will ever continue this partial file.
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        result
    }

    /// Size the file, request the body (ranged when resuming) and stream
    /// it to disk.
    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        cancel: &CancellationToken,
        token: &str,
        url: &str,
        filename: &str,
        file_path: &Path,
        mut file: File,
        start_offset: u64,
        task: &DownloadTask,
        sink: &ProgressSink,
    ) -> Result<()> {
        let total_size = self.probe_size(cancel, token, url).await?;
        let total_for_progress = total_size.map(|t| t as i64).unwrap_or(-1);

        if task.resume {
            if let Some(total) = total_size {
                if total > 0 && start_offset >= total {
                    let progress =
                        FileProgress::new(sink, filename.to_string(), start_offset, total_for_progress);
                    progress.emit_current()?;
                    return Ok(());
                }
            }
        }

        let mut request = self.client.get(url).bearer_auth(token);
        if task.resume && start_offset > 0 {
            request = request.header(RANGE, format!("bytes={start_offset}-"));
        }
        let response = send_cancellable(cancel, request.send()).await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(GoggError::status(
                format!("GET {url} returned {status}"),
                status.as_u16(),
            ));
        }

        let mut progress =
            FileProgress::new(sink, filename.to_string(), start_offset, total_for_progress);
        if status == StatusCode::OK && start_offset > 0 {
            // The server ignored the range; start the file over.
            drop(file);
            file = File::create(file_path).await?;
            progress.reset();
        }

        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SZ, file);
        copy_stream(cancel, response, &mut writer, &mut progress).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Follow at most one redirect by hand to learn the CDN URL and the
    /// canonical filename. The API hands out manual URLs without an
    /// extension; the redirect target carries the real name.
    async fn resolve_redirect(
        &self,
        cancel: &CancellationToken,
        token: &str,
        task: &DownloadTask,
    ) -> Result<(String, String)> {
        let mut url = task.url.clone();
        let mut filename = task.filename.clone();

        let response =
            send_cancellable(cancel, self.probe.get(&url).bearer_auth(token).send()).await?;
        if response.status().is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                url = location.to_string();
                let base = base_name(location);
                if !base.is_empty() && base.contains('.') {
                    filename = base.to_string();
                }
            }
        }

        Ok((url, filename))
    }

    /// Authenticated HEAD; `None` when the server doesn't say how big the
    /// file is (the copy then streams to end-of-body).
    async fn probe_size(
        &self,
        cancel: &CancellationToken,
        token: &str,
        url: &str,
    ) -> Result<Option<u64>> {
        let response =
            send_cancellable(cancel, self.client.head(url).bearer_auth(token).send()).await?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok()))
    }
}

/// Open the target file: append to an existing file when resuming,
/// truncate otherwise. Returns the handle and the starting offset.
async fn open_target(file_path: &Path, resume: bool) -> Result<(File, u64)> {
    if resume && tokio::fs::try_exists(file_path).await.unwrap_or(false) {
        let file = OpenOptions::new().append(true).open(file_path).await?;
        let offset = file.metadata().await?.len();
        Ok((file, offset))
    } else {
        Ok((File::create(file_path).await?, 0))
    }
}

/// Streaming copy loop: throttled, progress-reporting, cancellable at
/// every chunk and at every throttle wait.
async fn copy_stream(
    cancel: &CancellationToken,
    response: reqwest::Response,
    writer: &mut BufWriter<File>,
    progress: &mut FileProgress<'_>,
) -> Result<()> {
    let mut stream = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(GoggError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| GoggError::Download(format!("stream error: {e}")))?;

        let mut offset = 0;
        while offset < chunk.len() {
            if cancel.is_cancelled() {
                return Err(GoggError::Cancelled);
            }
            let allowed = throttle::allow(chunk.len() - offset).await;
            let end = (offset + allowed).min(chunk.len());
            writer.write_all(&chunk[offset..end]).await?;
            progress.advance((end - offset) as u64)?;
            offset = end;
        }
    }
    Ok(())
}

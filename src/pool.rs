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


//! Bounded worker pool
//!
//! Drives both the catalogue synchronizer and the download engine: a fixed
//! number of workers consume items from a channel whose capacity equals the
//! worker count, so the feeder stays within one "round" of the consumers.
//! Worker failures are collected and returned after the pool drains; they
//! never abort sibling workers. Cancellation stops the feeder and makes
//! workers return at the next item boundary.

use crate::error::{GoggError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Bounds for user-selected worker counts
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 20;

/// Reject worker counts outside the supported range.
///
/// Every driver of the pool calls this before [`run`]: a zero-worker pool
/// would leave the feeder blocked on a channel nobody drains.
pub fn validate_workers(num_workers: usize) -> Result<()> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&num_workers) {
        return Err(GoggError::invalid(format!(
            "worker count must be between {MIN_WORKERS} and {MAX_WORKERS}, got {num_workers}"
        )));
    }
    Ok(())
}

/// Process `items` with `num_workers` concurrent workers.
///
/// Each item is handed to `work` exactly once unless the token fires first.
/// Errors returned by `work` are collected into the result vector in no
/// particular order. Callers enforce the worker-count bounds through
/// [`validate_workers`] before entering the pool.
pub async fn run<T, F, Fut>(
    cancel: &CancellationToken,
    items: Vec<T>,
    num_workers: usize,
    work: F,
) -> Vec<GoggError>
where
    T: Send + 'static,
    F: Fn(CancellationToken, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let (item_tx, item_rx) = mpsc::channel::<T>(num_workers.max(1));
    let item_rx = Arc::new(Mutex::new(item_rx));
    let (err_tx, mut err_rx) = mpsc::channel::<GoggError>(total);
    let work = Arc::new(work);

    let mut workers = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let item_rx = Arc::clone(&item_rx);
        let err_tx = err_tx.clone();
        let work = Arc::clone(&work);
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            loop {
                // Hold the receiver lock only while waiting for an item.
                let item = { item_rx.lock().await.recv().await };
                let Some(item) = item else { break };
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = (*work)(cancel.clone(), item).await {
                    let _ = err_tx.send(e).await;
                }
            }
        }));
    }
    drop(err_tx);

    // Feed items; stop enqueuing once cancelled.
    for item in items {
        if cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = item_tx.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    drop(item_tx);

    for worker in workers {
        let _ = worker.await;
    }

    let mut errors = Vec::new();
    while let Ok(e) = err_rx.try_recv() {
        errors.push(e);
    }
    errors
}

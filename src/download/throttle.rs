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


//! Process-global download rate limiting
//!
//! A single token bucket shared by every download worker: `rate` tokens
//! (bytes) refill per second, capped at one second's worth. Workers ask for
//! a byte allowance before writing each chunk piece; when the bucket is
//! empty they sleep for one token's refill time and try again. The bucket
//! lives behind a read-write lock so the host can swap or disable it while
//! transfers are running.

use lazy_static::lazy_static;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Token bucket guarded by its own mutex
#[derive(Debug)]
pub struct RateLimiter {
    rate: u64,
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    fn new(rate: u64) -> Self {
        Self {
            rate,
            tokens: rate as f64,
            last: Instant::now(),
        }
    }
}

lazy_static! {
    static ref GLOBAL_LIMITER: RwLock<Option<Arc<Mutex<RateLimiter>>>> = RwLock::new(None);
}

/// Set or disable the process-wide download rate limit.
///
/// `bytes_per_second <= 0` disables limiting. Setting a new rate replaces
/// the bucket; accumulated tokens are capped at the new rate.
pub fn set_global_download_rate_limit(bytes_per_second: i64) {
    let mut guard = GLOBAL_LIMITER.write().unwrap_or_else(|e| e.into_inner());
    if bytes_per_second <= 0 {
        *guard = None;
    } else {
        *guard = Some(Arc::new(Mutex::new(RateLimiter::new(
            bytes_per_second as u64,
        ))));
    }
}

fn global() -> Option<Arc<Mutex<RateLimiter>>> {
    GLOBAL_LIMITER
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Byte allowance for the next write.
///
/// Returns `want` immediately when no limit is configured; otherwise blocks
/// until at least one token is available and returns at most the current
/// token count.
pub async fn allow(want: usize) -> usize {
    match global() {
        None => want,
        Some(limiter) => acquire(&limiter, want).await,
    }
}

/// Acquire up to `want` tokens from `limiter`, sleeping while empty.
pub async fn acquire(limiter: &Arc<Mutex<RateLimiter>>, want: usize) -> usize {
    loop {
        let wait = {
            let mut bucket = limiter.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.last).as_secs_f64();
            bucket.last = now;
            bucket.tokens = (bucket.tokens + elapsed * bucket.rate as f64).min(bucket.rate as f64);

            if bucket.tokens as i64 > 0 {
                let allowed = (bucket.tokens as u64).min(want as u64).max(1) as usize;
                bucket.tokens -= allowed as f64;
                return allowed;
            }
            Duration::from_secs_f64(1.0 / bucket.rate as f64)
        };
        tokio::time::sleep(wait).await;
    }
}

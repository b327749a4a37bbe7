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


//! Download progress reporting
//!
//! Progress flows to the caller as newline-delimited JSON: exactly one
//! `start` event carrying the estimated overall byte total, followed by
//! `file_progress` events whose `current` value is strictly monotone per
//! file. The sink serializes whole lines under a lock so concurrent
//! workers never interleave partial writes.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;

/// One progress event, serialized as a single JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    /// Expected file size; `-1` when the server didn't say
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_total: Option<u64>,
}

impl ProgressUpdate {
    /// The single event opening a download run
    pub fn start(overall_total: u64) -> Self {
        Self {
            kind: "start".to_string(),
            file: None,
            current: None,
            total: None,
            overall_total: Some(overall_total),
        }
    }

    /// Per-file byte count update
    pub fn file_progress(file: &str, current: u64, total: i64) -> Self {
        Self {
            kind: "file_progress".to_string(),
            file: Some(file.to_string()),
            current: Some(current),
            total: Some(total),
            overall_total: None,
        }
    }
}

/// Line-oriented JSON writer, safe for concurrent workers
pub struct ProgressSink {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl ProgressSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    /// Write one complete JSON line.
    pub fn emit(&self, update: &ProgressUpdate) -> Result<()> {
        let mut line = serde_json::to_string(update)?;
        line.push('\n');
        let mut writer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Byte counter for one file, emitting an event per write
pub(crate) struct FileProgress<'a> {
    sink: &'a ProgressSink,
    file: String,
    current: u64,
    total: i64,
}

impl<'a> FileProgress<'a> {
    pub(crate) fn new(sink: &'a ProgressSink, file: String, start_offset: u64, total: i64) -> Self {
        Self {
            sink,
            file,
            current: start_offset,
            total,
        }
    }

    /// Restart counting from zero (server ignored the resume range).
    pub(crate) fn reset(&mut self) {
        self.current = 0;
    }

    /// Record `n` freshly-written bytes and emit an event.
    pub(crate) fn advance(&mut self, n: u64) -> Result<()> {
        self.current += n;
        self.sink
            .emit(&ProgressUpdate::file_progress(&self.file, self.current, self.total))
    }

    /// Emit the current state without advancing (already-complete files).
    pub(crate) fn emit_current(&self) -> Result<()> {
        self.sink
            .emit(&ProgressUpdate::file_progress(&self.file, self.current, self.total))
    }
}

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


//! Error types for Gogg
//!
//! One error enum for the whole crate, defined with thiserror and grouped
//! by domain (validation, auth, network, download, storage). Helper
//! predicates classify errors for retry and re-login decisions.

use thiserror::Error;

/// Result type alias using our GoggError type
pub type Result<T> = std::result::Result<T, GoggError>;

/// Main error type for Gogg
#[derive(Error, Debug)]
pub enum GoggError {
    // ===== Validation =====

    /// Bad user input: language code, game id, thread count, hash
    /// algorithm, size unit
    #[error("invalid input: {0}")]
    Validation(String),

    // ===== Lookup =====

    /// Requested record does not exist in the local catalogue
    #[error("not found: {0}")]
    NotFound(String),

    // ===== Auth =====

    /// No usable token; the user has to go through the login flow again
    #[error("login required: {0}")]
    NeedsLogin(String),

    // ===== Network =====

    /// Transport failure or non-2xx status after retries
    #[error("network error: {message}")]
    Network {
        message: String,
        /// HTTP status code if a response was received
        status: Option<u16>,
    },

    // ===== Download =====

    /// Per-file download failure (bad status, disk error, size mismatch)
    #[error("download failed: {0}")]
    Download(String),

    /// Aggregate of per-file failures after the worker pool drained
    #[error("{failed} download(s) failed, first error: {first}")]
    DownloadsFailed { failed: usize, first: String },

    // ===== General =====

    /// Operation cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Unexpected I/O or parse failure
    #[error("internal error: {0}")]
    Internal(String),

    // ===== External library errors =====

    /// HTTP client error from reqwest
    #[error("http client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl GoggError {
    /// Create a Network error carrying an HTTP status
    pub fn status<S: Into<String>>(message: S, status: u16) -> Self {
        GoggError::Network {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a Network error without a status (transport failure)
    pub fn network<S: Into<String>>(message: S) -> Self {
        GoggError::Network {
            message: message.into(),
            status: None,
        }
    }

    /// Create a Validation error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        GoggError::Validation(message.into())
    }

    /// Create an Internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        GoggError::Internal(message.into())
    }

    /// True for transient failures that may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            GoggError::Network { status: None, .. } => true,
            GoggError::Network {
                status: Some(code), ..
            } => (500..=599).contains(code),
            GoggError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// True when the user has to re-authenticate
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            GoggError::NeedsLogin(_)
                | GoggError::Network {
                    status: Some(401) | Some(403),
                    ..
                }
        )
    }
}

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


//! Integrity hashing for downloaded files
//!
//! A concurrent walker-and-hasher: collect candidate files (skipping
//! metadata and existing hash sidecars), fan the hashing work out over the
//! worker pool, and stream results back through a channel. Hashes can
//! optionally be written next to each file as `<file>.<algo>` sidecars;
//! `clean_hashes` removes those again.

use crate::error::{GoggError, Result};
use crate::pool;
use sha1::Digest;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Read buffer for hashing
const HASH_BUFF_SZ: usize = 32 * 1024;

/// Files skipped by default: VCS internals, spreadsheets and docs that
/// ship next to installers, and hash sidecars themselves.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    ".git",
    "*.json",
    "*.csv",
    "*.md",
    "*.md5",
    "*.sha1",
    "*.sha256",
    "*.sha512",
];

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
    ];

    /// Sidecar file extension (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = GoggError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(GoggError::invalid(format!(
                "unsupported hash algorithm: {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Outcome for one hashed file
#[derive(Debug)]
pub struct HashEntry {
    pub file: PathBuf,
    pub result: Result<String>,
}

/// Hash `files` concurrently with `num_threads` workers.
///
/// Results arrive on the returned channel in completion order. With
/// `write_sidecar`, each successful hash is also written to
/// `<file>.<algo>`. Cancelling the token stops scheduling; in-flight
/// files still deliver their entry. A thread count outside the pool's
/// supported range is a `Validation` error.
pub fn generate_hashes(
    cancel: &CancellationToken,
    files: Vec<PathBuf>,
    algo: HashAlgorithm,
    num_threads: usize,
    write_sidecar: bool,
) -> Result<mpsc::Receiver<HashEntry>> {
    pool::validate_workers(num_threads)?;

    let (tx, rx) = mpsc::channel(files.len().max(1));
    let cancel = cancel.clone();

    tokio::spawn(async move {
        let errors = pool::run(&cancel, files, num_threads, move |cancel, file| {
            let tx = tx.clone();
            async move {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                let mut result = hash_file(&file, algo).await;
                if write_sidecar {
                    if let Ok(ref digest) = result {
                        let sidecar = sidecar_path(&file, algo);
                        if let Err(e) = tokio::fs::write(&sidecar, format!("{digest}\n")).await {
                            result = Err(GoggError::internal(format!(
                                "failed to write {}: {e}",
                                sidecar.display()
                            )));
                        }
                    }
                }
                let _ = tx.send(HashEntry { file, result }).await;
                Ok(())
            }
        })
        .await;
        debug_assert!(errors.is_empty(), "hash workers report through the channel");
    });

    Ok(rx)
}

/// Hash a single file off the async runtime's worker threads.
pub async fn hash_file(path: &Path, algo: HashAlgorithm) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || hash_file_blocking(&path, algo))
        .await
        .map_err(|e| GoggError::internal(format!("hash task failed: {e}")))?
}

fn hash_file_blocking(path: &Path, algo: HashAlgorithm) -> Result<String> {
    enum Hasher {
        Md5(md5::Context),
        Sha1(sha1::Sha1),
        Sha256(sha2::Sha256),
        Sha512(sha2::Sha512),
    }

    let mut hasher = match algo {
        HashAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
        HashAlgorithm::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
        HashAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        HashAlgorithm::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
    };

    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; HASH_BUFF_SZ];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        match &mut hasher {
            Hasher::Md5(ctx) => ctx.consume(&buf[..n]),
            Hasher::Sha1(h) => h.update(&buf[..n]),
            Hasher::Sha256(h) => h.update(&buf[..n]),
            Hasher::Sha512(h) => h.update(&buf[..n]),
        }
    }

    Ok(match hasher {
        Hasher::Md5(ctx) => format!("{:x}", ctx.compute()),
        Hasher::Sha1(h) => hex::encode(h.finalize()),
        Hasher::Sha256(h) => hex::encode(h.finalize()),
        Hasher::Sha512(h) => hex::encode(h.finalize()),
    })
}

fn sidecar_path(file: &Path, algo: HashAlgorithm) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".");
    name.push(algo.extension());
    PathBuf::from(name)
}

/// Collect the files under `dir` worth hashing.
///
/// `exclusions` are glob-ish patterns: `*.ext` matches a suffix, anything
/// else matches the file or directory name exactly. Excluded directories
/// are not descended into.
pub fn find_files_to_hash(
    dir: &Path,
    recursive: bool,
    exclusions: &[&str],
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(GoggError::invalid(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            // Keep the root itself even if its name matches a pattern.
            entry.depth() == 0 || !matches_any(&name, exclusions)
        });

    for entry in walker {
        let entry = entry.map_err(|e| GoggError::internal(format!("walk failed: {e}")))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Delete hash sidecar files under `dir`. Returns how many were removed.
pub fn clean_hashes(dir: &Path, recursive: bool) -> Result<usize> {
    if !dir.is_dir() {
        return Err(GoggError::invalid(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut removed = 0;

    for entry in WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry.map_err(|e| GoggError::internal(format!("walk failed: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_sidecar = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| HashAlgorithm::ALL.iter().any(|a| a.extension() == ext));
        if is_sidecar {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    Ok(removed)
}

fn matches_any(name: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(suffix) = pattern.strip_prefix('*') {
            name.ends_with(suffix)
        } else {
            name == *pattern
        }
    })
}

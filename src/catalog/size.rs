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


//! Human-readable size strings ("1.5 GB", "1024", "2mb") to byte counts.
//!
//! GOG's game-detail payloads carry file sizes as display strings; the
//! estimator and download planner need them as numbers. Multipliers are
//! binary (1 KB = 1024 bytes), matching how the service rounds sizes.

use crate::error::{GoggError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SIZE_RE: Regex =
        Regex::new(r"^\s*([0-9]+(\.[0-9]+)?)\s*([A-Za-z]+)?\s*$").expect("size regex");
}

/// Parse a human-readable size string into bytes.
///
/// Recognized units (case-insensitive): `b`/`bytes`, `k`/`kb`/`kib`,
/// `m`/`mb`/`mib`, `g`/`gb`/`gib`, `t`/`tb`/`tib`. A missing unit means
/// bytes. Fractional values truncate toward zero after multiplication.
pub fn parse_size(input: &str) -> Result<u64> {
    let caps = match SIZE_RE.captures(input) {
        Some(caps) => caps,
        None => {
            // Fall back to a bare integer byte count.
            return input
                .trim()
                .parse::<u64>()
                .map_err(|_| GoggError::invalid(format!("unparsable size string: {input:?}")));
        }
    };

    let value: f64 = caps[1]
        .parse()
        .map_err(|_| GoggError::invalid(format!("unparsable size value: {input:?}")))?;

    let multiplier: u64 = match caps.get(3).map(|m| m.as_str().to_lowercase()) {
        None => 1,
        Some(unit) => match unit.as_str() {
            "b" | "bytes" => 1,
            "k" | "kb" | "kib" => 1 << 10,
            "m" | "mb" | "mib" => 1 << 20,
            "g" | "gb" | "gib" => 1 << 30,
            "t" | "tb" | "tib" => 1 << 40,
            _ => {
                return Err(GoggError::invalid(format!("unsupported size unit: {unit:?}")));
            }
        },
    };

    Ok((value * multiplier as f64) as u64)
}

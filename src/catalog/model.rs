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


//! Typed view of GOG's nested game-detail JSON
//!
//! The service's `downloads` array is positional: each entry is a
//! two-element tuple `[language, platforms]` rather than an object. Real
//! payloads contain malformed entries, so deserialization iterates raw
//! values and silently drops anything that doesn't fit that shape. DLC
//! entries carry their own downloads and extras, parsed the same way.
//!
//! Serialization reproduces the tuple wire shape so that `metadata.json`
//! round-trips what the service returned.

use crate::catalog::size::parse_size;
use crate::error::Result;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Names of the fixed platform set, in wire order.
pub const PLATFORM_NAMES: [&str; 3] = ["windows", "mac", "linux"];

/// A single downloadable file for one platform
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformFile {
    #[serde(default, rename = "manualUrl")]
    pub manual_url: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Human-readable size string, e.g. "1.5 GB"
    #[serde(default)]
    pub size: String,
}

/// Files partitioned by the fixed platform set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Platforms {
    #[serde(default)]
    pub windows: Vec<PlatformFile>,
    #[serde(default)]
    pub mac: Vec<PlatformFile>,
    #[serde(default)]
    pub linux: Vec<PlatformFile>,
}

impl Platforms {
    /// Files for a platform name from [`PLATFORM_NAMES`]
    pub fn files_for(&self, platform: &str) -> &[PlatformFile] {
        match platform {
            "windows" => &self.windows,
            "mac" => &self.mac,
            "linux" => &self.linux,
            _ => &[],
        }
    }
}

/// One `[language, platforms]` entry of the downloads array
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub language: String,
    pub platforms: Platforms,
}

/// Bonus content attached to a game or DLC
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extra {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default, rename = "manualUrl")]
    pub manual_url: String,
}

/// Downloadable content with its own download set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dlc {
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        serialize_with = "serialize_downloads",
        deserialize_with = "deserialize_downloads"
    )]
    pub downloads: Vec<DownloadEntry>,
    #[serde(default)]
    pub extras: Vec<Extra>,
}

/// Parsed game-detail payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameDetails {
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        serialize_with = "serialize_downloads",
        deserialize_with = "deserialize_downloads"
    )]
    pub downloads: Vec<DownloadEntry>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    #[serde(default)]
    pub dlcs: Vec<Dlc>,
}

/// Deserialize the positional downloads array, dropping entries that are
/// not a `[string, object]` pair.
fn deserialize_downloads<'de, D>(deserializer: D) -> std::result::Result<Vec<DownloadEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
    let mut entries = Vec::with_capacity(raw.len());
    for value in raw {
        let Some(pair) = value.as_array() else { continue };
        if pair.len() != 2 {
            continue;
        }
        let Some(language) = pair[0].as_str() else { continue };
        if !pair[1].is_object() {
            continue;
        }
        let Ok(platforms) = serde_json::from_value::<Platforms>(pair[1].clone()) else {
            continue;
        };
        entries.push(DownloadEntry {
            language: language.to_string(),
            platforms,
        });
    }
    Ok(entries)
}

fn serialize_downloads<S>(
    entries: &[DownloadEntry],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(entries.len()))?;
    for entry in entries {
        seq.serialize_element(&(&entry.language, &entry.platforms))?;
    }
    seq.end()
}

impl GameDetails {
    /// Parse the raw JSON stored in the catalogue.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Expected byte total for the chosen language/platform filter.
    ///
    /// `platform` is one of [`PLATFORM_NAMES`] or `"all"`. Sizes that fail
    /// to parse are skipped rather than failing the whole estimate.
    pub fn estimate_storage_size(
        &self,
        language: &str,
        platform: &str,
        include_extras: bool,
        include_dlcs: bool,
    ) -> u64 {
        let mut total = sum_downloads(&self.downloads, language, platform);
        if include_extras {
            total += sum_extras(&self.extras);
        }
        if include_dlcs {
            for dlc in &self.dlcs {
                total += sum_downloads(&dlc.downloads, language, platform);
                if include_extras {
                    total += sum_extras(&dlc.extras);
                }
            }
        }
        total
    }
}

fn sum_downloads(downloads: &[DownloadEntry], language: &str, platform: &str) -> u64 {
    let mut total = 0;
    for entry in downloads {
        if !entry.language.eq_ignore_ascii_case(language) {
            continue;
        }
        for name in PLATFORM_NAMES {
            if platform != "all" && !platform.eq_ignore_ascii_case(name) {
                continue;
            }
            for file in entry.platforms.files_for(name) {
                if let Ok(bytes) = parse_size(&file.size) {
                    total += bytes;
                }
            }
        }
    }
    total
}

fn sum_extras(extras: &[Extra]) -> u64 {
    extras
        .iter()
        .filter_map(|e| parse_size(&e.size).ok())
        .sum()
}

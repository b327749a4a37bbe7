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


//! Download task planning
//!
//! Turns a parsed game into the flat list of file-download tasks the worker
//! pool executes: main installers per platform, extras, and DLC installers
//! and extras, honoring the language/platform filters and the patch skip.
//! Subdirectory components are sanitized here so the engine can join them
//! directly under the game's output root.

use crate::catalog::model::{Extra, GameDetails, PLATFORM_NAMES};
use crate::download::engine::DownloadOptions;

/// One file to download; immutable after planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub filename: String,
    /// Path under the game root, already sanitized; empty for the root
    pub subdir: String,
    pub resume: bool,
    /// Collapse this task into the game root. Set only for main installer
    /// files; `extras/` and `dlcs/...` keep their directories.
    pub flatten: bool,
}

/// Make a string safe and tidy as a single path component.
///
/// Lowercases, strips `®`, `:`, `(`, `)`, `™` and path separators, and
/// collapses whitespace runs to `-`. Deterministic and never longer than
/// its input.
pub fn sanitize_path(name: &str) -> String {
    let mut out = name.to_lowercase();
    for ch in ['®', ':', '(', ')', '™'] {
        out = out.replace(ch, "");
    }
    out = out.replace(['/', '\\'], "-");
    out.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Build the task list for one game.
pub(crate) fn build_task_list(
    game: &GameDetails,
    opts: &DownloadOptions,
    embed_base: &str,
) -> Vec<DownloadTask> {
    let mut tasks = Vec::new();

    push_installer_tasks(&mut tasks, &game.downloads, "", opts, embed_base);

    if opts.include_extras {
        push_extra_tasks(&mut tasks, &game.extras, "extras", opts, embed_base);
    }

    if opts.include_dlcs {
        for dlc in &game.dlcs {
            let dlc_dir = format!("dlcs/{}", sanitize_path(&dlc.title));
            push_installer_tasks(&mut tasks, &dlc.downloads, &dlc_dir, opts, embed_base);
            if opts.include_extras {
                let extras_dir = format!("{dlc_dir}/extras");
                push_extra_tasks(&mut tasks, &dlc.extras, &extras_dir, opts, embed_base);
            }
        }
    }

    tasks
}

fn push_installer_tasks(
    tasks: &mut Vec<DownloadTask>,
    downloads: &[crate::catalog::model::DownloadEntry],
    dir_prefix: &str,
    opts: &DownloadOptions,
    embed_base: &str,
) {
    for entry in downloads {
        if !entry.language.eq_ignore_ascii_case(&opts.language) {
            continue;
        }
        for platform in PLATFORM_NAMES {
            if opts.platform != "all" && !opts.platform.eq_ignore_ascii_case(platform) {
                continue;
            }
            for file in entry.platforms.files_for(platform) {
                let Some(manual_url) = file.manual_url.as_deref() else {
                    continue;
                };
                if opts.skip_patches && is_patch(manual_url, &file.name) {
                    continue;
                }
                let subdir = if dir_prefix.is_empty() {
                    platform.to_string()
                } else {
                    format!("{dir_prefix}/{platform}")
                };
                tasks.push(DownloadTask {
                    url: absolute_url(manual_url, embed_base),
                    filename: base_name(manual_url).to_string(),
                    subdir,
                    resume: opts.resume,
                    // Only the main per-platform directory is optional.
                    flatten: dir_prefix.is_empty() && opts.flatten,
                });
            }
        }
    }
}

fn push_extra_tasks(
    tasks: &mut Vec<DownloadTask>,
    extras: &[Extra],
    subdir: &str,
    opts: &DownloadOptions,
    embed_base: &str,
) {
    for extra in extras {
        if extra.manual_url.is_empty() {
            continue;
        }
        if opts.skip_patches && is_patch(&extra.manual_url, &extra.name) {
            continue;
        }
        let base = base_name(&extra.manual_url);
        let ext = match base.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!(".{ext}"),
            _ => String::new(),
        };
        tasks.push(DownloadTask {
            url: absolute_url(&extra.manual_url, embed_base),
            filename: format!("{}{ext}", sanitize_path(&extra.name)),
            subdir: subdir.to_string(),
            resume: opts.resume,
            flatten: false,
        });
    }
}

fn is_patch(url: &str, name: &str) -> bool {
    url.to_lowercase().contains("patch") || name.to_lowercase().contains("patch")
}

fn absolute_url(manual_url: &str, embed_base: &str) -> String {
    if manual_url.starts_with("http://") || manual_url.starts_with("https://") {
        manual_url.to_string()
    } else {
        format!("{embed_base}{manual_url}")
    }
}

/// Last path segment of a URL path (query stripped).
pub(crate) fn base_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

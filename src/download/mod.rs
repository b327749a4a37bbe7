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


//! Concurrent download engine with resume, throttling and progress

pub mod engine;
pub mod progress;
pub mod task;
pub mod throttle;

pub use engine::{Downloader, DownloadOptions};
pub use progress::{ProgressSink, ProgressUpdate};
pub use task::{sanitize_path, DownloadTask};
pub use throttle::set_global_download_rate_limit;

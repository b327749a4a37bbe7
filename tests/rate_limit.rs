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


//! Global rate limiting applied to a real transfer.
//!
//! Kept in its own test binary: the limiter is process-wide state and
//! would slow every other download test running in the same process.

use gogg::catalog::GameDetails;
use gogg::download::{set_global_download_rate_limit, DownloadOptions, Downloader, ProgressSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn transfer_speed_is_capped_by_the_global_limit() {
    let server = MockServer::start().await;
    let body = vec![0u8; 100 * 1024];
    Mock::given(method("HEAD"))
        .and(path("/file"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let game = GameDetails::from_json(
        r#"{
            "title": "Slow Game",
            "downloads": [["en", {"windows": [
                {"manualUrl": "/file", "name": "Slow Game", "size": "100 kb"}
            ]}]]
        }"#,
    )
    .unwrap();

    let opts = DownloadOptions {
        language: "en".to_string(),
        platform: "windows".to_string(),
        include_extras: false,
        include_dlcs: false,
        resume: false,
        flatten: false,
        skip_patches: false,
        num_workers: 1,
    };

    // 50 KiB/s for a 100 KiB body: the burst covers the first second's
    // worth, the remaining 50 KiB must wait for refills.
    set_global_download_rate_limit(50 * 1024);
    let started = Instant::now();

    let root = tempfile::tempdir().unwrap();
    let sink = Arc::new(ProgressSink::new(std::io::sink()));
    let result = Downloader::with_embed_base(server.uri())
        .unwrap()
        .download_game_files(
            &CancellationToken::new(),
            "access-token",
            &game,
            root.path(),
            &opts,
            sink,
        )
        .await;
    let elapsed = started.elapsed();
    set_global_download_rate_limit(0);

    result.expect("throttled download succeeds");
    assert!(
        elapsed >= Duration::from_millis(800),
        "transfer finished too fast under a rate limit: {elapsed:?}"
    );

    let file_path = root.path().join("slow-game").join("windows").join("file");
    assert_eq!(std::fs::metadata(file_path).unwrap().len(), 100 * 1024);
}

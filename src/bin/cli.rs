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


use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use gogg::api::{ApiClient, GogAuthClient, LibraryClient, TokenService};
use gogg::catalog::GameDetails;
use gogg::download::{set_global_download_rate_limit, DownloadOptions, Downloader, ProgressSink};
use gogg::hash::{self, HashAlgorithm, DEFAULT_EXCLUSIONS};
use gogg::storage::{Database, GameRepository, TokenRepository};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "gogg")]
#[command(about = "Offline archiver for GOG game libraries", long_about = None)]
struct Cli {
    /// Abort everything after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-sync the owned-game catalogue from the service
    Refresh {
        /// Concurrent detail fetches
        #[arg(short, long, default_value_t = 5)]
        threads: usize,
    },
    /// Download one game's files
    Download {
        /// Numeric game id from the catalogue
        id: i64,
        /// Target directory
        path: PathBuf,
        #[arg(short, long, default_value = "en")]
        language: String,
        /// windows, mac, linux or all
        #[arg(short, long, default_value = "windows")]
        platform: String,
        #[arg(long)]
        extras: bool,
        #[arg(long)]
        dlcs: bool,
        #[arg(long)]
        resume: bool,
        #[arg(long)]
        flatten: bool,
        #[arg(long)]
        skip_patches: bool,
        #[arg(short, long, default_value_t = 4)]
        threads: usize,
        /// Download rate cap in bytes per second (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        rate_limit: i64,
    },
    /// Hash already-downloaded files
    Hash {
        dir: PathBuf,
        #[arg(short, long, default_value = "md5")]
        algo: String,
        #[arg(short, long, default_value_t = 4)]
        threads: usize,
        #[arg(short, long)]
        recursive: bool,
        /// Write <file>.<algo> sidecars next to each file
        #[arg(long)]
        save: bool,
    },
    /// Remove hash sidecar files
    CleanHashes {
        dir: PathBuf,
        #[arg(short, long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupted, shutting down");
                cancel.cancel();
            }
        });
    }
    if let Some(seconds) = cli.timeout {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            eprintln!("timeout reached, shutting down");
            cancel.cancel();
        });
    }

    match cli.command {
        Commands::Refresh { threads } => {
            let db = Database::new(Database::default_path()).await?;
            let api = ApiClient::new()?;
            let auth = TokenService::new(
                Arc::new(db.tokens()) as Arc<dyn TokenRepository>,
                Arc::new(GogAuthClient::new(api.clone())),
            );
            let library = LibraryClient::new(api);
            library
                .refresh(&cancel, &auth, Arc::new(db.games()), threads, |fraction| {
                    eprint!("\rsyncing catalogue: {:3.0}%", fraction * 100.0);
                })
                .await?;
            eprintln!();
            println!("catalogue refreshed");
        }
        Commands::Download {
            id,
            path,
            language,
            platform,
            extras,
            dlcs,
            resume,
            flatten,
            skip_patches,
            threads,
            rate_limit,
        } => {
            set_global_download_rate_limit(rate_limit);

            let db = Database::new(Database::default_path()).await?;
            let api = ApiClient::new()?;
            let auth = TokenService::new(
                Arc::new(db.tokens()) as Arc<dyn TokenRepository>,
                Arc::new(GogAuthClient::new(api.clone())),
            );
            let token = auth.current_token(&cancel).await?;

            let record = db
                .games()
                .get_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("game {id} is not in the catalogue; run refresh first"))?;
            let game = GameDetails::from_json(&record.data)
                .with_context(|| format!("stored details for game {id} are unreadable"))?;

            let options = DownloadOptions {
                language,
                platform,
                include_extras: extras,
                include_dlcs: dlcs,
                resume,
                flatten,
                skip_patches,
                num_workers: threads,
            };
            let sink = Arc::new(ProgressSink::new(std::io::stdout()));
            Downloader::new()?
                .download_game_files(&cancel, &token, &game, &path, &options, sink)
                .await?;
        }
        Commands::Hash {
            dir,
            algo,
            threads,
            recursive,
            save,
        } => {
            let algo = HashAlgorithm::from_str(&algo)?;
            let files = hash::find_files_to_hash(&dir, recursive, DEFAULT_EXCLUSIONS)?;
            let mut rx = hash::generate_hashes(&cancel, files, algo, threads, save)?;
            while let Some(entry) = rx.recv().await {
                match entry.result {
                    Ok(digest) => println!("{digest}  {}", entry.file.display()),
                    Err(e) => eprintln!("{}: {e}", entry.file.display()),
                }
            }
        }
        Commands::CleanHashes { dir, recursive } => {
            let removed = hash::clean_hashes(&dir, recursive)?;
            println!("removed {removed} hash file(s)");
        }
    }

    Ok(())
}

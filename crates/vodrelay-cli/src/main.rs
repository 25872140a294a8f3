//! vodrelay: moves recorded livestreams from cloud storage to the video
//! platform.
//!
//! All state lives next to the config file: `upload_history.json` holds
//! successful submissions, `failed_uploads.json` the give-ups.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use vodrelay_cli::{init_tracing, truncate_string};
use vodrelay_core::{format_size, Config, VideoRecord};
use vodrelay_engine::{
    CapacityGate, DiskProbe, EngineSettings, MountedStorage, ProcessorPreparer, SubmitTarget,
    UploadEngine, UploaderPublisher,
};
use vodrelay_history::HistoryStore;
use vodrelay_platform::{Copyright, PlatformClient};
use vodrelay_processing::MediaProcessor;
use vodrelay_storage::RemoteStorageClient;

#[derive(Parser)]
#[command(name = "vodrelay", about = "Livestream recording upload pipeline")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload pending videos from a streamer folder, one post per video
    Upload {
        /// Streamer folder on the remote ({roomId}-{streamerName})
        folder: String,
        /// Comma-separated filenames; all pending videos when omitted
        #[arg(long)]
        videos: Option<String>,
        /// Mark posts as original content instead of reprints
        #[arg(long)]
        original: bool,
    },
    /// Append videos from a folder to an existing post
    Append {
        /// Platform id of the post to append to
        target_id: String,
        /// Streamer folder on the remote
        folder: String,
        /// Comma-separated filenames; all pending videos when omitted
        #[arg(long)]
        videos: Option<String>,
    },
    /// Drop history entries whose post no longer exists on the platform
    ValidateHistory,
    /// Interactive platform login
    Login,
    /// List the account's recent posts
    List {
        /// Maximum number of posts
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List streamer folders with uploaded/pending tallies
    Folders,
    /// Remote storage operations
    Remote {
        #[command(subcommand)]
        sub: RemoteCommands,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// List configured rclone remotes
    List,
    /// Switch to another remote after a connectivity probe
    Use {
        /// Remote name as configured in rclone
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let state_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    match cli.command {
        Commands::Upload {
            folder,
            videos,
            original,
        } => {
            let copyright = if original {
                Copyright::Original
            } else {
                Copyright::Reprint
            };
            run_pipeline(
                &config,
                &state_dir,
                &folder,
                videos.as_deref(),
                SubmitTarget::NewPost,
                copyright,
            )
            .await?;
        }
        Commands::Append {
            target_id,
            folder,
            videos,
        } => {
            run_pipeline(
                &config,
                &state_dir,
                &folder,
                videos.as_deref(),
                SubmitTarget::Existing(target_id),
                Copyright::Reprint,
            )
            .await?;
        }
        Commands::ValidateHistory => validate_history(&config, &state_dir).await?,
        Commands::Login => {
            PlatformClient::new(&config).login().await?;
            println!("login succeeded");
        }
        Commands::List { limit } => list_posts(&config, limit).await?,
        Commands::Folders => list_folders(&config, &state_dir).await?,
        Commands::Remote { sub } => manage_remote(config, &cli.config, sub).await?,
    }

    Ok(())
}

fn load_history(state_dir: &Path) -> HistoryStore {
    HistoryStore::load(
        state_dir.join("upload_history.json"),
        state_dir.join("failed_uploads.json"),
    )
}

async fn run_pipeline(
    config: &Config,
    state_dir: &Path,
    folder: &str,
    videos: Option<&str>,
    target: SubmitTarget,
    copyright: Copyright,
) -> anyhow::Result<()> {
    let platform = PlatformClient::new(config);
    if !platform.check_logged_in().await {
        anyhow::bail!("not logged in to the platform, run `vodrelay login` first");
    }

    let storage = RemoteStorageClient::new(config);
    let plan = build_plan(&storage, folder, videos).await?;
    if plan.is_empty() {
        println!("no videos to process in {folder}");
        return Ok(());
    }
    tracing::info!(
        folder,
        count = plan.len(),
        total = %format_size(plan.iter().map(|v| v.size).sum()),
        "upload plan ready"
    );

    // Best-effort: with no mount every file goes through the download path.
    storage.mount().await;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            signal_cancel.cancel();
        }
    });

    let mut settings = EngineSettings::from_config(config);
    settings.copyright = copyright;
    let mut engine = UploadEngine::new(
        MountedStorage { client: storage },
        ProcessorPreparer {
            processor: MediaProcessor::new(config),
        },
        UploaderPublisher { client: platform },
        load_history(state_dir),
        CapacityGate::new(Box::new(DiskProbe), config.upload.min_free_space_gb),
        settings,
        cancel,
    );

    let stats = engine.run_batch(&plan, &target).await;
    engine.shutdown().await;

    println!("batch finished: {stats}");
    Ok(())
}

/// Chronologically ordered upload plan, optionally narrowed to an explicit
/// comma-separated file list.
async fn build_plan(
    storage: &RemoteStorageClient,
    folder: &str,
    videos: Option<&str>,
) -> anyhow::Result<Vec<VideoRecord>> {
    let mut plan = storage.plan_folder(folder).await;

    if let Some(csv) = videos {
        let wanted: HashSet<&str> = csv.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
        for name in &wanted {
            if !plan.iter().any(|v| v.filename == *name) {
                anyhow::bail!("requested video {name} not found in {folder}");
            }
        }
        plan.retain(|v| wanted.contains(v.filename.as_str()));
    }

    Ok(plan)
}

async fn validate_history(config: &Config, state_dir: &Path) -> anyhow::Result<()> {
    let platform = PlatformClient::new(config);
    if !platform.check_logged_in().await {
        anyhow::bail!("not logged in to the platform, run `vodrelay login` first");
    }

    let mut history = load_history(state_dir);
    let (checked, removed) = history
        .prune_invalid(&platform)
        .await
        .context("history validation failed")?;
    println!(
        "checked {checked} history entries, kept {}, removed {removed}",
        checked - removed
    );
    Ok(())
}

async fn list_posts(config: &Config, limit: usize) -> anyhow::Result<()> {
    let platform = PlatformClient::new(config);
    let posts = platform.list_recent(limit).await?;
    if posts.is_empty() {
        println!("no posts found");
        return Ok(());
    }
    for post in posts {
        println!("{}\t{}\t{}", post.id, post.status, truncate_string(&post.title, 60));
    }
    Ok(())
}

async fn manage_remote(
    mut config: Config,
    config_path: &Path,
    sub: RemoteCommands,
) -> anyhow::Result<()> {
    let storage = RemoteStorageClient::new(&config);
    match sub {
        RemoteCommands::List => {
            let remotes = storage.list_remotes().await;
            if remotes.is_empty() {
                println!("no rclone remotes configured");
                return Ok(());
            }
            for remote in remotes {
                let marker = if remote == config.remote_storage.remote {
                    " (active)"
                } else {
                    ""
                };
                println!("{remote}{marker}");
            }
        }
        RemoteCommands::Use { name } => {
            if !storage.test_connection(Some(&name)).await {
                anyhow::bail!("remote {name} did not answer a listing, config unchanged");
            }
            config.remote_storage.remote = name.clone();
            config.save(config_path)?;
            println!("switched active remote to {name}");
        }
    }
    Ok(())
}

async fn list_folders(config: &Config, state_dir: &Path) -> anyhow::Result<()> {
    let storage = RemoteStorageClient::new(config);
    let history = load_history(state_dir);

    let folders = storage.list_folders().await;
    if folders.is_empty() {
        println!("no folders found on the remote");
        return Ok(());
    }
    for folder in folders {
        let videos = storage.list_videos(&folder).await;
        let (uploaded, pending) = history.uploaded_count(&folder, &videos);
        println!("{folder}\t{} videos\t{uploaded} uploaded\t{pending} pending", videos.len());
    }
    Ok(())
}

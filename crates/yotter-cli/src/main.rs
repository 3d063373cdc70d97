//! Yotter CLI - inspect entities, manage the cache and moderation lists.
//!
//! Thin wrapper around yotter-core. Every command prints JSON on stdout;
//! logs go to stderr.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use yotter_core::{ModerationList, RecordKind, Yotter, YotterConfig};

#[derive(Parser, Debug)]
#[command(name = "yotter")]
#[command(about = "Administrative command line for Yotter")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file (defaults to $YOTTER_CONFIG_FILE or ./yotter-config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configuration
    #[arg(long, global = true, env = "YOTTER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a video
    Video {
        id: String,
        /// Also load the watch-page details (streams, captions, related)
        #[arg(long)]
        details: bool,
    },
    /// Show a channel by id or URL path (`/c/name`, `/user/name`)
    Channel {
        channel: String,
        /// Number of recent videos to list
        #[arg(long, default_value = "10")]
        videos: usize,
        /// Oldest recent video to list, in days
        #[arg(long, default_value = "30")]
        days: i64,
    },
    /// Show a playlist
    Playlist {
        id: String,
        #[arg(long, default_value = "10")]
        videos: usize,
    },
    /// Merged recent videos of several channels and playlists
    Recent {
        #[arg(long = "channel")]
        channels: Vec<String>,
        #[arg(long = "playlist")]
        playlists: Vec<String>,
        #[arg(long, default_value = "365")]
        days: i64,
        /// Maximum number of videos to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Drop every cached group
    PurgeCache,
    /// Show cache statistics
    CacheStats {
        /// Remove expired entries and enforce the durable size bound first
        #[arg(long)]
        maintain: bool,
    },
    /// Add or remove a channel or playlist from a moderation list
    Moderate {
        kind: KindArg,
        id: String,
        list: ListArg,
        /// Remove instead of add
        #[arg(long)]
        remove: bool,
    },
    /// Write the moderation lists to a JSON file
    ExportLists { path: PathBuf },
    /// Flag every id listed in an exported JSON file
    ImportLists { path: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Channel,
    Playlist,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Channel => RecordKind::Channel,
            KindArg::Playlist => RecordKind::Playlist,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ListArg {
    Allowed,
    Blocked,
}

impl From<ListArg> for ModerationList {
    fn from(list: ListArg) -> Self {
        match list {
            ListArg::Allowed => ModerationList::Allowed,
            ListArg::Blocked => ModerationList::Blocked,
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

fn load_config(args: &Args) -> Result<YotterConfig> {
    let mut config = match &args.config {
        Some(path) => YotterConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => YotterConfig::load()?,
    };
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = load_config(&args)?;
    debug!("Data directory: {}", config.data_dir.display());
    let yotter = Yotter::builder()
        .config(config)
        .auto_create_dirs(true)
        .build()?;

    let output = match args.command {
        Command::Video { id, details } => commands::video(&yotter, &id, details),
        Command::Channel {
            channel,
            videos,
            days,
        } => commands::channel(&yotter, &channel, videos, days),
        Command::Playlist { id, videos } => commands::playlist(&yotter, &id, videos),
        Command::Recent {
            channels,
            playlists,
            days,
            limit,
        } => commands::recent(&yotter, &channels, &playlists, days, limit),
        Command::PurgeCache => commands::purge_cache(&yotter)?,
        Command::CacheStats { maintain } => commands::cache_stats(&yotter, maintain)?,
        Command::Moderate {
            kind,
            id,
            list,
            remove,
        } => commands::moderate(&yotter, kind.into(), &id, list.into(), !remove)?,
        Command::ExportLists { path } => commands::export_lists(&yotter, &path)?,
        Command::ImportLists { path } => commands::import_lists(&yotter, &path)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

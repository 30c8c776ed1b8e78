//! Printvault CLI - imports 3D print files into a local catalog.
//!
//! Thin front end over `printvault-core`: opens the library under a root
//! directory, runs the background import queue and reports progress.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use printvault_core::config::AppConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "printvault")]
#[command(about = "Content-addressed catalog for STL, OBJ and G-code files")]
struct Args {
    /// Library root directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import files or directories into the catalog
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Delete each source once it is committed to the blob store
        #[arg(long = "move")]
        move_sources: bool,
    },
    /// Show catalog and blob store totals
    Stats,
    /// Remove temp files left behind by an interrupted import
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG wins unless --debug was given
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let root = args.root.unwrap_or_else(default_root);
    info!("Library root: {}", root.display());

    match args.command {
        Command::Import {
            paths,
            move_sources,
        } => commands::import(&root, &paths, move_sources).await,
        Command::Stats => commands::stats(&root),
        Command::Cleanup => commands::cleanup(&root),
    }
}

fn default_root() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(AppConfig::APP_NAME))
        .unwrap_or_else(|| PathBuf::from(AppConfig::APP_NAME))
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, ExerciseCommand, SyncCommand};
use liftlog::config::Config;
use liftlog::open_catalog;
use liftlog::sync::try_startup_sync;

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(version)]
#[command(about = "Exercise catalog with offline search and server sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search and manage exercise names
    Exercise(ExerciseCommand),

    /// Sync custom exercises with the server
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liftlog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Exercise(cmd)) => {
            let store = open_catalog(&config).await?;
            try_startup_sync(&store, &config).await;
            cmd.run(&store).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let store = open_catalog(&config).await?;
            cmd.run(&store, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

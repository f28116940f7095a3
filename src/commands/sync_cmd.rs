//! Sync CLI commands for reconciling custom exercises with the server.

use clap::{Args, Subcommand};

use liftlog::config::Config;
use liftlog::db::ExerciseStore;
use liftlog::sync::{last_synced_at, SyncEngine, SyncOutcome};
use liftlog::HttpRemote;

/// Sync with remote server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show remote configuration and pending changes
    Status,
}

impl SyncCommand {
    pub async fn run(
        &self,
        store: &ExerciseStore,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(store, config).await,
            Some(SyncSubcommand::Status) => self.status(store, config).await,
        }
    }

    async fn sync(
        &self,
        store: &ExerciseStore,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let remote = HttpRemote::from_config(&config.remote)?;
        let engine = SyncEngine::new(store.clone(), remote)
            .with_push_concurrency(config.sync.push_concurrency);

        println!("Syncing with server...");

        match engine.run_sync().await? {
            SyncOutcome::Completed(report) => {
                println!("  {}", report);
                println!();
                if report.is_clean() {
                    println!("Sync complete.");
                } else {
                    println!("Sync incomplete; pending changes will be retried next time.");
                }
            }
            SyncOutcome::AlreadyRunning => println!("A sync is already in progress."),
        }

        Ok(())
    }

    async fn status(
        &self,
        store: &ExerciseStore,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Status");
        println!("===========");
        println!();

        let pending = store.count_pending_sync().await?;
        println!("Pending changes: {}", pending);
        match last_synced_at(store).await? {
            Some(at) => println!("Last sync:       {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last sync:       never"),
        }
        println!();

        if !config.remote.is_configured() {
            println!("Remote: Not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  remote:");
            println!("    api_url: \"https://api.example.com/api\"");
            println!("    access_token: \"your-access-token\"");
            println!();
            println!("Or set environment variables:");
            println!("  LIFTLOG_API_URL");
            println!("  LIFTLOG_ACCESS_TOKEN");
            return Ok(());
        }

        if let Some(url) = &config.remote.api_url {
            println!("Remote:          {}", url);
        }
        println!(
            "Startup sync:    {}",
            if config.sync.on_startup {
                "enabled"
            } else {
                "disabled"
            }
        );

        Ok(())
    }
}

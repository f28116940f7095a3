use std::io::{self, Write};

use clap::{Args, Subcommand};

use super::OutputFormat;
use liftlog::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        write_text(config, &mut io::stdout().lock())?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn write_text(config: &Config, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Configuration")?;
    writeln!(out, "=============\n")?;

    if let Some(path) = &config.config_file {
        writeln!(out, "Config file: {}", path.display())?;
    } else {
        writeln!(
            out,
            "Config file: {} (not found)",
            Config::default_config_path().display()
        )?;
    }
    writeln!(out)?;

    writeln!(out, "database_path: {}", config.database_path.value.display())?;
    writeln!(out, "  source: {}", config.database_path.source)?;
    writeln!(out)?;

    writeln!(
        out,
        "remote.api_url: {}",
        config.remote.api_url.as_deref().unwrap_or("(not set)")
    )?;
    writeln!(
        out,
        "remote.access_token: {}",
        if config.remote.access_token.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    )?;
    writeln!(out, "remote.timeout_secs: {}", config.remote.timeout_secs)?;
    writeln!(out, "sync.on_startup: {}", config.sync.on_startup)?;
    writeln!(out, "sync.push_concurrency: {}", config.sync.push_concurrency)?;
    writeln!(out, "search.strip_chars: {}", config.search.strip_chars)?;
    match config.search.limit {
        Some(limit) => writeln!(out, "search.limit: {}", limit)?,
        None => writeln!(out, "search.limit: (none)")?,
    }
    Ok(())
}

use clap::{Args, Subcommand};

use super::OutputFormat;
use liftlog::db::ExerciseStore;
use liftlog::MutationOutcome;

#[derive(Args)]
pub struct ExerciseCommand {
    #[command(subcommand)]
    pub command: ExerciseSubcommand,
}

#[derive(Subcommand)]
pub enum ExerciseSubcommand {
    /// Search exercises by name prefix (every word must match)
    Search {
        /// Search terms
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List exercises
    List {
        /// Only show custom exercises
        #[arg(long)]
        custom: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a custom exercise
    Add {
        /// Name of the exercise
        name: String,
    },

    /// Rename a custom exercise
    Rename {
        /// Current name
        old_name: String,

        /// New name
        new_name: String,
    },

    /// Delete a custom exercise
    Delete {
        /// Name of the exercise
        name: String,
    },

    /// Show custom exercises waiting to be synced
    Pending {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ExerciseCommand {
    pub async fn run(&self, store: &ExerciseStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ExerciseSubcommand::Search { query, format } => {
                let results = store.search(&query.join(" ")).await?;
                print_names(&results, format, "No matching exercises.")
            }
            ExerciseSubcommand::List { custom, format } => {
                let names = if *custom {
                    store.list_custom().await?
                } else {
                    store.list_all().await?
                };
                print_names(&names, format, "No exercises found.")
            }
            ExerciseSubcommand::Add { name } => {
                let name = name.trim();
                store.create_custom(name).await?;
                println!("Added exercise: {}", name);
                Ok(())
            }
            ExerciseSubcommand::Rename { old_name, new_name } => {
                let new_name = new_name.trim();
                store.rename(old_name, new_name).await?;
                println!("Renamed '{}' to '{}'", old_name, new_name);
                Ok(())
            }
            ExerciseSubcommand::Delete { name } => match store.soft_delete(name).await? {
                MutationOutcome::Unchanged => Err(format!("No custom exercise named '{}'", name).into()),
                _ => {
                    println!("Deleted exercise: {}", name);
                    Ok(())
                }
            },
            ExerciseSubcommand::Pending { format } => {
                let pending = store.list_pending_sync().await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&pending)?);
                    }
                    OutputFormat::Text => {
                        if pending.is_empty() {
                            println!("Everything is synced.");
                        }
                        for record in &pending {
                            let action = record
                                .pending_action()
                                .map(|a| a.to_string())
                                .unwrap_or_default();
                            println!("  {:<8} {}", action, record.name);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn print_names(
    names: &[String],
    format: &OutputFormat,
    empty_message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(names)?);
        }
        OutputFormat::Text => {
            if names.is_empty() {
                println!("{}", empty_message);
            }
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

mod config_cmd;
mod exercise;
mod sync_cmd;

use clap::ValueEnum;

pub use config_cmd::ConfigCommand;
pub use exercise::ExerciseCommand;
pub use sync_cmd::SyncCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

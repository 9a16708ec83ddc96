//! Main CLI application structure

use clap::Parser;
use std::path::PathBuf;

use crate::cli::commands::{init_db, serve, version, Commands};
use crate::cli::error::CliResult;

/// CommonGood - community bartering marketplace API
#[derive(Debug, Parser)]
#[command(name = "commongood")]
#[command(version = commongood::VERSION)]
#[command(about = "CommonGood community bartering marketplace API")]
#[command(long_about = "Runs the CommonGood REST API.\n\n\
                         Configuration is read from built-in defaults, then commongood.toml\n\
                         (or --config), then COMMONGOOD_* environment variables.\n\n\
                         Examples:\n\
                           commongood serve --port 5000\n\
                           COMMONGOOD_DATABASE__PATH=/var/lib/commongood.db commongood init-db")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, help = "Path to a commongood.toml configuration file")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn execute(self) -> CliResult<()> {
        commongood::init_logging();

        match self.command {
            Commands::Version(args) => version::execute_version(args).await,
            Commands::InitDb(args) => init_db::execute_init_db(self.config.as_deref(), args).await,
            Commands::Serve(args) => serve::execute_serve(self.config.as_deref(), args).await,
        }
    }
}

//! Command modules for CLI

pub mod init_db;
pub mod serve;
pub mod version;

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API until interrupted
    #[command(about = "Serve the CommonGood API over HTTP")]
    Serve(serve::ServeArgs),

    /// Create or migrate the database schema
    #[command(name = "init-db", about = "Create or migrate the database schema")]
    InitDb(init_db::InitDbArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version(version::VersionArgs),
}

//! Database initialisation command

use crate::cli::error::{CliError, CliResult};
use clap::Args;
use commongood::storage::Store;
use commongood::AppConfig;
use std::path::Path;
use tracing::info;

/// Create the database file and bring its schema up to date
#[derive(Debug, Args)]
pub struct InitDbArgs {}

pub async fn execute_init_db(config_path: Option<&Path>, _args: InitDbArgs) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    let path = &config.database.path;
    if path.as_os_str() == ":memory:" {
        return Err(CliError::Config(
            "database.path is ':memory:'; nothing to initialise".to_string(),
        ));
    }

    let store = Store::open(path)
        .await
        .map_err(|e| CliError::Service(e.into()))?;
    let version = store
        .schema_version()
        .await
        .map_err(|e| CliError::Service(e.into()))?;
    info!("Database {} at schema version {}", path.display(), version);
    println!("Initialised {} (schema version {})", path.display(), version);
    Ok(())
}

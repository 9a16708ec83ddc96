//! Serve command implementation

use crate::cli::error::{CliError, CliResult};
use clap::Args;
use commongood::{AppConfig, CommonGoodServer, CommonGoodService};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Serve the CommonGood API via HTTP
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host to bind to, overriding the configuration
    #[arg(long, help = "Host to bind the server to")]
    pub host: Option<String>,

    /// Port to bind to, overriding the configuration
    #[arg(long, help = "Port to bind the server to")]
    pub port: Option<u16>,
}

impl ServeArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

pub async fn execute_serve(config_path: Option<&Path>, args: ServeArgs) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    args.apply(&mut config);
    if config.database.path.as_os_str() == ":memory:" {
        info!("Using an in-memory database; data is lost on shutdown");
    }

    let service = Arc::new(CommonGoodService::new(config).await?);
    let server = CommonGoodServer::from_config(service)?;
    println!("CommonGood API listening on http://{}", server.addr());

    server.serve().await.map_err(CliError::from)
}

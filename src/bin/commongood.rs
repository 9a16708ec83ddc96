//! CommonGood API binary entry point

#[path = "../cli/mod.rs"]
mod cli;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion
            {
                let _ = e.print();
                std::process::exit(0);
            }
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = cli.execute().await {
        let code = e.exit_code();
        eprintln!("Error: {:#}", anyhow::Error::new(e));
        std::process::exit(code);
    }
}

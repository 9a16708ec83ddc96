//! Command line interface for the CommonGood API

#[allow(clippy::module_inception)]
pub mod cli;
pub mod commands;
pub mod error;

pub use cli::Cli;

#![cfg(not(tarpaulin_include))]

use clap::Parser;
use sheetgrid::app;
use sheetgrid::config::ServerConfig;

/// Main entry point for the web application
///
/// Reads the server configuration from flags and `SHEETGRID_*` environment
/// variables, then serves the editor until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    app::run(config).await
}

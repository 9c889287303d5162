#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod cli;
mod config;
mod db;
mod filter;
mod qualification;
mod utils;
mod web;

use config::Config;
use web::WebServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let config = Arc::new(Config::load(&args)?);
    utils::logging::init_tracing(&config.logging);
    info!("eco-site-analytics starting up");

    let db = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db.migrate().await?;

    let web_server = WebServer::new(config.clone(), db.clone()).await?;
    web_server.start().await?;

    info!("eco-site-analytics shutting down");
    Ok(())
}

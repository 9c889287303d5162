use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments. Every flag can also come from the environment,
/// which is how the dashboard is configured in production.
#[derive(Debug, Parser)]
#[command(name = "eco-site-analytics", version, about = "Read-only analytics dashboard for ecology site data")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long, env = "ECO_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Address to bind the web server to
    #[arg(long, env = "ECO_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Port to bind the web server to
    #[arg(long, env = "ECO_PORT")]
    pub port: Option<u16>,
}

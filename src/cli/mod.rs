//! CLI interface for scalp-hub
//!
//! Provides subcommands for:
//! - `serve`: Run the price hub, scalping controller and dashboard API
//! - `watch`: Follow a running hub's price stream
//! - `status`: Query a running server's bot status
//! - `config`: Print the effective configuration

mod serve;
mod status;
mod watch;

pub use serve::{credentials_from_env, ServeArgs};
pub use status::StatusArgs;
pub use watch::WatchArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scalp-hub")]
#[command(about = "Futures price feed hub and scalping bot backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP/WebSocket server
    Serve(ServeArgs),
    /// Log ticks from a running server's price stream
    Watch(WatchArgs),
    /// Show the bot status of a running server
    Status(StatusArgs),
    /// Show configuration
    Config,
}

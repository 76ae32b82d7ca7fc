//! CLI module for Fulcrum
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `serve` - Start the load balancer
//! - `status` - Show backend status from a running instance
//! - `config` - Configuration utilities (init, validate)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start with the default config file
//! fulcrum serve
//!
//! # Start with a different strategy
//! fulcrum serve -s least-connections
//!
//! # Show backend status from the admin listener
//! fulcrum status --admin http://127.0.0.1:9090
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod serve;
pub mod status;

pub use completions::handle_completions;
pub use config::{handle_config_init, handle_config_validate};
pub use status::handle_status;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Fulcrum - HTTP reverse-proxy load balancer
#[derive(Parser, Debug)]
#[command(
    name = "fulcrum",
    version,
    about = "HTTP reverse-proxy load balancer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the load balancer
    Serve(ServeArgs),

    /// Show backend status of a running instance
    Status(StatusArgs),

    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fulcrum.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "FULCRUM_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "FULCRUM_HOST")]
    pub host: Option<String>,

    /// Selection strategy (round-robin, weighted-round-robin,
    /// smooth-weighted-round-robin, least-connections, random)
    #[arg(short, long, env = "FULCRUM_STRATEGY")]
    pub strategy: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FULCRUM_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Disable health checks
    #[arg(long)]
    pub no_health_check: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Base URL of the admin listener
    #[arg(short, long, default_value = "http://127.0.0.1:9090")]
    pub admin: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),

    /// Check a configuration file without starting the server
    Validate(ConfigValidateArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "fulcrum.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigValidateArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fulcrum.toml")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

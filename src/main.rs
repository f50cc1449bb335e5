//! chardb - Command-line client for the character record database
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod config;
mod repl;

use chardb_client::Client;
use chardb_protocol::{Layout, DEFAULT_BIO};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chardb")]
#[command(about = "Command-line client for the character record database")]
#[command(version)]
struct Cli {
    /// Server host (overrides config file and CHARDB_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides config file and CHARDB_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a YAML config file
    #[arg(short, long, env = "CHARDB_CONFIG")]
    config: Option<PathBuf>,

    /// Record layout spoken by the server: classic or portrait
    #[arg(long)]
    layout: Option<Layout>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// Command-line flags take precedence over file and environment values.
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start interactive REPL
    Repl,

    /// List all records
    List,

    /// Get a record by id
    Get {
        /// Record id
        id: i32,
    },

    /// Create a record (the server assigns its id)
    Add(RecordArgs),

    /// Update fields of an existing record
    Update {
        /// Record id
        id: i32,

        #[command(flatten)]
        changes: UpdateArgs,
    },

    /// Remove a record by id
    Remove {
        /// Record id
        id: i32,
    },
}

/// Fields of a new record.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct RecordArgs {
    /// First name
    #[arg(short, long)]
    pub name: String,

    /// Last name
    #[arg(short, long)]
    pub surname: String,

    /// Age in years
    #[arg(short, long)]
    pub age: u8,

    /// Free-form biography
    #[arg(short, long, default_value = DEFAULT_BIO)]
    pub bio: String,

    /// Image file to attach (portrait layout only)
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

/// Fields to change on an existing record. Unset fields keep their value.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct UpdateArgs {
    /// First name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Last name
    #[arg(short, long)]
    pub surname: Option<String>,

    /// Age in years
    #[arg(short, long)]
    pub age: Option<u8>,

    /// Free-form biography
    #[arg(short, long)]
    pub bio: Option<String>,

    /// Image file to attach (portrait layout only)
    #[arg(short, long)]
    pub image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Defaults < config file < environment < flags
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };
    cli.apply(&mut config);
    tracing::debug!("Using configuration: {:?}", config);

    let mut client = Client::new(config.connection_config());

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client, &config, cli.json).await?;
        }
        Some(cmd) => {
            if let Err(e) = client.connect(&config.host).await {
                eprintln!(
                    "{} to {}:{}: {}",
                    "Connection failed".red(),
                    config.host,
                    config.port,
                    e
                );
                std::process::exit(1);
            }

            let result = commands::execute(&mut client, cmd, cli.json).await;
            let _ = client.close().await;

            match result {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

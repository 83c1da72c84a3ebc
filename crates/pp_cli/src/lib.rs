//! `pp_cli` - CLI commands for Procure Pulse
//!
//! This crate provides:
//! - clap-based command definitions
//! - `serve`: run the HTTP API server
//! - `ingest`: load CSV report files into the store
//! - `user create`: provision accounts without going through the API
//! - `snapshots`: list ingested snapshot months

use clap::{Parser, Subcommand};
use pp_config::PpConfig;
use pp_store::{NewUser, PpStore, Role};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Config error: {0}")]
    ConfigError(#[from] pp_config::ConfigError),

    #[error("Store error: {0}")]
    StoreError(#[from] pp_store::StoreError),

    #[error("Ingest error: {0}")]
    IngestError(#[from] pp_ingest::IngestError),

    #[error("Auth error: {0}")]
    AuthError(#[from] pp_auth::AuthError),

    #[error("Web error: {0}")]
    WebError(#[from] pp_web::WebError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Main CLI application
#[derive(Parser, Debug)]
#[command(name = "pp")]
#[command(
    author,
    version,
    about = "Procure Pulse - contract compliance KPI dashboard"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve,

    /// Ingest CSV report files into the store
    Ingest {
        /// Directory containing the report files (defaults to the configured
        /// ingest directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Account management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// List ingested snapshot months
    Snapshots,
}

/// Account subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create an account
    Create {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email (stored lowercase, must be unique)
        #[arg(long)]
        email: String,

        /// Password (hashed before storage)
        #[arg(long)]
        password: String,

        /// Role: user, team_leader, director, or admin
        #[arg(long, default_value = "user")]
        role: String,

        /// Personnel record to link the account to
        #[arg(long)]
        personnel_id: Option<String>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<PpConfig, CliError> {
        let config = match &self.config {
            Some(path) => PpConfig::load_with_env(path)?,
            None => PpConfig::discover_with_env()?,
        };
        Ok(config)
    }

    fn open_store(config: &PpConfig) -> Result<PpStore, CliError> {
        Ok(PpStore::open(&config.global.db_path)?)
    }

    /// Execute the parsed command
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] when configuration, storage, or the command
    /// itself fails.
    pub async fn run(self) -> Result<(), CliError> {
        let config = self.load_config()?;

        match self.command {
            Commands::Serve => {
                let store = Self::open_store(&config)?;
                let server = pp_web::WebServer::new(store, &config)?;
                server.run().await?;
                Ok(())
            }
            Commands::Ingest { dir } => {
                let store = Self::open_store(&config)?;
                let dir = dir.unwrap_or_else(|| config.ingest.csv_dir.clone());
                info!(dir = %dir.display(), "Ingesting report files");
                let report = pp_ingest::run(&store, &dir)?;
                println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
                Ok(())
            }
            Commands::User { command } => match command {
                UserCommands::Create {
                    name,
                    email,
                    password,
                    role,
                    personnel_id,
                } => {
                    let role: Role = role
                        .parse()
                        .map_err(|e: String| CliError::CommandFailed(e))?;
                    let store = Self::open_store(&config)?;
                    let password_hash = pp_auth::hash_password(&password)?;
                    let user = store.create_user(&NewUser {
                        name,
                        email,
                        password_hash,
                        role,
                        personnel_id,
                    })?;
                    println!(
                        "Created account {} ({}) with role {}",
                        user.user_id,
                        user.email,
                        user.role.as_str()
                    );
                    Ok(())
                }
            },
            Commands::Snapshots => {
                let store = Self::open_store(&config)?;
                let snapshots = store.list_snapshots()?;
                if snapshots.is_empty() {
                    println!("No snapshots ingested yet");
                } else {
                    for snapshot in snapshots {
                        println!("{snapshot}");
                    }
                }
                Ok(())
            }
        }
    }
}

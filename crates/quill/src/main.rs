//! Quill CLI - notes backend with token authentication.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quill_core::{NewUser, QuillService};
use quill_server::AppState;
use quill_sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "quill", about = "Notes backend with token authentication", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Address to listen on
        #[arg(long, env = "QUILL_ADDR", default_value = "127.0.0.1:8080")]
        addr: String,
        /// Path to the SQLite database file
        #[arg(long, env = "QUILL_DB", default_value = "quill.sqlite")]
        db: PathBuf,
        /// Bearer token lifetime in hours
        #[arg(long, env = "QUILL_TOKEN_TTL_HOURS", default_value = "168")]
        token_ttl_hours: i64,
    },
    /// Create a user account from the command line
    Register {
        /// Path to the SQLite database file
        #[arg(long, env = "QUILL_DB", default_value = "quill.sqlite")]
        db: PathBuf,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            addr,
            db,
            token_ttl_hours,
        } => {
            let store = SqliteStore::open(&db)
                .with_context(|| format!("failed to open database at {}", db.display()))?;
            let service = QuillService::new(store)
                .with_token_ttl(chrono::Duration::hours(token_ttl_hours));
            let state = Arc::new(AppState { service });

            quill_server::serve(&addr, state)
                .await
                .map_err(|e| anyhow::anyhow!("server error: {e}"))?;
        }

        Commands::Register {
            db,
            username,
            password,
            full_name,
        } => {
            let store = SqliteStore::open(&db)
                .with_context(|| format!("failed to open database at {}", db.display()))?;
            let service = QuillService::new(store);

            let profile = service
                .register(NewUser {
                    username: Some(username),
                    password: Some(password),
                    full_name,
                })
                .await
                .context("failed to register user")?;
            println!("Registered user {} ({})", profile.username, profile.id);
        }
    }

    Ok(())
}

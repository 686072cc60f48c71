//! sessionkit - command-line front end for the session layer.
//!
//! Logs in against the authentication server, keeps the issued tokens in
//! the configured store, and sends authenticated requests that refresh
//! an expired access token transparently.

mod app;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use sessionkit_core::{Config, TokenStoreKind};

#[derive(Parser)]
#[command(name = "sessionkit")]
#[command(author, version, about = "Session and authenticated-request client", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Authentication server URL (or set SESSIONKIT_BASE_URL env var)
    #[arg(long, env = "SESSIONKIT_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Token storage backend: file, keyring or memory
    #[arg(long, global = true)]
    store: Option<TokenStoreKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the issued tokens
    Login {
        /// Username (or set SESSIONKIT_USERNAME); prompted when absent
        #[arg(long, short)]
        username: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(long, short)]
        username: Option<String>,
    },

    /// End the session and clear stored tokens
    Logout,

    /// Restore the stored session and show the current user
    Whoami,

    /// Show local session status without contacting the server
    Status,

    /// Check whether a view path is accessible with the current session
    Route {
        path: String,
    },

    /// Send an authenticated GET request and print the response body
    Get {
        /// Path relative to the server URL, or an absolute URL
        path: String,
    },

    /// Show the server's live data dashboard
    Live,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            let mut c = Config::default();
            c.apply_env();
            c
        }
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(store) = cli.store {
        config.token_store = store;
    }

    info!(base_url = %config.base_url, "sessionkit starting");
    let mut app = App::new(config)?;

    match cli.command {
        Commands::Login { username } => app.login(username).await,
        Commands::Register { username } => app.register(username).await,
        Commands::Logout => app.logout().await,
        Commands::Whoami => app.whoami().await,
        Commands::Status => app.status(),
        Commands::Route { path } => app.route(&path),
        Commands::Get { path } => app.get(&path).await,
        Commands::Live => app.live().await,
    }
}

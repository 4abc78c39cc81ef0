//! Shopfront CLI - Database migrations and housekeeping tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! shop-cli migrate
//!
//! # Bootstrap the first admin
//! shop-cli admin create -e admin@example.com -n "Admin Name" -p 's3cret!'
//!
//! # Load categories and products
//! shop-cli seed catalog.yaml
//!
//! # Delete expired session tokens (for cron)
//! shop-cli tokens sweep
//! ```
//!
//! All commands read the same environment as the server (see
//! `shopfront_server::config`), including a `.env` file if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shop-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed categories and products from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
    /// Session token housekeeping
    Tokens {
        #[command(subcommand)]
        action: TokensAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin password (at least 6 characters)
        #[arg(short, long)]
        password: String,

        /// Create the admin even if other admins already exist
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum TokensAction {
    /// Delete every expired session token once
    Sweep,
}

#[tokio::main]
async fn main() {
    // Load .env before tracing so RUST_LOG from the file applies
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
                force,
            } => {
                commands::admin::create(&email, &name, &password, force).await?;
            }
        },
        Commands::Seed { file } => commands::seed::catalog(&file).await?,
        Commands::Tokens { action } => match action {
            TokensAction::Sweep => commands::tokens::sweep().await?,
        },
    }
    Ok(())
}

//! Kramnytsia CLI - database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! kr-cli migrate
//!
//! # Load the shipping settings table
//! kr-cli seed shipping-rates -f rates.yaml
//!
//! # Same, deleting countries missing from the file
//! kr-cli seed shipping-rates -f rates.yaml --replace
//!
//! # Let a customer check out without the verification email
//! kr-cli user verify-email -e buyer@example.ua
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kr-cli")]
#[command(author, version, about = "Kramnytsia CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage storefront accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert shipping rates from a YAML file
    ShippingRates {
        /// Path to the YAML file
        #[arg(short, long)]
        file: String,

        /// Delete rows for countries not listed in the file
        #[arg(long)]
        replace: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Mark a user's email address as verified
    VerifyEmail {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Seed { target } => match target {
            SeedTarget::ShippingRates { file, replace } => {
                commands::seed::shipping_rates(&file, replace).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::VerifyEmail { email } => commands::user::verify_email(&email).await?,
        },
    }
    Ok(())
}

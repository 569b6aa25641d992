//! NovaTech CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! nova-cli migrate
//!
//! # Delete every account with its carts, orders and reviews
//! nova-cli reset-users --yes
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nova-cli")]
#[command(author, version, about = "NovaTech CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Delete all users and everything they own, and reset product ratings
    ResetUsers {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
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
        Commands::ResetUsers { yes } => commands::reset::run(yes).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["nova-cli", "migrate"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Commands::Migrate));

        let cli = Cli::try_parse_from(["nova-cli", "reset-users", "--yes"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Commands::ResetUsers { yes: true }));

        let cli =
            Cli::try_parse_from(["nova-cli", "reset-users"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Commands::ResetUsers { yes: false }));
    }
}

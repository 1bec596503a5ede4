//! Leaderboard command-line interface
//!
//! Usage:
//!   board standings            - Print the standings table
//!   board players              - List players that can be recorded as losers
//!   board win --loser <id>     - Record a win over another player
//!   board set-name <name>      - Set your first name
//!   board sign-up              - Create an account
//!   board watch                - Follow the standings until interrupted
//!
//! Backend settings come from `LEADERBOARD_*` environment variables.

use clap::{Parser, Subcommand};
use reconciler::Config;
use types::session::Credentials;

mod commands;

#[derive(Parser)]
#[command(name = "board")]
#[command(about = "Win/loss leaderboard CLI")]
#[command(version)]
struct Cli {
    /// Account email
    #[arg(short, long, env = "LEADERBOARD_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(short, long, env = "LEADERBOARD_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials::new(email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the standings table
    Standings,

    /// List players that can be recorded as losers
    Players,

    /// Record a win over another player
    Win {
        /// Identity of the losing player
        #[arg(short, long)]
        loser: String,
    },

    /// Set your first name
    SetName {
        /// First name (letters, digits and space)
        name: String,
    },

    /// Create an account
    SignUp,

    /// Follow the standings until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(url = %config.backend.url, "Using backend");

    let credentials = cli.credentials();
    match cli.command {
        Commands::Standings => commands::standings(&config, credentials).await,
        Commands::Players => commands::players(&config, credentials).await,
        Commands::Win { loser } => commands::win(&config, credentials, loser).await,
        Commands::SetName { name } => commands::set_name(&config, credentials, name).await,
        Commands::SignUp => commands::sign_up(&config, credentials).await,
        Commands::Watch => commands::watch(&config, credentials).await,
    }
}

//! voxagent CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Interactive chat or single-message mode
//! - `config` : Show, locate, validate or initialize configuration
//! - `doctor` : Diagnose configuration and model reachability

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "voxagent",
    about = "voxagent - a tool-using conversational assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Session to continue (history is kept per session)
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print the whole reply at once instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed replies on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            session,
            message,
            no_stream,
        } => commands::chat::run(session, message, !no_stream).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

//! FlowChat - conversation session orchestrator
//!
#![doc = "FlowChat - conversation session orchestrator"]
#![doc = "Main entry point for the FlowChat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flowchat::cli::{Cli, Commands, SessionCommand};
use flowchat::commands;
use flowchat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Serve { port } => {
            tracing::info!("Starting HTTP API");
            commands::serve::run_serve(config, port).await?;
            Ok(())
        }
        Commands::Chat { owner, resume } => {
            tracing::info!("Starting interactive chat mode");
            if let Some(r) = &resume {
                tracing::debug!("Resuming session: {}", r);
            }
            commands::chat::run_chat(config, owner, resume).await?;
            Ok(())
        }
        Commands::Sessions { command } => match command {
            SessionCommand::List { owner } => {
                commands::sessions::list_sessions(config, &owner).await?;
                Ok(())
            }
            SessionCommand::Delete { id, owner } => {
                commands::sessions::delete_session(config, &owner, &id).await?;
                Ok(())
            }
        },
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "flowchat=debug"
    } else {
        "flowchat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

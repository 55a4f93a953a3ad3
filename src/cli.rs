//! Command-line interface definition for FlowChat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for the HTTP server, interactive chat, and
//! session management.

use clap::{Parser, Subcommand};

/// FlowChat - conversation session orchestrator
///
/// Hold multi-turn conversations with an AI workflow engine, with every
/// session and message durably persisted and resumable.
#[derive(Parser, Debug, Clone)]
#[command(name = "flowchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Override the workflow engine run endpoint
    #[arg(long, env = "FLOWCHAT_ENGINE_URL")]
    pub engine_url: Option<String>,

    /// Use the in-process store instead of the remote one
    #[arg(long)]
    pub ephemeral: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for FlowChat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the inbound HTTP API
    Serve {
        /// Override the bind port from config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive terminal chat
    Chat {
        /// Owner identity for sessions created in this chat
        #[arg(short, long, default_value = "local")]
        owner: String,

        /// Resume an existing session by id
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Manage persisted sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions for an owner, newest first
    List {
        /// Owner identity to list sessions for
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Delete a session and all of its messages
    Delete {
        /// Session id to delete
        id: String,

        /// Owner identity the session must belong to
        #[arg(short, long, default_value = "local")]
        owner: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["flowchat", "serve", "--port", "9090"]);
        match cli.command {
            Commands::Serve { port } => assert_eq!(port, Some(9090)),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_parse_chat_with_resume() {
        let cli = Cli::parse_from(["flowchat", "chat", "--owner", "alice", "--resume", "s-1"]);
        match cli.command {
            Commands::Chat { owner, resume } => {
                assert_eq!(owner, "alice");
                assert_eq!(resume.as_deref(), Some("s-1"));
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn test_parse_sessions_list_default_owner() {
        let cli = Cli::parse_from(["flowchat", "sessions", "list"]);
        match cli.command {
            Commands::Sessions {
                command: SessionCommand::List { owner },
            } => assert_eq!(owner, "local"),
            _ => panic!("expected sessions list command"),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["flowchat", "--ephemeral", "--verbose", "serve"]);
        assert!(cli.ephemeral);
        assert!(cli.verbose);
    }
}

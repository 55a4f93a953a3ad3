//! Interactive chat mode handler
//!
//! Runs a readline-based loop that drives the orchestrator: plain input is
//! sent as a turn, slash commands manage sessions. The sidebar of the
//! browser client maps to `/sessions` and `/select` here.

use crate::config::Config;
use crate::error::{FlowchatError, OrchestratorError, Result, StoreError};
use crate::orchestrator::SessionOrchestrator;
use crate::store::Session;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Loaded application configuration
/// * `owner` - Identity that owns sessions created in this chat
/// * `resume` - Optional session id to resume instead of starting fresh
pub async fn run_chat(config: Config, owner: String, resume: Option<String>) -> Result<()> {
    let orchestrator = super::build_orchestrator(&config)?;

    print_welcome_banner(&owner);

    // A cached session listing so /select and /delete accept list indexes.
    let mut listing: Vec<Session> = Vec::new();

    if let Some(session_id) = resume {
        owned_session(&orchestrator, &owner, &session_id).await?;
        replay_session(&orchestrator, &session_id).await?;
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                match trimmed {
                    "/exit" | "/quit" => break,
                    "/help" => {
                        print_help();
                        continue;
                    }
                    "/new" => {
                        let session = orchestrator.new_session(&owner).await?;
                        println!("Started {} ({})\n", session.title.bold(), session.id);
                        continue;
                    }
                    "/sessions" => {
                        listing = orchestrator.list_sessions(&owner).await?;
                        print_session_list(&listing, orchestrator.active_session().as_deref());
                        continue;
                    }
                    _ => {}
                }

                if let Some(target) = trimmed.strip_prefix("/select ") {
                    match resolve_session(&listing, target) {
                        Some(session_id) => {
                            match owned_session(&orchestrator, &owner, &session_id).await {
                                Ok(_) => replay_session(&orchestrator, &session_id).await?,
                                Err(e) => println!("{} {}", "Cannot select:".red(), e),
                            }
                        }
                        None => println!("{}", "No such session; try /sessions first".red()),
                    }
                    continue;
                }

                if let Some(target) = trimmed.strip_prefix("/delete ") {
                    match resolve_session(&listing, target) {
                        Some(session_id) => {
                            match owned_session(&orchestrator, &owner, &session_id).await {
                                Ok(_) => match orchestrator.delete_session(&session_id).await {
                                    Ok(()) => println!("Deleted {}\n", session_id),
                                    Err(e) => println!("{} {}", "Delete failed:".red(), e),
                                },
                                Err(e) => println!("{} {}", "Delete failed:".red(), e),
                            }
                        }
                        None => println!("{}", "No such session; try /sessions first".red()),
                    }
                    continue;
                }

                if trimmed.starts_with('/') {
                    println!("Unknown command {}; try /help", trimmed);
                    continue;
                }

                send_turn(&orchestrator, &owner, trimmed).await;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                tracing::error!("Readline error: {}", e);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Send one turn and print the outcome
async fn send_turn(orchestrator: &Arc<SessionOrchestrator>, owner: &str, text: &str) {
    match orchestrator.send(owner, text).await {
        Ok(outcome) => {
            println!("{} {}\n", "ai>".cyan().bold(), outcome.reply);
            if let Some(title) = outcome.title {
                println!("{} {}\n", "Session titled:".dimmed(), title.dimmed());
            }
            if let Some(failure) = outcome.persist_error {
                println!(
                    "{} {}\n",
                    "Warning: reply shown but not fully saved:".yellow(),
                    failure.yellow()
                );
            }
        }
        Err(FlowchatError::Orchestrator(OrchestratorError::Busy(_))) => {
            println!("{}\n", "Still waiting on the previous reply".yellow());
        }
        Err(e) => {
            println!("{} {}\n", "Send failed:".red(), e);
        }
    }
}

/// Load a session's history into the view and print it
async fn replay_session(orchestrator: &Arc<SessionOrchestrator>, session_id: &str) -> Result<()> {
    let replay = orchestrator.select_session(session_id).await?;
    println!("Resumed session {} ({} messages)\n", session_id, replay.len());
    for message in replay {
        let label = match message.sender {
            crate::store::Sender::User => "you>".bold(),
            crate::store::Sender::Ai => "ai>".cyan().bold(),
        };
        println!("{} {}", label, message.content);
    }
    println!();
    Ok(())
}

/// Fetch a session, refusing when it belongs to a different owner
///
/// Every session-mutating REPL command goes through this, so a raw id
/// pasted into `/select` or `/delete` can only ever reach the caller's
/// own sessions.
async fn owned_session(
    orchestrator: &Arc<SessionOrchestrator>,
    owner: &str,
    session_id: &str,
) -> Result<Session> {
    let session = orchestrator.get_session(session_id).await?;
    if session.owner != owner {
        return Err(StoreError::Unauthorized.into());
    }
    Ok(session)
}

/// Accept either a 1-based index into the cached listing or a raw id
fn resolve_session(listing: &[Session], target: &str) -> Option<String> {
    if let Ok(index) = target.trim().parse::<usize>() {
        return listing.get(index.checked_sub(1)?).map(|s| s.id.clone());
    }
    let target = target.trim();
    listing
        .iter()
        .find(|s| s.id == target)
        .map(|s| s.id.clone())
        .or_else(|| (!target.is_empty()).then(|| target.to_string()))
}

fn print_session_list(listing: &[Session], active: Option<&str>) {
    if listing.is_empty() {
        println!("No sessions yet; say something or use /new\n");
        return;
    }
    for (i, session) in listing.iter().enumerate() {
        let marker = if Some(session.id.as_str()) == active {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:>2}. {} — {} ({})",
            marker,
            i + 1,
            session.title.bold(),
            session.last_message_preview,
            session.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
}

fn print_welcome_banner(owner: &str) {
    println!("{}", "FlowChat".bold());
    println!("Chatting as {}. Type /help for commands.\n", owner.bold());
}

fn print_help() {
    println!("Commands:");
    println!("  /new           start a new session");
    println!("  /sessions      list your sessions, newest first");
    println!("  /select <n|id> resume a session from the list");
    println!("  /delete <n|id> delete a session and its messages");
    println!("  /exit          leave chat");
    println!("Anything else is sent to the assistant.\n");
}

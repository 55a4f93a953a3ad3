//! Session management command handlers

use crate::config::Config;
use crate::error::Result;
use prettytable::{row, Table};

/// List an owner's sessions, newest first
pub async fn list_sessions(config: Config, owner: &str) -> Result<()> {
    let orchestrator = super::build_orchestrator(&config)?;
    let sessions = orchestrator.list_sessions(owner).await?;

    if sessions.is_empty() {
        println!("No sessions for {}", owner);
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["Id", "Title", "Last Message", "Updated"]);
    for session in &sessions {
        table.add_row(row![
            session.id,
            session.title,
            session.last_message_preview,
            session.updated_at.format("%Y-%m-%d %H:%M:%S")
        ]);
    }

    println!("\nSessions for {}:\n", owner);
    table.printstd();
    println!();
    Ok(())
}

/// Delete a session and all of its messages
///
/// Refuses when the session belongs to a different owner.
pub async fn delete_session(config: Config, owner: &str, session_id: &str) -> Result<()> {
    let orchestrator = super::build_orchestrator(&config)?;

    let session = orchestrator.get_session(session_id).await?;
    if session.owner != owner {
        return Err(crate::error::StoreError::Unauthorized.into());
    }

    orchestrator.delete_session(session_id).await?;
    println!("Deleted session {} ({})", session_id, session.title);
    Ok(())
}

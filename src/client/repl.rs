//! Terminal front-end
//!
//! Each stdin line is one submission. A listener task prints every appended
//! turn and a busy line while a submission is in flight.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::conversation::{Role, Turn};

use super::{ChatSession, InputRejected, SubmissionState};

const BUSY_LINE: &str = "   AI is thinking...";

/// Format a turn for the terminal
pub fn render_turn(turn: &Turn) -> String {
    let label = match turn.role {
        Role::User => "U ",
        Role::Assistant => "AI",
    };

    let mut lines = turn.content.lines();
    let mut out = format!("[{}] {}", label, lines.next().unwrap_or_default());
    for line in lines {
        out.push_str("\n     ");
        out.push_str(line);
    }
    out
}

/// Read lines from stdin until EOF, submitting each one.
///
/// Takes the session by value so the renderer can finish printing once input
/// ends.
pub async fn run(session: ChatSession) -> anyhow::Result<()> {
    let mut appended = session.subscribe();
    let mut state = session.watch_state();

    let renderer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                turn = appended.recv() => match turn {
                    Ok(turn) => println!("{}", render_turn(&turn)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Renderer fell behind");
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *state.borrow_and_update() == SubmissionState::Submitting {
                        println!("{}", BUSY_LINE);
                    }
                }
            }
        }
    });

    tracing::info!(conversation = %session.conversation_id(), "Chat started");
    println!("Type a message and press Enter. Ctrl-D quits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        session.set_input(line);
        match session.submit_input().await {
            Ok(_) | Err(InputRejected::Blank) => {}
            Err(InputRejected::Busy) => tracing::debug!("Dropped input while busy"),
        }
    }

    tracing::info!(turns = session.turns().len(), "Chat ended");

    // Dropping the session closes both channels once the renderer has drained them
    drop(session);
    renderer.await?;
    Ok(())
}

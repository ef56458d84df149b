//! Conversation state machine for the chat front-end
//!
//! [`ChatSession`] owns one [`Conversation`] and the submission lifecycle.
//! A submission appends the user's turn, flips to `Submitting`, sends the whole
//! conversation through a [`Transport`] and then appends either the reply or a
//! generic failure turn before flipping back to `Idle`. Submissions made while
//! another is in flight are dropped, so there is never more than one request
//! per conversation.

mod repl;
mod transport;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::conversation::{Conversation, Turn};

pub use repl::run as run_repl;
pub use transport::{HttpTransport, Transport, TransportError};

/// Content of the turn appended when a submission fails for any reason
pub const FAILURE_MESSAGE: &str = "Sorry, I encountered an error processing your request.";

/// Submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
}

/// Why a submission was dropped without touching the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputRejected {
    #[error("input is blank")]
    Blank,

    #[error("a submission is already in flight")]
    Busy,
}

struct Inner {
    conversation: Conversation,
    state: SubmissionState,
    input: String,
}

/// Client-side conversation with its submission lifecycle
pub struct ChatSession {
    transport: Arc<dyn Transport>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SubmissionState>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (state_tx, _) = watch::channel(SubmissionState::Idle);
        Self {
            transport,
            inner: Mutex::new(Inner {
                conversation: Conversation::new(),
                state: SubmissionState::Idle,
                input: String::new(),
            }),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn conversation_id(&self) -> Uuid {
        self.lock().conversation.id()
    }

    /// Snapshot of the conversation so far
    pub fn turns(&self) -> Vec<Turn> {
        self.lock().conversation.turns().to_vec()
    }

    #[cfg(test)]
    pub fn state(&self) -> SubmissionState {
        self.lock().state
    }

    /// Whether the busy indicator should be shown
    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.state() == SubmissionState::Submitting
    }

    /// Receive every turn appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Turn> {
        self.lock().conversation.subscribe()
    }

    /// Watch the submission lifecycle
    pub fn watch_state(&self) -> watch::Receiver<SubmissionState> {
        self.state_tx.subscribe()
    }

    /// Replace the pending input buffer
    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    /// Submit whatever is in the pending input buffer
    pub async fn submit_input(&self) -> Result<Turn, InputRejected> {
        let text = self.input();
        self.submit(&text).await
    }

    /// Submit a user message and wait for the reply.
    ///
    /// Returns the turn appended once the call settles: the assistant's reply,
    /// or the generic failure turn. Blank text, or text submitted while
    /// another submission is in flight, is rejected without any effect.
    pub async fn submit(&self, text: &str) -> Result<Turn, InputRejected> {
        let (conversation_id, payload) = self.begin(text)?;

        tracing::debug!(
            conversation = %conversation_id,
            turns = payload.len(),
            "Submitting conversation"
        );

        let result = self.transport.send(&payload).await;
        Ok(self.settle(conversation_id, result))
    }

    /// Idle -> Submitting. Appends the user turn and returns the payload to send.
    fn begin(&self, text: &str) -> Result<(Uuid, Vec<Turn>), InputRejected> {
        if text.trim().is_empty() {
            return Err(InputRejected::Blank);
        }

        let mut inner = self.lock();
        if inner.state == SubmissionState::Submitting {
            return Err(InputRejected::Busy);
        }

        inner.conversation.push(Turn::user(text));
        inner.input.clear();
        inner.state = SubmissionState::Submitting;
        self.state_tx.send_replace(SubmissionState::Submitting);

        Ok((inner.conversation.id(), inner.conversation.turns().to_vec()))
    }

    /// Submitting -> Idle. Appends the reply, or the failure turn.
    fn settle(&self, conversation_id: Uuid, result: Result<Turn, TransportError>) -> Turn {
        let turn = match result {
            Ok(turn) => turn,
            Err(e) => {
                tracing::error!(
                    conversation = %conversation_id,
                    error = %e,
                    "Chat request failed"
                );
                Turn::assistant(FAILURE_MESSAGE)
            }
        };

        let mut inner = self.lock();
        inner.conversation.push(turn.clone());
        inner.state = SubmissionState::Idle;
        self.state_tx.send_replace(SubmissionState::Idle);

        turn
    }
}

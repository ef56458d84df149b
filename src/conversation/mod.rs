//! Conversation types and state management
//!
//! A [`Conversation`] is an append-only, observable list of [`Turn`]s. Nothing
//! removes or edits a turn once it has been pushed; listeners subscribe to be
//! told about every append.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the append notification channel. Slow listeners that fall this
/// far behind see a `Lagged` error and can resync from [`Conversation::turns`].
const EVENT_CAPACITY: usize = 64;

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Turn {
    /// A user-authored turn. User turns carry no identifier.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            id: None,
        }
    }

    /// An assistant-authored turn with a freshly generated identifier
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            id: Some(new_turn_id()),
        }
    }
}

/// Author of a turn. Any role name other than `user` reads as `assistant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(other)]
    Assistant,
}

/// Generate an opaque identifier for a new turn
pub fn new_turn_id() -> String {
    Uuid::new_v4().to_string()
}

/// Ordered, append-only sequence of turns
#[derive(Debug)]
pub struct Conversation {
    id: Uuid,
    turns: Vec<Turn>,
    events: broadcast::Sender<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append a turn and notify every subscriber
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn.clone());
        // No subscribers is fine
        let _ = self.events.send(turn);
    }

    /// Receive every turn appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Turn> {
        self.events.subscribe()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

//! Turn translation adapter
//!
//! Converts a conversation into a provider chat session and the provider's
//! reply back into a [`Turn`]:
//! 1. Validate the turn list
//! 2. Map every role to the provider's role tag
//! 3. Seed a session with all turns but the last
//! 4. Send the last turn's text and wait for the whole reply
//! 5. Wrap the reply as a new assistant turn
//!
//! The adapter keeps nothing between calls; each call rebuilds the session
//! from the turns it is given.

use std::sync::Arc;

use crate::conversation::{Role, Turn};
use crate::providers::{ChatProvider, GenerationConfig, ProviderError, ProviderRole, ProviderTurn};

/// Generation parameters applied to every provider call
pub const GENERATION_CONFIG: GenerationConfig = GenerationConfig {
    max_output_tokens: 1000,
    temperature: 0.7,
    top_p: 0.8,
    top_k: 40,
};

/// Errors from the adapter
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Malformed request: {0}")]
    MalformedRequest(&'static str),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Provider role for a conversation role
pub fn provider_role(role: Role) -> ProviderRole {
    match role {
        Role::User => ProviderRole::User,
        Role::Assistant => ProviderRole::Model,
    }
}

/// Turns a conversation into a provider call
pub struct TurnAdapter {
    provider: Arc<dyn ChatProvider>,
}

impl TurnAdapter {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self { provider }
    }

    /// Produce the assistant reply to `turns`.
    ///
    /// The last turn is always treated as the new message, whatever its role;
    /// callers must put the user's message last.
    pub async fn respond(&self, turns: &[Turn]) -> Result<Turn, AdapterError> {
        let (outgoing, earlier) = turns
            .split_last()
            .ok_or(AdapterError::MalformedRequest("conversation is empty"))?;

        if outgoing.content.is_empty() {
            return Err(AdapterError::MalformedRequest("last turn has no content"));
        }

        let history = earlier
            .iter()
            .map(|turn| ProviderTurn {
                role: provider_role(turn.role),
                text: turn.content.clone(),
            })
            .collect();

        let mut session = self.provider.start_session(history, GENERATION_CONFIG);
        let reply = session.send(&outgoing.content).await?;

        Ok(Turn::assistant(reply))
    }
}

//! AI provider integrations
//!
//! A provider exposes chat sessions: a session is seeded with prior turns,
//! then accepts one outgoing message at a time and answers with the complete
//! reply text.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Authentication rejected (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Role tags understood by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    Model,
}

/// One history entry in provider-native shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTurn {
    pub role: ProviderRole,
    pub text: String,
}

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

/// A chat backend able to open sessions
pub trait ChatProvider: Send + Sync {
    /// Open a session whose prior context is `history`, oldest first
    fn start_session(
        &self,
        history: Vec<ProviderTurn>,
        generation: GenerationConfig,
    ) -> Box<dyn ProviderSession>;
}

/// A live chat session with a provider
#[async_trait]
pub trait ProviderSession: Send {
    /// Send a user message and wait for the complete reply text
    async fn send(&mut self, text: &str) -> Result<String, ProviderError>;
}

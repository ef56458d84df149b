//! Google Gemini provider
//!
//! Sessions are client-side: every send posts the whole history plus the new
//! user message to `generateContent`, then records both on success.
//!
//! # Configuration
//!
//! ```text
//! GOOGLE_API_KEY=...
//! GEMINI_MODEL=gemini-1.5-flash
//! GEMINI_BASE_URL=https://generativelanguage.googleapis.com
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    ChatProvider, GenerationConfig, ProviderError, ProviderRole, ProviderSession, ProviderTurn,
};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Finish reasons that mean the candidate was withheld
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Gemini provider configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, without the `/v1beta` suffix
    pub base_url: String,
    /// Request timeout. `None` waits for the provider indefinitely.
    pub timeout_secs: Option<u64>,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Gemini API provider. Cheap to clone; sessions share the HTTP client.
#[derive(Clone)]
pub struct GeminiProvider {
    config: Arc<GeminiConfig>,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            config: Arc::new(config),
            client: builder.build()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Run one `generateContent` call and return the reply text
    async fn generate(
        &self,
        contents: &[GeminiContent],
        generation: &GenerationConfig,
    ) -> Result<String, ProviderError> {
        let request = GeminiRequest {
            contents,
            generation_config: generation,
        };

        tracing::debug!(
            model = %self.config.model,
            turns = contents.len(),
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let status = status.as_u16();
            return Err(match status {
                401 | 403 => ProviderError::Auth { status, message },
                429 => ProviderError::RateLimited(message),
                500..=599 => ProviderError::Server { status, message },
                _ => ProviderError::Http { status, message },
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        extract_text(parsed)
    }
}

impl ChatProvider for GeminiProvider {
    fn start_session(
        &self,
        history: Vec<ProviderTurn>,
        generation: GenerationConfig,
    ) -> Box<dyn ProviderSession> {
        Box::new(GeminiSession {
            provider: self.clone(),
            history: history.into_iter().map(GeminiContent::from).collect(),
            generation,
        })
    }
}

/// A chat session against Gemini
pub struct GeminiSession {
    provider: GeminiProvider,
    history: Vec<GeminiContent>,
    generation: GenerationConfig,
}

#[async_trait]
impl ProviderSession for GeminiSession {
    async fn send(&mut self, text: &str) -> Result<String, ProviderError> {
        let message = GeminiContent::text(ProviderRole::User, text);

        let mut contents = self.history.clone();
        contents.push(message.clone());

        let reply = self.provider.generate(&contents, &self.generation).await?;

        self.history.push(message);
        self.history
            .push(GeminiContent::text(ProviderRole::Model, reply.clone()));

        Ok(reply)
    }
}

/// Join the text parts of the first candidate, rejecting blocked replies
fn extract_text(response: GeminiResponse) -> Result<String, ProviderError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "unspecified".to_string());
        return Err(ProviderError::InvalidResponse(format!(
            "No candidates in response (block reason: {})",
            reason
        )));
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return Err(ProviderError::InvalidResponse(format!(
                "Response blocked: {}",
                reason
            )));
        }
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "Response contained no text".to_string(),
        ));
    }

    Ok(text)
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: &'a [GeminiContent],
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<ProviderRole>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: ProviderRole, text: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            parts: vec![GeminiPart {
                text: Some(text.into()),
            }],
        }
    }
}

impl From<ProviderTurn> for GeminiContent {
    fn from(turn: ProviderTurn) -> Self {
        Self::text(turn.role, turn.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

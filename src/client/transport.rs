//! Transport from the chat front-end to the adapter API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::conversation::Turn;
use crate::routes::{ChatRequest, ChatResponse};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server answered with status {0}")]
    Status(StatusCode),

    #[error("Malformed response payload: {0}")]
    MalformedPayload(String),
}

/// Delivers a conversation to the adapter and returns its reply
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, turns: &[Turn]) -> Result<Turn, TransportError>;
}

/// Posts conversations to a running `moxie-chat serve` instance
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpTransport {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, turns: &[Turn]) -> Result<Turn, TransportError> {
        let request = ChatRequest {
            messages: turns.to_vec(),
        };

        let mut req_builder = self.client.post(&self.endpoint).json(&request);
        if let Some(ref token) = self.access_token {
            req_builder = req_builder.bearer_auth(token);
        }

        let response = req_builder.send().await?;

        // The error body is opaque; only the status matters
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let body = response.text().await?;
        let reply: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| TransportError::MalformedPayload(e.to_string()))?;

        Ok(reply.message)
    }
}

//! Application configuration

use std::env;

use serde::{Deserialize, Serialize};

use crate::providers::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Bearer token required on `/api/chat`. `None` leaves the route open.
    pub access_token: Option<String>,
    /// Provider request timeout. `None` waits indefinitely.
    pub provider_timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            google_api_key: non_empty_var("GOOGLE_API_KEY"),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            access_token: non_empty_var("MOXIE_ACCESS_TOKEN"),
            provider_timeout_secs: match env::var("PROVIDER_TIMEOUT_SECS") {
                Ok(secs) => Some(secs.parse().map_err(|e| {
                    anyhow::anyhow!("PROVIDER_TIMEOUT_SECS must be a whole number: {}", e)
                })?),
                Err(_) => None,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            google_api_key: None,
            gemini_model: DEFAULT_MODEL.into(),
            gemini_base_url: DEFAULT_BASE_URL.into(),
            access_token: None,
            provider_timeout_secs: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

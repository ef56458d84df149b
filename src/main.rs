//! Moxie Chat - multi-turn LLM conversations
//!
//! `serve` runs the API that turns a conversation into a Gemini call.
//! `chat` runs a terminal conversation against a running server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use client::{ChatSession, HttpTransport};
use config::Config;
use crate::core::TurnAdapter;
use providers::{GeminiConfig, GeminiProvider};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub adapter: Arc<TurnAdapter>,
}

#[derive(Debug, Parser)]
#[command(name = "moxie-chat", version, about = "Multi-turn chat with a Gemini-backed API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the chat API server
    Serve,
    /// Chat in the terminal against a running server
    Chat {
        /// Server root URL
        #[arg(long, env = "MOXIE_CHAT_URL", default_value = "http://127.0.0.1:3000")]
        url: String,
        /// Bearer token for servers with an access token configured
        #[arg(long, env = "MOXIE_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moxie_chat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Serve => serve(Config::from_env()?).await,
        Command::Chat { url, token } => {
            let transport = HttpTransport::new(&url).with_access_token(token);
            client::run_repl(ChatSession::new(Arc::new(transport))).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let api_key = config
        .google_api_key
        .clone()
        .context("GOOGLE_API_KEY must be set to serve chat requests")?;

    let provider = GeminiProvider::new(
        GeminiConfig::new(api_key)
            .with_model(&config.gemini_model)
            .with_base_url(&config.gemini_base_url)
            .with_timeout_secs(config.provider_timeout_secs),
    )?;

    tracing::info!(model = provider.model(), "Using Gemini provider");
    if config.access_token.is_none() {
        tracing::warn!("MOXIE_ACCESS_TOKEN not set; /api/chat is open to any caller");
    }

    let state = AppState {
        config,
        adapter: Arc::new(TurnAdapter::new(Arc::new(provider))),
    };

    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("🔥 Moxie Chat API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! API routes

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;
use crate::core::AdapterError;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Body of `POST /api/chat`: the whole conversation, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Turn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Turn,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Client-facing view of an adapter failure. Provider detail stays in the logs.
pub struct ApiError(AdapterError);

impl From<AdapterError> for ApiError {
    fn from(err: AdapterError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self.0 {
            AdapterError::MalformedRequest(reason) => {
                tracing::warn!(reason, "Rejected chat request");
                (StatusCode::BAD_REQUEST, "Invalid chat request")
            }
            AdapterError::Provider(e) => {
                tracing::error!(error = %e, "Error generating response");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate response")
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Unreadable chat request body");
        AdapterError::MalformedRequest("body is not a chat request")
    })?;

    tracing::debug!(turns = request.messages.len(), "Chat request");

    let message = state.adapter.respond(&request.messages).await?;

    Ok(Json(ChatResponse { message }))
}

/// Gate for the chat route. Open when no access token is configured.
async fn require_access(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.access_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        next.run(request).await
    } else {
        tracing::warn!("Unauthorized chat request");
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized",
            }),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_access))
        .route("/health", get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::TurnAdapter;
    use crate::providers::{
        ChatProvider, GenerationConfig, ProviderError, ProviderSession, ProviderTurn,
    };
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Answers "Hi there", or fails with a detailed provider error on "fail"
    struct StubProvider;

    struct StubSession;

    impl ChatProvider for StubProvider {
        fn start_session(
            &self,
            _history: Vec<ProviderTurn>,
            _generation: GenerationConfig,
        ) -> Box<dyn ProviderSession> {
            Box::new(StubSession)
        }
    }

    #[async_trait]
    impl ProviderSession for StubSession {
        async fn send(&mut self, text: &str) -> Result<String, ProviderError> {
            if text == "fail" {
                return Err(ProviderError::Auth {
                    status: 403,
                    message: "API key AIza-secret not valid".into(),
                });
            }
            Ok("Hi there".to_string())
        }
    }

    fn app(access_token: Option<&str>) -> Router {
        router(AppState {
            config: Config {
                access_token: access_token.map(str::to_string),
                ..Config::default()
            },
            adapter: Arc::new(TurnAdapter::new(Arc::new(StubProvider))),
        })
    }

    fn chat_request(body: Value) -> HttpRequest<Body> {
        HttpRequest::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(None)
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_returns_assistant_turn() {
        let body = json!({ "messages": [{ "role": "user", "content": "Hello" }] });
        let response = app(None).oneshot(chat_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = read_json(response).await;
        assert_eq!(json["message"]["role"], "assistant");
        assert_eq!(json["message"]["content"], "Hi there");
        assert!(!json["message"]["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_hides_detail() {
        let body = json!({ "messages": [{ "role": "user", "content": "fail" }] });
        let response = app(None).oneshot(chat_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = read_json(response).await;
        assert_eq!(json, json!({ "error": "Failed to generate response" }));
    }

    #[tokio::test]
    async fn test_malformed_conversations_are_rejected() {
        for body in [
            json!({ "messages": [] }),
            json!({ "messages": [{ "role": "user", "content": "Hello" }, { "role": "user" }] }),
        ] {
            let response = app(None).oneshot(chat_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_unreadable_bodies_are_rejected_without_detail() {
        let requests = [
            chat_request(json!({ "msgs": [] })),
            chat_request(json!({ "messages": [{ "content": "Hello" }] })),
            chat_request(json!({ "messages": "Hello" })),
            HttpRequest::post("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("not json"))
                .unwrap(),
            HttpRequest::post("/api/chat")
                .body(Body::from(r#"{"messages":[]}"#))
                .unwrap(),
        ];

        for request in requests {
            let response = app(None).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(read_json(response).await, json!({ "error": "Invalid chat request" }));
        }
    }

    #[tokio::test]
    async fn test_non_user_roles_are_accepted() {
        let body = json!({
            "messages": [
                { "role": "system", "content": "Be brief" },
                { "role": "user", "content": "Hello" }
            ]
        });
        let response = app(None).oneshot(chat_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["message"]["content"], "Hi there");
    }

    #[tokio::test]
    async fn test_access_gate() {
        let body = json!({ "messages": [{ "role": "user", "content": "Hello" }] });

        let response = app(Some("secret"))
            .oneshot(chat_request(body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let mut request = chat_request(body);
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        let response = app(Some("secret")).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Health stays reachable
        let response = app(Some("secret"))
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

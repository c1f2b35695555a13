//! HTTP surface: `/agent`, `/explain-element`, `/health` and `/`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::Agent;
use crate::config::{AppConfig, ModelConfig};
use crate::error::{AgentError, Result};

pub const TRACING_TARGET_SERVER: &str = "bedrock_agent::server";

const FEATURES: [&str; 4] = [
    "AI conversation with Bedrock",
    "Web element analysis",
    "Tool calling (time, calculator)",
    "AWS Console expertise",
];

/// What `/health` reports about the configured model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model: String,
    pub provider: &'static str,
    pub region: String,
    pub credentials_configured: bool,
}

impl ModelInfo {
    pub fn new(cfg: &ModelConfig, credentials_configured: bool) -> Self {
        Self {
            model: cfg.model_id.clone(),
            provider: cfg.provider.as_str(),
            region: cfg.region.clone(),
            credentials_configured,
        }
    }
}

#[derive(Clone)]
struct AppState {
    agent: Arc<Agent>,
    model: Arc<ModelInfo>,
}

pub struct AgentServer {
    state: AppState,
    allowed_origins: Vec<String>,
}

impl AgentServer {
    /// Checks the model's credentials once; `/health` reports that result.
    pub async fn new(agent: Agent, config: &AppConfig) -> Self {
        let credentials = agent.credentials_configured().await;
        Self {
            state: AppState {
                agent: Arc::new(agent),
                model: Arc::new(ModelInfo::new(&config.model, credentials)),
            },
            allowed_origins: config.security.allowed_origins.clone(),
        }
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.state.model
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(service_info))
            .route("/health", get(health))
            .route("/agent", post(agent_turn))
            .route("/explain-element", post(explain_element))
            .with_state(self.state.clone())
            .layer(cors_layer(&self.allowed_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Serves until ctrl-c.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(target: TRACING_TARGET_SERVER, %addr, "listening");
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!(target: TRACING_TARGET_SERVER, "server stopped");
        Ok(())
    }
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_SERVER,
                    %origin,
                    error = %err,
                    "ignoring invalid CORS origin"
                );
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(target: TRACING_TARGET_SERVER, error = %err, "failed to listen for ctrl-c");
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        if let AgentError::InvalidInput(message) = &self {
            tracing::debug!(target: TRACING_TARGET_SERVER, error = %message, "rejected request");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response();
        }
        tracing::error!(target: TRACING_TARGET_SERVER, error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Server error: {self}") })),
        )
            .into_response()
    }
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| AgentError::InvalidInput("Request body must be JSON format".into()))
}

#[derive(Debug, Deserialize)]
struct AgentRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct AgentResponse {
    reply: String,
}

async fn agent_turn(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Json<AgentResponse>> {
    let request = json_body(payload)?;
    let reply = state
        .agent
        .handle(request.message.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(AgentResponse { reply: reply.text }))
}

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    #[serde(default)]
    element: Value,
}

#[derive(Debug, Serialize)]
struct ExplainResponse {
    success: bool,
    explanation: String,
    element: Value,
}

async fn explain_element(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<ExplainResponse>> {
    let request = json_body(payload)?;
    let explanation = state.agent.explain_element(&request.element).await?;
    Ok(Json(ExplainResponse {
        success: true,
        explanation,
        element: request.element,
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Bedrock agent running",
        "model": state.model.model,
        "provider": state.model.provider,
        "region": state.model.region,
        "credentials_configured": state.model.credentials_configured,
    }))
}

async fn service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Bedrock Agent API",
        "endpoints": {
            "POST /agent": "AI conversation with tool calling",
            "POST /explain-element": "AWS Console element analysis",
            "GET /health": "Health check",
            "GET /": "API information"
        },
        "features": FEATURES,
        "tools": state.agent.tools().describe(),
        "examples": {
            "agent": {
                "url": "POST /agent",
                "body": {"message": "What time is it in UTC?"}
            },
            "element": {
                "url": "POST /explain-element",
                "body": {
                    "element": {
                        "tagName": "button",
                        "id": "create-function",
                        "textContent": "Create Function"
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use crate::llm::StubModel;

    async fn server_with_origins(origins: &[&str]) -> AgentServer {
        let mut config = AppConfig::default();
        config.security.allowed_origins = origins.iter().map(|o| o.to_string()).collect();
        AgentServer::new(Agent::new(StubModel::new(Vec::new())), &config).await
    }

    async fn allowed_origin(server: &AgentServer, origin: &str) -> Option<String> {
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    }

    #[tokio::test]
    async fn cors_allows_any_origin_by_default() {
        let server = server_with_origins(&[]).await;
        assert_eq!(
            allowed_origin(&server, "https://example.com").await.as_deref(),
            Some("*")
        );
    }

    #[tokio::test]
    async fn cors_allows_only_listed_origins() {
        let console = "https://console.aws.amazon.com";
        let server = server_with_origins(&[console, "not\na header"]).await;

        assert_eq!(allowed_origin(&server, console).await.as_deref(), Some(console));
        assert_eq!(allowed_origin(&server, "https://evil.example").await, None);
    }

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let response = AgentError::InvalidInput("message required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AgentError::LanguageModel("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn model_info_reports_model_credentials() {
        let server = server_with_origins(&[]).await;
        let info = server.model_info();
        assert!(info.credentials_configured);
        assert_eq!(info.provider, "bedrock");
        assert_eq!(info.model, "amazon.titan-text-express-v1");
    }
}

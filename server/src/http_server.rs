use crate::coordinator::Coordinator;
use crate::session::{ConversationStore, StoreError, DEFAULT_CONVERSATION, NEW_CONVERSATION};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub conversations: Arc<ConversationStore>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Busy(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Busy(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(e) => {
                error!(error = %format!("{:#}", e), "Failed to process chat message");
                let body = Json(json!({ "error": "An internal error occurred." }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Full(_) => Self::Busy(e.to_string()),
            other => Self::Internal(other.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload?;
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("No message provided".to_string()));
    }

    let session_id = match payload.session_id.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_CONVERSATION.to_string(),
        Some(NEW_CONVERSATION) => ConversationStore::new_id(),
        Some(id) => id.to_string(),
    };

    let conversation = state.conversations.get_or_create(&session_id)?;
    let mut conversation = conversation.lock().await;

    let response = state
        .coordinator
        .process_message(&mut conversation.chat, &payload.message)
        .await?;
    conversation.touch();

    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

//! HTTP surface
//!
//! Liveness endpoints plus an interaction endpoint that runs one
//! interaction through the bot against a per-request buffered transport and
//! returns what the bot would have sent.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bot::Bot;
use crate::error::BotError;
use crate::models::{ChatId, Interaction, InteractionKind, MessageId, Sender, UserId};
use crate::transport::{BufferedTransport, OutboundAction};
use crate::Result;

pub const BANNER: &str = "MoneyMentorLab bot is running";

// =============================
// Request / response models
// =============================

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionRequest {
    pub conversation_id: ChatId,
    pub kind: InteractionKind,
    pub token: String,
    /// Full sender profile; takes precedence over `user_id`.
    #[serde(default)]
    pub sender: Option<Sender>,
    /// Defaults to the conversation id (private chats).
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(default)]
    pub callback_id: Option<String>,
}

impl InteractionRequest {
    pub fn into_interaction(self) -> Result<Interaction> {
        if self.kind == InteractionKind::Callback && self.message_id.is_none() {
            return Err(BotError::Validation(
                "callback interactions need a message_id".to_string(),
            ));
        }

        let sender = self
            .sender
            .unwrap_or_else(|| Sender::new(self.user_id.unwrap_or(self.conversation_id)));

        Ok(Interaction {
            conversation_id: self.conversation_id,
            sender,
            token: self.token,
            kind: self.kind,
            message_id: self.message_id,
            callback_id: self.callback_id,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InteractionOutcome {
    actions: Vec<OutboundAction>,
}

#[derive(Clone)]
pub struct GatewayState {
    pub bot: Arc<Bot>,
}

// =============================
// Handlers
// =============================

async fn root() -> &'static str {
    BANNER
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn post_interaction(
    State(state): State<GatewayState>,
    Json(req): Json<InteractionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let interaction = match req.into_interaction() {
        Ok(interaction) => interaction,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    info!(
        chat_id = interaction.conversation_id,
        kind = ?interaction.kind,
        token = %interaction.token,
        "Received interaction"
    );

    let transport = BufferedTransport::new();
    let outcome = state.bot.handle(&interaction, &transport).await;
    let actions = transport.take_actions().await;

    match outcome {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(InteractionOutcome { actions })),
        ),
        Err(e) => {
            let mut response = ApiResponse::error(e.to_string());
            response.data = serde_json::to_value(InteractionOutcome { actions }).ok();
            (StatusCode::BAD_GATEWAY, Json(response))
        }
    }
}

// =============================
// Router
// =============================

pub fn create_router(bot: Arc<Bot>) -> Router {
    let state = GatewayState { bot };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/interactions", post(post_interaction))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(bot: Arc<Bot>, port: u16) -> Result<()> {
    let router = create_router(bot);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Gateway listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;
    Ok(())
}

//! Messaging transport seam
//!
//! The core only needs four operations from the chat platform: send a
//! message, edit a message, acknowledge a callback and send a document.

use crate::error::BotError;
use crate::models::{ChatId, MessageId};
use crate::navigation::views::RenderedView;
use crate::premium::DocumentPayload;
use crate::Result;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The edit would leave the message unchanged.
    #[error("message is not modified")]
    NotModified,

    #[error("message to edit not found")]
    MessageNotFound,

    #[error("transport call failed: {0}")]
    Failed(String),

    /// Polling/connection failure; the interaction source must be rebuilt.
    #[error("transport disconnected: {0}")]
    Disconnected(String),
}

impl TransportError {
    /// Failures that mean the edit is already in effect or moot.
    pub fn is_benign(&self) -> bool {
        matches!(self, TransportError::NotModified | TransportError::MessageNotFound)
    }
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, view: &RenderedView) -> TransportResult<MessageId>;

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        view: &RenderedView,
    ) -> TransportResult<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> TransportResult<()>;

    async fn send_document(
        &self,
        chat_id: ChatId,
        payload: &DocumentPayload,
        caption: &str,
    ) -> TransportResult<()>;
}

/// Edit a message in place. Unchanged or vanished targets are swallowed; any
/// other failure is logged and returned.
pub async fn safe_edit(
    transport: &dyn Transport,
    chat_id: ChatId,
    message_id: MessageId,
    view: &RenderedView,
) -> Result<()> {
    match transport.edit_message(chat_id, message_id, view).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_benign() => Ok(()),
        Err(e) => {
            error!(chat_id, message_id, error = %e, "Edit message failed");
            Err(BotError::Transport(e))
        }
    }
}

// =============================
// Buffered transport
// =============================

/// Everything the bot asked the platform to do, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        view: RenderedView,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        view: RenderedView,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
    Document {
        chat_id: ChatId,
        file_name: String,
        size: usize,
        caption: String,
    },
}

#[derive(Default)]
struct BufferState {
    actions: Vec<OutboundAction>,
    /// Current content of every message this transport has seen.
    messages: HashMap<(ChatId, MessageId), RenderedView>,
    next_message_id: MessageId,
    edit_failures: VecDeque<TransportError>,
    document_failures: VecDeque<TransportError>,
}

/// In-memory transport that records outbound actions and mimics the
/// platform's refusal to apply an edit that changes nothing.
#[derive(Default)]
pub struct BufferedTransport {
    state: Mutex<BufferState>,
}

impl BufferedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn actions(&self) -> Vec<OutboundAction> {
        self.state.lock().await.actions.clone()
    }

    pub async fn take_actions(&self) -> Vec<OutboundAction> {
        std::mem::take(&mut self.state.lock().await.actions)
    }

    /// Current content of a message, if known.
    pub async fn message(&self, chat_id: ChatId, message_id: MessageId) -> Option<RenderedView> {
        self.state.lock().await.messages.get(&(chat_id, message_id)).cloned()
    }

    /// Make the next edit fail with `error`.
    pub async fn fail_next_edit(&self, error: TransportError) {
        self.state.lock().await.edit_failures.push_back(error);
    }

    pub async fn fail_next_document(&self, error: TransportError) {
        self.state.lock().await.document_failures.push_back(error);
    }
}

#[async_trait::async_trait]
impl Transport for BufferedTransport {
    async fn send_message(&self, chat_id: ChatId, view: &RenderedView) -> TransportResult<MessageId> {
        let mut state = self.state.lock().await;
        state.next_message_id += 1;
        let message_id = state.next_message_id;

        state.messages.insert((chat_id, message_id), view.clone());
        state.actions.push(OutboundAction::Send {
            chat_id,
            message_id,
            view: view.clone(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        view: &RenderedView,
    ) -> TransportResult<()> {
        let mut state = self.state.lock().await;
        if let Some(e) = state.edit_failures.pop_front() {
            return Err(e);
        }
        if state.messages.get(&(chat_id, message_id)) == Some(view) {
            return Err(TransportError::NotModified);
        }

        state.messages.insert((chat_id, message_id), view.clone());
        state.actions.push(OutboundAction::Edit {
            chat_id,
            message_id,
            view: view.clone(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> TransportResult<()> {
        self.state.lock().await.actions.push(OutboundAction::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        payload: &DocumentPayload,
        caption: &str,
    ) -> TransportResult<()> {
        let mut state = self.state.lock().await;
        if let Some(e) = state.document_failures.pop_front() {
            return Err(e);
        }
        state.actions.push(OutboundAction::Document {
            chat_id,
            file_name: payload.file_name.clone(),
            size: payload.bytes.len(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}

//! Free-text feedback sessions
//!
//! A conversation is either awaiting feedback or not; at most one pending
//! session exists per conversation. Sessions end on receipt of the text
//! (accepted or rejected) or when the user navigates elsewhere.

use crate::error::BotError;
use crate::models::{ChatId, Sender};
use crate::Result;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Accepted messages are strictly shorter than this many characters.
pub const MAX_FEEDBACK_CHARS: usize = 2000;

#[derive(Default)]
pub struct FeedbackSessions {
    awaiting: Mutex<HashSet<ChatId>>,
}

impl FeedbackSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self, conversation_id: ChatId) {
        self.awaiting.lock().await.insert(conversation_id);
    }

    pub async fn is_awaiting(&self, conversation_id: ChatId) -> bool {
        self.awaiting.lock().await.contains(&conversation_id)
    }

    /// Returns whether a session was pending.
    pub async fn end(&self, conversation_id: ChatId) -> bool {
        self.awaiting.lock().await.remove(&conversation_id)
    }

    pub async fn pending(&self) -> usize {
        self.awaiting.lock().await.len()
    }
}

/// Trimmed feedback text, or a validation error when empty or too long.
pub fn validate_feedback(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        return Err(BotError::Validation("feedback is empty".to_string()));
    }
    if len >= MAX_FEEDBACK_CHARS {
        return Err(BotError::Validation(format!(
            "feedback has {} characters, limit is {}",
            len, MAX_FEEDBACK_CHARS
        )));
    }
    Ok(trimmed)
}

/// Copy of a feedback message forwarded to the administrator.
pub fn format_for_admin(sender: &Sender, text: &str) -> String {
    let username = sender
        .username
        .as_deref()
        .map(|u| format!("@{}", u))
        .unwrap_or_default();
    let name = sender.full_name().unwrap_or_else(|| "User".to_string());

    format!(
        "🗣️ *New feedback*\n\nFrom: *{}* {}\nID: `{}`\n\n{}",
        name, username, sender.id, text
    )
}

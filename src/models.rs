//! Core data models for the bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type UserId = i64;
pub type ChatId = i64;
pub type MessageId = i32;

//
// ================= Interaction =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Command,
    Callback,
    FreeText,
}

/// Who sent an interaction, as reported by the messaging platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Sender {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// "First Last", or None when neither part is known.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// One inbound event. Constructed per message, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub conversation_id: ChatId,
    pub sender: Sender,
    pub token: String,
    pub kind: InteractionKind,
    /// Message carrying the buttons, for callbacks.
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(default)]
    pub callback_id: Option<String>,
}

impl Interaction {
    pub fn command(conversation_id: ChatId, sender: Sender, command: &str) -> Self {
        Self {
            conversation_id,
            sender,
            token: command.to_string(),
            kind: InteractionKind::Command,
            message_id: None,
            callback_id: None,
        }
    }

    pub fn callback(
        conversation_id: ChatId,
        sender: Sender,
        token: &str,
        message_id: MessageId,
        callback_id: &str,
    ) -> Self {
        Self {
            conversation_id,
            sender,
            token: token.to_string(),
            kind: InteractionKind::Callback,
            message_id: Some(message_id),
            callback_id: Some(callback_id.to_string()),
        }
    }

    pub fn free_text(conversation_id: ChatId, sender: Sender, text: &str) -> Self {
        Self {
            conversation_id,
            sender,
            token: text.to_string(),
            kind: InteractionKind::FreeText,
            message_id: None,
            callback_id: None,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.sender.id
    }
}

//
// ================= Prices =================
//

/// Determines which upstream source and cache partition a lookup uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentClass {
    Index,
    Stock,
    Crypto,
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrumentClass::Index => "index",
            InstrumentClass::Stock => "stock",
            InstrumentClass::Crypto => "crypto",
        };
        write!(f, "{}", s)
    }
}

/// Normalized quote. Superseded, never mutated, on refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceSnapshot {
    pub instrument_id: String,
    /// Display name reported by the source, when it reports one.
    pub name: Option<String>,
    pub price: f64,
    /// Absolute change against the reference close. Crypto quotes only carry a
    /// percentage, so this is None for them.
    pub change: Option<f64>,
    pub change_percent: f64,
    pub fetched_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Builds a snapshot from a price and the previous reference close.
    pub fn from_reference(
        instrument_id: &str,
        name: Option<String>,
        price: f64,
        previous: f64,
    ) -> Self {
        let change = price - previous;
        let change_percent = if previous != 0.0 {
            change / previous * 100.0
        } else {
            0.0
        };

        Self {
            instrument_id: instrument_id.to_string(),
            name,
            price,
            change: Some(change),
            change_percent,
            fetched_at: Utc::now(),
        }
    }

    /// Builds a snapshot from a price and a pre-computed 24h percent change.
    pub fn from_percent(instrument_id: &str, price: f64, change_percent: f64) -> Self {
        Self {
            instrument_id: instrument_id.to_string(),
            name: Some(instrument_id.to_string()),
            price,
            change: None,
            change_percent,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.change.unwrap_or(self.change_percent) >= 0.0
    }

    /// Signed percent label, e.g. "+1.25%" or "-0.40%".
    pub fn change_percent_label(&self) -> String {
        if self.change_percent >= 0.0 {
            format!("+{:.2}%", self.change_percent)
        } else {
            format!("{:.2}%", self.change_percent)
        }
    }
}

//
// ================= Content =================
//

/// A guide, portfolio or tool page addressable by its callback id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub link: String,
}

/// Purchase links for the premium bundles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PremiumLinks {
    #[serde(default)]
    pub strumenti: Option<String>,
    #[serde(default)]
    pub portafogli: Option<String>,
    #[serde(default)]
    pub liste: Option<String>,
    #[serde(default)]
    pub completo: Option<String>,
}

/// Editable content served by the bot. Replaced wholesale on reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentDocument {
    #[serde(default, rename = "welcome")]
    pub welcome_text: Option<String>,
    #[serde(default)]
    pub guides: Vec<ContentEntry>,
    #[serde(default, rename = "portafogli")]
    pub portfolios: Vec<ContentEntry>,
    #[serde(default)]
    pub tools: Vec<ContentEntry>,
    #[serde(default, rename = "stripe")]
    pub premium_links: PremiumLinks,
    #[serde(default)]
    pub community_link: Option<String>,
}

//
// ================= Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn from_sender(sender: &Sender) -> Self {
        Self {
            id: sender.id,
            username: sender.username.clone(),
            first_name: sender.first_name.clone(),
            last_name: sender.last_name.clone(),
            joined_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackRecord {
    #[serde(default = "Uuid::new_v4")]
    pub feedback_id: Uuid,
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(sender: &Sender, message: &str) -> Self {
        Self {
            feedback_id: Uuid::new_v4(),
            user_id: sender.id,
            username: sender.username.clone(),
            first_name: sender.first_name.clone(),
            last_name: sender.last_name.clone(),
            message: message.to_string(),
            sent_at: Utc::now(),
        }
    }
}

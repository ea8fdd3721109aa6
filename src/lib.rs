//! MoneyMentorLab bot core
//!
//! A callback-driven menu bot serving financial-education content and live
//! market prices, with a premium tier:
//! - Per-user fixed-window rate limiting
//! - TTL price cache in front of two upstream market-data APIs
//! - Read-through content cache refreshed on a short tick
//! - Navigation engine routing interaction tokens to views
//! - Free-text feedback sessions
//!
//! FLOW:
//! INTERACTION → RATE LIMIT → ROUTE → FETCH/RENDER → EDIT IN PLACE

pub mod bot;
pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod models;
pub mod navigation;
pub mod premium;
pub mod prices;
pub mod rate_limit;
pub mod runtime;
pub mod storage;
pub mod transport;

pub use error::{BotError, Result};

// Re-export common types
pub use bot::{Bot, BotDeps};
pub use config::BotConfig;
pub use models::*;
pub use navigation::{NavigationEngine, RenderedView, Transition, ViewId};
pub use transport::{BufferedTransport, Transport, TransportError};

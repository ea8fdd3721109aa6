//! Bot front door
//!
//! Every inbound interaction goes through `Bot::handle`: rate limiting,
//! user registration, then command, callback or free-text handling. Errors
//! are reported to the user where one is waiting for an answer and logged;
//! nothing here is allowed to take the process down.

use crate::content::ContentStore;
use crate::feedback::{self, FeedbackSessions};
use crate::models::{ChatId, FeedbackRecord, Interaction, InteractionKind, MessageId, Sender, UserId, UserRecord};
use crate::navigation::{views, NavigationEngine, Output, RenderedView, Transition};
use crate::premium::{DocumentDelivery, PremiumDirectory};
use crate::prices::PriceService;
use crate::rate_limit::{RateKey, RateLimiter};
use crate::storage::{self, UserStore};
use crate::transport::{safe_edit, Transport};
use crate::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators the bot is assembled from.
pub struct BotDeps {
    pub admin_id: UserId,
    pub support_url: String,
    pub store: Arc<dyn UserStore>,
    pub prices: Arc<PriceService>,
    pub content: Arc<ContentStore>,
    pub delivery: Arc<dyn DocumentDelivery>,
    pub limiter: Arc<RateLimiter>,
    /// Data directory holding `backups/`, for `/stats`.
    pub data_root: Option<PathBuf>,
}

pub struct Bot {
    admin_id: UserId,
    support_url: String,
    store: Arc<dyn UserStore>,
    content: Arc<ContentStore>,
    premium: Arc<PremiumDirectory>,
    limiter: Arc<RateLimiter>,
    sessions: Arc<FeedbackSessions>,
    navigation: NavigationEngine,
    data_root: Option<PathBuf>,
    started_at: DateTime<Utc>,
}

impl Bot {
    pub fn new(deps: BotDeps) -> Self {
        let premium = Arc::new(PremiumDirectory::new(deps.admin_id, deps.store.clone()));
        let sessions = Arc::new(FeedbackSessions::new());
        let navigation = NavigationEngine::new(
            deps.prices,
            deps.content.clone(),
            premium.clone(),
            deps.delivery,
            sessions.clone(),
            deps.support_url.clone(),
        );

        Self {
            admin_id: deps.admin_id,
            support_url: deps.support_url,
            store: deps.store,
            content: deps.content,
            premium,
            limiter: deps.limiter,
            sessions,
            navigation,
            data_root: deps.data_root,
            started_at: Utc::now(),
        }
    }

    pub fn prices(&self) -> &PriceService {
        self.navigation.prices()
    }

    pub fn sessions(&self) -> &FeedbackSessions {
        &self.sessions
    }

    pub async fn handle(&self, interaction: &Interaction, transport: &dyn Transport) -> Result<()> {
        debug!(
            user_id = interaction.user_id(),
            chat_id = interaction.conversation_id,
            kind = ?interaction.kind,
            "Handling interaction"
        );

        match interaction.kind {
            InteractionKind::Command => self.handle_command(interaction, transport).await,
            InteractionKind::Callback => self.handle_callback(interaction, transport).await,
            InteractionKind::FreeText => self.handle_text(interaction, transport).await,
        }
    }

    // =============================
    // Commands
    // =============================

    async fn handle_command(&self, interaction: &Interaction, transport: &dyn Transport) -> Result<()> {
        let chat_id = interaction.conversation_id;
        let user_id = interaction.user_id();

        match command_name(&interaction.token) {
            Some("start") => {
                if !self.limiter.allow(&RateKey::Interaction(user_id)).await {
                    send(transport, chat_id, &views::throttled()).await;
                    return Ok(());
                }
                self.register(&interaction.sender).await;

                let document = self.content.get_document().await;
                let view = views::main_menu(&document, &self.support_url);
                transport.send_message(chat_id, &view).await?;
                Ok(())
            }
            Some("stats") if user_id == self.admin_id => {
                let stats = self.collect_stats().await?;
                transport
                    .send_message(chat_id, &RenderedView::markdown(stats.render()))
                    .await?;
                Ok(())
            }
            Some("stats") => {
                debug!(user_id, "Ignoring /stats from non-admin");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn collect_stats(&self) -> Result<AdminStats> {
        let users = self.store.list_users().await?;
        let premium_users = self.premium.premium_users().await.len();

        let last_backup = match &self.data_root {
            Some(root) => storage::latest_backup(root).await.unwrap_or_else(|e| {
                warn!(error = %e, "Could not read backup directory");
                None
            }),
            None => None,
        };

        Ok(AdminStats {
            total_users: users.len(),
            premium_users,
            last_backup,
            uptime: Utc::now() - self.started_at,
            recent_users: users.into_iter().rev().take(5).collect(),
        })
    }

    /// Store the sender if unknown. Throttled separately from interactive
    /// actions; failures are only logged.
    async fn register(&self, sender: &Sender) {
        if !self.limiter.allow(&RateKey::Registration(sender.id)).await {
            debug!(user_id = sender.id, "Registration throttled");
            return;
        }

        match self.store.upsert_user(UserRecord::from_sender(sender)).await {
            Ok(true) => info!(user_id = sender.id, "New user registered"),
            Ok(false) => {}
            Err(e) => error!(user_id = sender.id, error = %e, "User registration failed"),
        }
    }

    // =============================
    // Callbacks
    // =============================

    async fn handle_callback(&self, interaction: &Interaction, transport: &dyn Transport) -> Result<()> {
        let chat_id = interaction.conversation_id;
        let user_id = interaction.user_id();
        let token = interaction.token.as_str();
        let callback_id = interaction.callback_id.as_deref().unwrap_or_default();

        let Some(message_id) = interaction.message_id else {
            warn!(user_id, token, "Callback without a message to edit");
            return Ok(());
        };

        if !self.limiter.allow(&RateKey::Interaction(user_id)).await {
            let notice = views::throttled();
            if let Err(e) = transport.answer_callback(callback_id, Some(notice.text.as_str())).await {
                debug!(error = %e, "Throttle notice not delivered");
            }
            return Ok(());
        }

        self.register(&interaction.sender).await;

        if let Err(e) = transport.answer_callback(callback_id, None).await {
            debug!(error = %e, "Callback acknowledgement failed");
        }

        if let Some(placeholder) = self.navigation.loading_view(token) {
            if let Err(e) = safe_edit(transport, chat_id, message_id, &placeholder).await {
                debug!(error = %e, "Loading placeholder not shown");
            }
        }

        let outcome = match self.navigation.transition(user_id, chat_id, token).await {
            Ok(transition) => self.apply(transport, chat_id, message_id, transition).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            error!(user_id, token, error = %e, "Callback handling failed");
            if let Err(notice_err) = transport
                .answer_callback(callback_id, Some(e.user_message()))
                .await
            {
                debug!(error = %notice_err, "Error notice not delivered");
            }
        }
        outcome
    }

    async fn apply(
        &self,
        transport: &dyn Transport,
        chat_id: ChatId,
        message_id: MessageId,
        transition: Transition,
    ) -> Result<()> {
        if let Some(next) = &transition.next {
            debug!(chat_id, view = %next, "Transition");
        }

        match transition.output {
            Output::Edit(view) => safe_edit(transport, chat_id, message_id, &view).await,
            Output::Send(view) => {
                transport.send_message(chat_id, &view).await?;
                Ok(())
            }
            Output::Document {
                notice,
                payload,
                caption,
            } => {
                transport.send_message(chat_id, &notice).await?;
                if let Err(e) = transport.send_document(chat_id, &payload, &caption).await {
                    error!(chat_id, file = %payload.file_name, error = %e, "Document delivery failed");
                    transport.send_message(chat_id, &views::bundle_failed()).await?;
                }
                Ok(())
            }
            Output::None => Ok(()),
        }
    }

    // =============================
    // Free text
    // =============================

    async fn handle_text(&self, interaction: &Interaction, transport: &dyn Transport) -> Result<()> {
        let chat_id = interaction.conversation_id;
        let user_id = interaction.user_id();
        let text = interaction.token.as_str();

        if text.starts_with('/') || !self.sessions.is_awaiting(chat_id).await {
            return Ok(());
        }

        if !self.limiter.allow(&RateKey::Interaction(user_id)).await {
            send(transport, chat_id, &views::throttled()).await;
            return Ok(());
        }

        self.sessions.end(chat_id).await;

        let message = match feedback::validate_feedback(text) {
            Ok(message) => message,
            Err(e) => {
                info!(user_id, reason = %e, "Feedback rejected");
                send(transport, chat_id, &views::feedback_rejected()).await;
                return Ok(());
            }
        };

        let record = FeedbackRecord::new(&interaction.sender, message);
        match self.store.append_feedback(record).await {
            Ok(()) => info!(user_id, chars = message.chars().count(), "Feedback stored"),
            // Still forwarded below so the admin sees it.
            Err(e) => error!(user_id, error = %e, "Failed to persist feedback"),
        }

        let admin_copy = RenderedView::markdown(feedback::format_for_admin(&interaction.sender, message));
        if let Err(e) = transport.send_message(self.admin_id, &admin_copy).await {
            error!(error = %e, "Failed to forward feedback to admin");
        }

        transport.send_message(chat_id, &views::feedback_thanks()).await?;
        Ok(())
    }
}

/// Send and log on failure; used for notices whose delivery nobody waits on.
async fn send(transport: &dyn Transport, chat_id: ChatId, view: &RenderedView) {
    if let Err(e) = transport.send_message(chat_id, view).await {
        warn!(chat_id, error = %e, "Notice not delivered");
    }
}

/// "/start@SomeBot arg" -> "start"
fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    Some(name.split('@').next().unwrap_or(name))
}

// =============================
// Admin stats
// =============================

#[derive(Debug, Clone)]
pub struct AdminStats {
    pub total_users: usize,
    pub premium_users: usize,
    pub last_backup: Option<DateTime<Utc>>,
    pub uptime: chrono::Duration,
    /// Newest first.
    pub recent_users: Vec<UserRecord>,
}

impl AdminStats {
    pub fn render(&self) -> String {
        let backup = self
            .last_backup
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "n/a".to_string());

        let recent = if self.recent_users.is_empty() {
            "_none_".to_string()
        } else {
            self.recent_users
                .iter()
                .map(|u| {
                    let name = u.first_name.as_deref().unwrap_or("N/A");
                    let username = u
                        .username
                        .as_deref()
                        .map(|n| format!(" @{}", n))
                        .unwrap_or_default();
                    format!("• {}{} (`{}`)", name, username, u.id)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "📊 *Bot statistics*\n\n\
             👥 Total users: *{}*\n\
             💎 Premium users: *{}*\n\
             💾 Last backup: {}\n\
             ⏱️ Uptime: {}\n\n\
             *Last 5 users:*\n{}",
            self.total_users,
            self.premium_users,
            backup,
            format_uptime(self.uptime),
            recent
        )
    }
}

pub fn format_uptime(uptime: chrono::Duration) -> String {
    let minutes = uptime.num_minutes().max(0);
    format!("{}d {}h {}m", minutes / 1440, (minutes % 1440) / 60, minutes % 60)
}

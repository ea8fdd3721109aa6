//! Navigation engine
//!
//! Interprets an interaction token and produces the next view. The engine
//! never talks to the transport itself: it returns a `Transition` that the
//! bot applies (edit in place, send, or hand off a document).

pub mod routes;
pub mod views;

pub use routes::{Route, StaticRoute};
pub use views::{Button, Keyboard, RenderedView};

use crate::content::ContentStore;
use crate::feedback::FeedbackSessions;
use crate::models::{ChatId, ContentDocument, ContentEntry, InstrumentClass, UserId};
use crate::premium::{DocumentDelivery, DocumentPayload, PremiumDirectory, PremiumProduct};
use crate::prices::PriceService;
use crate::Result;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collections of the content document addressable by entry id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Guide,
    Portfolio,
    Tool,
}

impl ContentKind {
    /// Lookup order for dynamic tokens.
    pub const ALL: [ContentKind; 3] = [ContentKind::Guide, ContentKind::Portfolio, ContentKind::Tool];

    pub fn entries(self, document: &ContentDocument) -> &[ContentEntry] {
        match self {
            ContentKind::Guide => &document.guides,
            ContentKind::Portfolio => &document.portfolios,
            ContentKind::Tool => &document.tools,
        }
    }

    /// Token of the menu listing this collection.
    pub fn menu_token(self) -> &'static str {
        match self {
            ContentKind::Guide => "guide_menu",
            ContentKind::Portfolio => "portafogli_menu",
            ContentKind::Tool => "tool",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Guide => write!(f, "guide"),
            ContentKind::Portfolio => write!(f, "portfolio"),
            ContentKind::Tool => write!(f, "tool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewId {
    Main,
    GuideMenu,
    PortfolioMenu,
    ToolMenu,
    MarketMenu,
    Category(InstrumentClass),
    InstrumentDetail {
        class: InstrumentClass,
        instrument_id: String,
    },
    PricesRefreshed,
    Premium,
    Disclaimer,
    Community,
    DynamicContent {
        kind: ContentKind,
        id: String,
    },
    FeedbackPrompt,
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewId::Main => write!(f, "main"),
            ViewId::GuideMenu => write!(f, "guideMenu"),
            ViewId::PortfolioMenu => write!(f, "portfolioMenu"),
            ViewId::ToolMenu => write!(f, "toolMenu"),
            ViewId::MarketMenu => write!(f, "marketMenu"),
            ViewId::Category(InstrumentClass::Index) => write!(f, "indicesView"),
            ViewId::Category(InstrumentClass::Stock) => write!(f, "stocksView"),
            ViewId::Category(InstrumentClass::Crypto) => write!(f, "cryptoView"),
            ViewId::InstrumentDetail {
                class,
                instrument_id,
            } => write!(f, "instrumentDetail({},{})", class, instrument_id),
            ViewId::PricesRefreshed => write!(f, "pricesRefreshed"),
            ViewId::Premium => write!(f, "premiumView"),
            ViewId::Disclaimer => write!(f, "disclaimerView"),
            ViewId::Community => write!(f, "communityView"),
            ViewId::DynamicContent { kind, id } => write!(f, "dynamicContent({},{})", kind, id),
            ViewId::FeedbackPrompt => write!(f, "feedbackPrompt"),
        }
    }
}

/// What the bot should do with the result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Replace the message that carried the button.
    Edit(RenderedView),
    /// Post a new message.
    Send(RenderedView),
    /// Post `notice`, then the document.
    Document {
        notice: RenderedView,
        payload: DocumentPayload,
        caption: String,
    },
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// None keeps the current view.
    pub next: Option<ViewId>,
    pub output: Output,
}

impl Transition {
    fn to(next: ViewId, view: RenderedView) -> Self {
        Self {
            next: Some(next),
            output: Output::Edit(view),
        }
    }

    fn stay(output: Output) -> Self {
        Self { next: None, output }
    }

    pub fn noop() -> Self {
        Self::stay(Output::None)
    }

    pub fn is_noop(&self) -> bool {
        self.next.is_none() && self.output == Output::None
    }
}

pub struct NavigationEngine {
    prices: Arc<PriceService>,
    content: Arc<ContentStore>,
    premium: Arc<PremiumDirectory>,
    delivery: Arc<dyn DocumentDelivery>,
    sessions: Arc<FeedbackSessions>,
    support_url: String,
}

impl NavigationEngine {
    pub fn new(
        prices: Arc<PriceService>,
        content: Arc<ContentStore>,
        premium: Arc<PremiumDirectory>,
        delivery: Arc<dyn DocumentDelivery>,
        sessions: Arc<FeedbackSessions>,
        support_url: impl Into<String>,
    ) -> Self {
        Self {
            prices,
            content,
            premium,
            delivery,
            sessions,
            support_url: support_url.into(),
        }
    }

    pub fn prices(&self) -> &PriceService {
        &self.prices
    }

    pub fn sessions(&self) -> &FeedbackSessions {
        &self.sessions
    }

    pub async fn resolve(&self, token: &str) -> Route {
        match routes::match_fixed(token) {
            Some(route) => route,
            None => {
                let document = self.content.get_document().await;
                routes::match_dynamic(token, &document)
            }
        }
    }

    /// Placeholder shown while a price view is being fetched.
    pub fn loading_view(&self, token: &str) -> Option<RenderedView> {
        match routes::match_fixed(token)? {
            Route::Static(StaticRoute::Category(class)) => Some(views::category_loading(class)),
            Route::Detail {
                class,
                instrument_id,
            } => Some(views::detail_loading(class, &instrument_id)),
            _ => None,
        }
    }

    /// Resolve `token` for `user_id` in `chat_id` and render the result.
    ///
    /// Navigating anywhere other than the feedback prompt ends a pending
    /// feedback session; unmatched tokens change nothing.
    pub async fn transition(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        token: &str,
    ) -> Result<Transition> {
        let route = self.resolve(token).await;
        debug!(user_id, chat_id, token, route = ?route, "Resolved token");

        if route.navigates() && route != Route::Static(StaticRoute::FeedbackPrompt) {
            self.sessions.end(chat_id).await;
        }

        let transition = match route {
            Route::Static(target) => self.render_static(chat_id, target).await,
            Route::Detail {
                class,
                instrument_id,
            } => self.render_detail(class, instrument_id).await,
            Route::Content { kind, entry } => Transition::to(
                ViewId::DynamicContent {
                    kind,
                    id: entry.id.clone(),
                },
                views::content_entry(kind, &entry),
            ),
            Route::Premium => {
                let premium = self.premium.is_premium(user_id).await;
                let document = self.content.get_document().await;
                Transition::to(
                    ViewId::Premium,
                    views::premium_view(premium, &document.premium_links),
                )
            }
            Route::Bundle(product) => self.render_bundle(user_id, product).await?,
            Route::Unmatched => {
                debug!(token, "Unmatched token ignored");
                Transition::noop()
            }
        };

        Ok(transition)
    }

    async fn render_static(&self, chat_id: ChatId, target: StaticRoute) -> Transition {
        match target {
            StaticRoute::MainMenu => {
                let document = self.content.get_document().await;
                Transition::to(ViewId::Main, views::main_menu(&document, &self.support_url))
            }
            StaticRoute::GuideMenu => Transition::to(ViewId::GuideMenu, views::guide_menu()),
            StaticRoute::PortfolioMenu => {
                Transition::to(ViewId::PortfolioMenu, views::portfolio_menu())
            }
            StaticRoute::ToolMenu => Transition::to(ViewId::ToolMenu, views::tool_menu()),
            StaticRoute::MarketMenu => {
                Transition::to(ViewId::MarketMenu, views::market_menu(Utc::now()))
            }
            StaticRoute::Category(class) => {
                let batch = self.prices.get_category(class).await;
                info!(
                    class = %class,
                    loaded = batch.success_count(),
                    total = batch.total(),
                    "Category prices fetched"
                );
                Transition::to(ViewId::Category(class), views::category_view(&batch, Utc::now()))
            }
            StaticRoute::RefreshPrices => {
                self.prices.clear().await;
                info!("Price cache cleared");
                Transition::to(ViewId::PricesRefreshed, views::prices_refreshed())
            }
            StaticRoute::FeedbackPrompt => {
                self.sessions.begin(chat_id).await;
                Transition::to(ViewId::FeedbackPrompt, views::feedback_prompt())
            }
            StaticRoute::Disclaimer => Transition::to(ViewId::Disclaimer, views::disclaimer()),
            StaticRoute::Community => {
                let document = self.content.get_document().await;
                Transition::to(
                    ViewId::Community,
                    views::community(document.community_link.as_deref()),
                )
            }
        }
    }

    async fn render_detail(&self, class: InstrumentClass, instrument_id: String) -> Transition {
        let view = match self.prices.get_price(class, &instrument_id).await {
            Some(snapshot) => views::detail_view(class, &instrument_id, &snapshot, Utc::now()),
            None => views::detail_failure(class, &instrument_id),
        };
        Transition::to(
            ViewId::InstrumentDetail {
                class,
                instrument_id,
            },
            view,
        )
    }

    async fn render_bundle(&self, user_id: UserId, product: PremiumProduct) -> Result<Transition> {
        if !self.premium.is_premium(user_id).await {
            let document = self.content.get_document().await;
            let link = product.purchase_link(&document.premium_links);
            return Ok(Transition::stay(Output::Send(views::purchase_required(link))));
        }

        match self.delivery.locate(product).await? {
            Some(payload) => {
                info!(user_id, file = product.file_name(), "Delivering premium bundle");
                Ok(Transition::stay(Output::Document {
                    notice: views::bundle_sending(),
                    payload,
                    caption: views::bundle_caption(product),
                }))
            }
            None => {
                warn!(file = product.file_name(), "Premium bundle missing");
                Ok(Transition::stay(Output::Send(views::bundle_missing())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentSource;
    use crate::error::BotError;
    use crate::models::PriceSnapshot;
    use crate::prices::PriceProvider;
    use crate::storage::InMemoryUserStore;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    const ADMIN: UserId = 1;

    struct FixedProvider;

    #[async_trait::async_trait]
    impl PriceProvider for FixedProvider {
        async fn fetch(&self, _class: InstrumentClass, id: &str) -> Result<PriceSnapshot> {
            if id == "FAIL" {
                return Err(BotError::Upstream("down".to_string()));
            }
            Ok(PriceSnapshot::from_reference(id, None, 110.0, 100.0))
        }
    }

    #[derive(Default)]
    struct MemoryDelivery {
        files: Mutex<HashMap<&'static str, Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl DocumentDelivery for MemoryDelivery {
        async fn locate(&self, product: PremiumProduct) -> Result<Option<DocumentPayload>> {
            Ok(self
                .files
                .lock()
                .await
                .get(product.file_name())
                .map(|bytes| DocumentPayload {
                    file_name: product.file_name().to_string(),
                    bytes: bytes.clone(),
                }))
        }
    }

    fn document() -> ContentDocument {
        ContentDocument {
            welcome_text: Some("Hello".to_string()),
            guides: vec![ContentEntry {
                id: "guida1".to_string(),
                title: "Budgeting".to_string(),
                text: "Spend less than you earn".to_string(),
                link: "https://example.com/g1".to_string(),
            }],
            community_link: Some("https://t.me/mml".to_string()),
            ..ContentDocument::default()
        }
    }

    fn engine_with(delivery: Arc<MemoryDelivery>, premium: Vec<UserId>) -> NavigationEngine {
        let store = Arc::new(InMemoryUserStore::with_premium(premium));
        NavigationEngine::new(
            Arc::new(PriceService::new(Arc::new(FixedProvider))),
            Arc::new(ContentStore::new(Arc::new(StaticContentSource::new(document())))),
            Arc::new(PremiumDirectory::new(ADMIN, store)),
            delivery,
            Arc::new(FeedbackSessions::new()),
            "https://t.me/support",
        )
    }

    fn engine() -> NavigationEngine {
        engine_with(Arc::new(MemoryDelivery::default()), Vec::new())
    }

    fn edited_text(transition: &Transition) -> &str {
        match &transition.output {
            Output::Edit(view) => &view.text,
            other => panic!("expected edit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_back_main_renders_welcome() {
        let engine = engine();
        let first = engine.transition(5, 5, "back_main").await.unwrap();
        let second = engine.transition(5, 5, "back_main").await.unwrap();

        assert_eq!(first.next, Some(ViewId::Main));
        assert_eq!(edited_text(&first), "Hello");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_dynamic_content_and_unmatched() {
        let engine = engine();

        let guide = engine.transition(5, 5, "guida1").await.unwrap();
        assert_eq!(guide.next.as_ref().unwrap().to_string(), "dynamicContent(guide,guida1)");
        assert!(edited_text(&guide).starts_with("Budgeting\n\n"));

        assert!(engine.transition(5, 5, "guida9").await.unwrap().is_noop());
    }

    #[tokio::test]
    async fn test_detail_failure_view() {
        let engine = engine();
        let transition = engine.transition(5, 5, "stock_FAIL").await.unwrap();
        assert!(edited_text(&transition).contains("Could not fetch the price of FAIL"));
    }

    #[tokio::test]
    async fn test_feedback_session_ends_on_navigation() {
        let engine = engine();

        engine.transition(5, 50, "feedback_start").await.unwrap();
        assert!(engine.sessions().is_awaiting(50).await);

        engine.transition(5, 50, "unknown_token").await.unwrap();
        assert!(engine.sessions().is_awaiting(50).await);

        engine.transition(5, 50, "disclaimer").await.unwrap();
        assert!(!engine.sessions().is_awaiting(50).await);
    }

    #[tokio::test]
    async fn test_bundle_requires_premium() {
        let engine = engine();
        let transition = engine.transition(7, 7, "zip_completo").await.unwrap();

        assert_eq!(transition.next, None);
        match transition.output {
            Output::Send(view) => assert!(view.text.contains("👉 #")),
            other => panic!("expected purchase notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bundle_delivery_for_premium_users() {
        let delivery = Arc::new(MemoryDelivery::default());
        let engine = engine_with(delivery.clone(), vec![7]);

        let missing = engine.transition(7, 7, "zip_liste").await.unwrap();
        assert_eq!(missing.output, Output::Send(views::bundle_missing()));

        delivery
            .files
            .lock()
            .await
            .insert(PremiumProduct::Lists.file_name(), b"PK".to_vec());
        let found = engine.transition(ADMIN, 7, "zip_liste").await.unwrap();
        match found.output {
            Output::Document { payload, caption, .. } => {
                assert_eq!(payload.bytes, b"PK".to_vec());
                assert!(caption.contains("Liste Database MML.zip"));
            }
            other => panic!("expected document, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_loading_view_only_for_price_tokens() {
        let engine = engine();
        assert!(engine.loading_view("indices_prices").is_some());
        assert!(engine.loading_view("crypto_bitcoin").is_some());
        assert!(engine.loading_view("back_main").is_none());
        assert!(engine.loading_view("guida1").is_none());
    }
}

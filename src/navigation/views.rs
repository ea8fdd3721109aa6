//! Menu descriptors and view renderers
//!
//! Renderers are pure: same inputs, same `RenderedView`. Anything time
//! dependent takes the timestamp as an argument.

use crate::error::{THROTTLED_TEXT, VALIDATION_TEXT};
use crate::models::{ContentDocument, ContentEntry, InstrumentClass, PremiumLinks, PriceSnapshot};
use crate::navigation::ContentKind;
use crate::premium::PremiumProduct;
use crate::prices::{catalog, BatchQuote};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_WELCOME: &str =
    "Welcome to MoneyMentorLab! 💰\n\nYour personal assistant for managing your money.";

//
// ================= Descriptors =================
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    Callback { label: String, token: String },
    Link { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, token: impl Into<String>) -> Self {
        Button::Callback {
            label: label.into(),
            token: token.into(),
        }
    }

    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Link {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Button::Callback { token, .. } => Some(token.as_str()),
            Button::Link { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().filter_map(Button::token)
    }
}

/// Text plus an optional button grid, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedView {
    pub text: String,
    pub keyboard: Keyboard,
    pub markdown: bool,
    pub link_preview: bool,
}

impl RenderedView {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::default(),
            markdown: false,
            link_preview: true,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            markdown: true,
            ..Self::plain(text)
        }
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        self.keyboard.rows.push(row);
        self
    }

    pub fn button(self, button: Button) -> Self {
        self.row(vec![button])
    }

    pub fn without_preview(mut self) -> Self {
        self.link_preview = false;
        self
    }
}

fn back(label: &str, token: &str) -> Button {
    Button::callback(format!("⬅️ {}", label), token)
}

fn clock(now: DateTime<Utc>) -> String {
    now.format("%H:%M:%S UTC").to_string()
}

//
// ================= Formatting =================
//

fn group_thousands(int_part: &str) -> String {
    let digits: Vec<char> = int_part.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

/// Dollar amount without the sign: two decimals for equities and indices,
/// grouped thousands for crypto (four decimals below one dollar).
pub fn format_price(class: InstrumentClass, price: f64) -> String {
    match class {
        InstrumentClass::Index | InstrumentClass::Stock => format!("{:.2}", price),
        InstrumentClass::Crypto => {
            let raw = if price.abs() < 1.0 {
                format!("{:.4}", price.abs())
            } else {
                format!("{:.2}", price.abs())
            };
            let (int_part, frac) = raw.split_once('.').unwrap_or((raw.as_str(), ""));
            let sign = if price < 0.0 { "-" } else { "" };
            format!("{}{}.{}", sign, group_thousands(int_part), frac)
        }
    }
}

fn trend_icon(snapshot: &PriceSnapshot) -> &'static str {
    if snapshot.is_up() {
        "📈"
    } else {
        "📉"
    }
}

fn signed(value: f64) -> String {
    if value >= 0.0 {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    }
}

//
// ================= Static menus =================
//

pub fn main_menu(document: &ContentDocument, support_url: &str) -> RenderedView {
    let welcome = document
        .welcome_text
        .as_deref()
        .filter(|w| !w.trim().is_empty())
        .unwrap_or(DEFAULT_WELCOME);

    RenderedView::markdown(welcome)
        .button(Button::callback("📘 Guides", "guide_menu"))
        .button(Button::callback("💼 Portfolios", "portafogli_menu"))
        .button(Button::callback("📊 Tips & Tools", "tool"))
        .button(Button::callback("💰 Market Prices", "market_prices"))
        .button(Button::callback("💎 Premium Area", "premium"))
        .button(Button::link("💬 Support Chat", support_url))
        .button(Button::callback("⚠️ Disclaimer", "disclaimer"))
        .button(Button::callback("👥 Community", "community"))
        .button(Button::callback("🗣️ Send Feedback", "feedback_start"))
}

pub fn guide_menu() -> RenderedView {
    RenderedView::markdown("📘 *Practical guides*: pick the topic you want to explore:")
        .button(Button::callback("💰 Managing money", "guida1"))
        .button(Button::callback("🧱 Investment instruments", "guida2"))
        .button(Button::callback("🏗️ Build your portfolio", "guida3"))
        .button(Button::callback("⚠️ Most common mistakes", "guida4"))
        .button(back("Back", "back_main"))
}

pub fn portfolio_menu() -> RenderedView {
    RenderedView::markdown("💼 *MoneyMentorLab portfolios*: pick an investor profile:")
        .button(Button::callback("📊 Cautious portfolio", "p1"))
        .button(Button::callback("⚖️ Balanced portfolio", "p2"))
        .button(Button::callback("🚀 Dynamic portfolio", "p3"))
        .button(Button::callback("🌍 Global ETF portfolio", "p4"))
        .button(Button::callback("💸 Income portfolio", "p5"))
        .button(back("Back", "back_main"))
}

pub fn tool_menu() -> RenderedView {
    RenderedView::markdown("📊 *Tips & Tools*: pick an area:")
        .button(Button::callback("⚙️ Financial automation", "tool_auto"))
        .button(Button::callback("📱 Apps & mobile tracking", "tool_app"))
        .button(Button::callback("🧾 Tax planning", "tool_tax"))
        .button(Button::callback("🧘 Psychology & discipline", "tool_psy"))
        .button(Button::callback("🔔 Risks & safety nets", "tool_risk"))
        .button(back("Back", "back_main"))
}

pub fn market_menu(now: DateTime<Utc>) -> RenderedView {
    let text = format!(
        "💰 *Live Market Prices*\n\n*Live data from Yahoo Finance & CoinGecko*\n*Last update:* {}\n\nPick a category:",
        clock(now)
    );

    RenderedView::markdown(text)
        .button(Button::callback("📊 Stock Indices", "indices_prices"))
        .button(Button::callback("📈 Top 10 Stocks", "stock_prices"))
        .button(Button::callback("₿ Cryptocurrencies", "crypto_prices"))
        .button(Button::callback("🔄 Refresh All", "refresh_all_prices"))
        .button(back("Back to menu", "back_main"))
}

pub fn prices_refreshed() -> RenderedView {
    RenderedView::plain("✅ Price cache cleared! The next views will show fresh data.")
        .button(Button::callback("📊 View Indices", "indices_prices"))
        .button(Button::callback("📈 View Stocks", "stock_prices"))
        .button(Button::callback("₿ View Crypto", "crypto_prices"))
        .button(back("Prices menu", "market_prices"))
}

pub fn feedback_prompt() -> RenderedView {
    RenderedView::markdown(
        "🗣️ *Feedback mode on*\n\n\
         Write a message now with your *suggestion* or *report*.\n\
         We receive it right away and use it to improve the bot.\n\n\
         *Limit: 2000 characters*\n\n\
         To leave without sending, go back to the menu.",
    )
    .button(back("Back to menu", "back_main"))
}

pub fn disclaimer() -> RenderedView {
    RenderedView::markdown(
        "⚠️ *Money Mentor Lab Disclaimer*\n\n\
         Money Mentor Lab provides *educational and informational* material and tools.\n\
         It is in no way *personalised financial advice*, nor an operational, tax or investment recommendation.\n\n\
         All content in the bot, in the model portfolios and in the Premium files is for information only.\n\
         Every user is fully responsible for their own investment, money-management and planning decisions.\n\n\
         Past performance does not guarantee future results.\n\
         Money Mentor Lab accepts no liability for losses arising from direct or indirect use of this information.\n\n\
         For personalised decisions, always consult an *independent licensed financial advisor*.\n\n\
         📌 By continuing to use the bot you confirm you have read and accepted this disclaimer.",
    )
    .button(back("Back to main menu", "back_main"))
}

pub fn community(community_link: Option<&str>) -> RenderedView {
    RenderedView::markdown(
        "👥 *Money Mentor Lab Community*\n\n\
         This is the official channel for updates, bot releases and exclusive previews.\n\
         🎯 The dedicated group opens when the channel reaches *200 subscribers*.\n\n\
         Join and stay up to date:",
    )
    .without_preview()
    .button(Button::link("📣 Open the Channel", community_link.unwrap_or("#")))
    .button(back("Back to menu", "back_main"))
}

//
// ================= Dynamic content =================
//

pub fn content_entry(kind: ContentKind, entry: &ContentEntry) -> RenderedView {
    let (open_label, back_label) = match kind {
        ContentKind::Guide => ("👉 Open the full guide", "Back to Guides"),
        ContentKind::Portfolio => ("👉 Open the full portfolio", "Back to Portfolios"),
        ContentKind::Tool => ("👉 Open the full guide", "Back to Tips & Tools"),
    };

    RenderedView::markdown(format!("{}\n\n{}", entry.title, entry.text))
        .without_preview()
        .button(Button::link(open_label, entry.link.as_str()))
        .button(back(back_label, kind.menu_token()))
}

//
// ================= Prices =================
//

fn class_labels(class: InstrumentClass) -> (&'static str, &'static str, &'static str) {
    // (title, noun for the tally, "all" button)
    match class {
        InstrumentClass::Index => ("📊 *Global Stock Indices - Live Prices*", "indices loaded", "📊 All Indices"),
        InstrumentClass::Stock => ("📈 *Top 10 Stocks - Live Prices*", "stocks loaded", "📈 All Stocks"),
        InstrumentClass::Crypto => ("₿ *Cryptocurrencies - Live Prices*", "crypto loaded", "₿ All Crypto"),
    }
}

pub fn category_token(class: InstrumentClass) -> &'static str {
    match class {
        InstrumentClass::Index => "indices_prices",
        InstrumentClass::Stock => "stock_prices",
        InstrumentClass::Crypto => "crypto_prices",
    }
}

pub fn detail_prefix(class: InstrumentClass) -> &'static str {
    match class {
        InstrumentClass::Index => "index_",
        InstrumentClass::Stock => "stock_",
        InstrumentClass::Crypto => "crypto_",
    }
}

fn source_name(class: InstrumentClass) -> &'static str {
    match class {
        InstrumentClass::Crypto => "CoinGecko",
        _ => "Yahoo Finance",
    }
}

pub fn category_loading(class: InstrumentClass) -> RenderedView {
    let text = match class {
        InstrumentClass::Index => "📊 *Fetching stock indices...*",
        InstrumentClass::Stock => "📈 *Fetching stock prices...*",
        InstrumentClass::Crypto => "₿ *Fetching crypto prices...*",
    };
    RenderedView::markdown(text)
}

pub fn detail_loading(class: InstrumentClass, instrument_id: &str) -> RenderedView {
    let text = match class {
        InstrumentClass::Index => format!("📊 *Fetching index {}...*", instrument_id),
        InstrumentClass::Stock => format!("📈 *Fetching price of {}...*", instrument_id),
        InstrumentClass::Crypto => format!("₿ *Fetching price of {}...*", instrument_id),
    };
    RenderedView::markdown(text)
}

/// Ranked list in catalog order with one marker per instrument and the
/// success tally.
pub fn category_view(batch: &BatchQuote, now: DateTime<Utc>) -> RenderedView {
    let class = batch.class;
    let (title, noun, _) = class_labels(class);
    let mut text = format!("{}\n\n", title);

    for item in &batch.items {
        let name = catalog::display_name(class, &item.instrument_id);
        match &item.snapshot {
            Some(snap) => {
                text.push_str(&format!("{} *{}*\n", trend_icon(snap), name));
                text.push_str(&format!(
                    "💵 ${} | {}\n\n",
                    format_price(class, snap.price),
                    snap.change_percent_label()
                ));
            }
            None => {
                text.push_str(&format!("❌ *{}*\nData unavailable\n\n", name));
            }
        }
    }

    text.push_str(&format!(
        "_{}/{} {}_\n_Updated: {}_",
        batch.success_count(),
        batch.total(),
        noun,
        clock(now)
    ));

    let mut view = RenderedView::markdown(text);
    let buttons: Vec<Button> = catalog::instruments(class)
        .iter()
        .filter_map(|i| {
            i.button
                .map(|label| Button::callback(label, format!("{}{}", detail_prefix(class), i.id)))
        })
        .collect();
    for pair in buttons.chunks(2) {
        view = view.row(pair.to_vec());
    }

    view.button(Button::callback("🔄 Refresh", category_token(class)))
        .button(back("Prices menu", "market_prices"))
}

pub fn detail_view(
    class: InstrumentClass,
    instrument_id: &str,
    snapshot: &PriceSnapshot,
    now: DateTime<Utc>,
) -> RenderedView {
    let name = catalog::display_name(class, instrument_id);
    let price = format_price(class, snapshot.price);

    let mut text = format!("{} *{}*\n\n💵 *Price:* ${}\n", trend_icon(snapshot), name, price);
    match (class, snapshot.change) {
        (InstrumentClass::Crypto, _) | (_, None) => {
            text.push_str(&format!("🔄 *24h change:* {}\n", snapshot.change_percent_label()));
        }
        (_, Some(change)) => {
            text.push_str(&format!(
                "🔄 *Change:* {} ({})\n",
                signed(change),
                snapshot.change_percent_label()
            ));
        }
    }
    match class {
        InstrumentClass::Index => text.push_str(&format!("📊 *Symbol:* {}\n\n", instrument_id)),
        _ => text.push_str(&format!(
            "📊 *Name:* {}\n\n",
            snapshot.name.as_deref().unwrap_or("N/A")
        )),
    }
    text.push_str(&format!(
        "_Live data from {}_\n_Updated: {}_",
        source_name(class),
        clock(now)
    ));

    let (_, _, all_label) = class_labels(class);
    RenderedView::markdown(text)
        .button(Button::callback(
            "🔄 Refresh",
            format!("{}{}", detail_prefix(class), instrument_id),
        ))
        .button(Button::callback(all_label, category_token(class)))
        .button(back("Prices menu", "market_prices"))
}

pub fn detail_failure(class: InstrumentClass, instrument_id: &str) -> RenderedView {
    let name = catalog::display_name(class, instrument_id);
    RenderedView::plain(format!("❌ Could not fetch the price of {}", name))
        .button(Button::callback(
            "🔄 Retry",
            format!("{}{}", detail_prefix(class), instrument_id),
        ))
        .button(back("Prices menu", "market_prices"))
}

//
// ================= Premium =================
//

fn product_button(product: PremiumProduct, premium: bool, links: &PremiumLinks) -> Button {
    let (unlocked, locked) = match product {
        PremiumProduct::Tools => ("📂 Tools", "💳 Tools – 79€"),
        PremiumProduct::Portfolios => ("📂 Portfolios", "💳 Portfolios – 69€"),
        PremiumProduct::Lists => ("📂 Database", "💳 Lists – 49€"),
        PremiumProduct::Complete => ("💎 Complete", "💎 Complete – 129€"),
    };

    if premium {
        Button::callback(unlocked, product.token())
    } else {
        Button::link(locked, product.purchase_link(links).unwrap_or("#"))
    }
}

pub fn premium_view(premium: bool, links: &PremiumLinks) -> RenderedView {
    let status = if premium {
        "✅ *Premium access active!* You can download the material right away."
    } else {
        "🔒 *Access locked.* Buy one of the bundles below to unlock the Premium files."
    };

    let text = format!(
        "{}\n\n\
         💎 *MoneyMentorLab Premium Area*\n\n\
         Professional tools and material to manage, build and optimise your investments.\n\n\
         📦 *Pro Tools – 79 €*\n\
         💡 _Advanced money management and automation_\n\
         • FIRE Calculator\n• Financial Planner\n• PAC/PIC Simulator\n• Dividend, Compounding, TFR and Pension trackers\n\n\
         💼 *Model Portfolios – 69 €*\n\
         📊 _Tested, replicable strategies_\n\
         • 10 portfolios of great investors\n• ETFs for every profile: Cautious, Balanced, Dynamic, Global, Income\n• Real-estate and crypto portfolios\n\n\
         📊 *Lists & Database – 49 €*\n\
         📂 _Analysis and selection of the best instruments_\n\
         • MML ETF database (ISIN, TER, yield, category)\n• Filtered dividend stock and bond lists\n\n\
         💎 *Complete Bundle – 129 €*\n\
         🔥 _All Premium material in a single download_\n\
         • Includes Pro Tools + Portfolios + Database\n• Updates included, permanent access.\n\n\
         📜 *Important:*\n\
         Money Mentor Lab Premium material is *educational and informational*.\n\
         It is not personalised financial advice.\n\
         See the *Disclaimer* in the main menu for details.",
        status
    );

    RenderedView::markdown(text)
        .row(vec![
            product_button(PremiumProduct::Tools, premium, links),
            product_button(PremiumProduct::Portfolios, premium, links),
        ])
        .row(vec![
            product_button(PremiumProduct::Lists, premium, links),
            product_button(PremiumProduct::Complete, premium, links),
        ])
        .button(back("Back to main menu", "back_main"))
}

pub fn purchase_required(link: Option<&str>) -> RenderedView {
    RenderedView::markdown(format!(
        "⚠️ Access reserved to Premium users.\nTo buy:\n👉 {}",
        link.unwrap_or("#")
    ))
}

pub fn bundle_missing() -> RenderedView {
    RenderedView::plain("❌ File not found on the server. Please contact support.")
}

pub fn bundle_sending() -> RenderedView {
    RenderedView::plain("📦 Sending the file...")
}

pub fn bundle_caption(product: PremiumProduct) -> String {
    format!("✅ {} - Delivered!", product.file_name())
}

pub fn bundle_failed() -> RenderedView {
    RenderedView::plain("❌ Error while sending the file. Please try again later.")
}

//
// ================= Notices =================
//

pub fn throttled() -> RenderedView {
    RenderedView::plain(THROTTLED_TEXT)
}

pub fn feedback_rejected() -> RenderedView {
    RenderedView::plain(VALIDATION_TEXT)
        .button(back("Back to menu", "back_main"))
}

pub fn feedback_thanks() -> RenderedView {
    RenderedView::plain("✅ Thanks! Your feedback has been sent. We keep improving 🚀")
        .button(back("Back to menu", "back_main"))
}

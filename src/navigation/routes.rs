//! Token dispatch table
//!
//! Resolution order: exact static tokens, instrument prefixes (`index_`,
//! `stock_`, `crypto_`), dynamic content (guides, portfolios, tools), the
//! premium area, `zip_*` bundles. Anything else is `Route::Unmatched`.

use crate::models::{ContentDocument, ContentEntry, InstrumentClass};
use crate::navigation::ContentKind;
use crate::premium::PremiumProduct;

/// Targets reachable from a fixed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRoute {
    MainMenu,
    GuideMenu,
    PortfolioMenu,
    ToolMenu,
    MarketMenu,
    Category(InstrumentClass),
    RefreshPrices,
    FeedbackPrompt,
    Disclaimer,
    Community,
}

pub const EXACT_ROUTES: &[(&str, StaticRoute)] = &[
    ("back_main", StaticRoute::MainMenu),
    ("guide_menu", StaticRoute::GuideMenu),
    ("portafogli_menu", StaticRoute::PortfolioMenu),
    ("tool", StaticRoute::ToolMenu),
    ("market_prices", StaticRoute::MarketMenu),
    ("indices_prices", StaticRoute::Category(InstrumentClass::Index)),
    ("stock_prices", StaticRoute::Category(InstrumentClass::Stock)),
    ("crypto_prices", StaticRoute::Category(InstrumentClass::Crypto)),
    ("refresh_all_prices", StaticRoute::RefreshPrices),
    ("feedback_start", StaticRoute::FeedbackPrompt),
    ("disclaimer", StaticRoute::Disclaimer),
    ("community", StaticRoute::Community),
];

/// Tried in order; the first matching prefix wins.
pub const PREFIX_ROUTES: &[(&str, InstrumentClass)] = &[
    ("index_", InstrumentClass::Index),
    ("stock_", InstrumentClass::Stock),
    ("crypto_", InstrumentClass::Crypto),
];

pub const PREMIUM_TOKEN: &str = "premium";

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Static(StaticRoute),
    Detail {
        class: InstrumentClass,
        instrument_id: String,
    },
    Content {
        kind: ContentKind,
        entry: ContentEntry,
    },
    Premium,
    Bundle(PremiumProduct),
    Unmatched,
}

impl Route {
    /// Whether following this route moves the user away from the current view.
    pub fn navigates(&self) -> bool {
        !matches!(self, Route::Unmatched)
    }
}

/// Routes that do not depend on the content document: exact tokens and
/// instrument prefixes. An empty id after a prefix does not match.
pub fn match_fixed(token: &str) -> Option<Route> {
    if let Some((_, route)) = EXACT_ROUTES.iter().find(|(t, _)| *t == token) {
        return Some(Route::Static(*route));
    }

    PREFIX_ROUTES.iter().find_map(|(prefix, class)| {
        token
            .strip_prefix(prefix)
            .filter(|id| !id.is_empty())
            .map(|id| Route::Detail {
                class: *class,
                instrument_id: id.to_string(),
            })
    })
}

/// Everything after the fixed routes: dynamic content, then premium tokens.
pub fn match_dynamic(token: &str, document: &ContentDocument) -> Route {
    for kind in ContentKind::ALL {
        if let Some(entry) = kind.entries(document).iter().find(|e| e.id == token) {
            return Route::Content {
                kind,
                entry: entry.clone(),
            };
        }
    }

    if token == PREMIUM_TOKEN {
        return Route::Premium;
    }

    PremiumProduct::from_token(token)
        .map(Route::Bundle)
        .unwrap_or(Route::Unmatched)
}

pub fn resolve(token: &str, document: &ContentDocument) -> Route {
    match_fixed(token).unwrap_or_else(|| match_dynamic(token, document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ContentEntry {
        ContentEntry {
            id: id.to_string(),
            title: format!("Title {}", id),
            text: "Body".to_string(),
            link: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_exact_tokens() {
        let doc = ContentDocument::default();
        assert_eq!(
            resolve("back_main", &doc),
            Route::Static(StaticRoute::MainMenu)
        );
        assert_eq!(
            resolve("crypto_prices", &doc),
            Route::Static(StaticRoute::Category(InstrumentClass::Crypto))
        );
        assert_eq!(
            resolve("refresh_all_prices", &doc),
            Route::Static(StaticRoute::RefreshPrices)
        );
    }

    #[test]
    fn test_prefix_strips_instrument_id() {
        assert_eq!(
            match_fixed("index_^GSPC"),
            Some(Route::Detail {
                class: InstrumentClass::Index,
                instrument_id: "^GSPC".to_string()
            })
        );
        assert_eq!(match_fixed("stock_"), None);
    }

    #[test]
    fn test_prefix_beats_dynamic_content() {
        let doc = ContentDocument {
            guides: vec![entry("stock_AAPL")],
            ..ContentDocument::default()
        };

        assert_eq!(
            resolve("stock_AAPL", &doc),
            Route::Detail {
                class: InstrumentClass::Stock,
                instrument_id: "AAPL".to_string()
            }
        );
    }

    #[test]
    fn test_dynamic_content_collection_order() {
        let doc = ContentDocument {
            guides: vec![entry("guida1")],
            portfolios: vec![entry("p1"), entry("shared")],
            tools: vec![entry("shared")],
            ..ContentDocument::default()
        };

        assert!(matches!(
            resolve("guida1", &doc),
            Route::Content { kind: ContentKind::Guide, .. }
        ));
        assert!(matches!(
            resolve("shared", &doc),
            Route::Content { kind: ContentKind::Portfolio, .. }
        ));
    }

    #[test]
    fn test_premium_and_bundles() {
        let doc = ContentDocument::default();
        assert_eq!(resolve("premium", &doc), Route::Premium);
        assert_eq!(
            resolve("zip_liste", &doc),
            Route::Bundle(PremiumProduct::Lists)
        );
    }

    #[test]
    fn test_unknown_token_is_unmatched() {
        let doc = ContentDocument::default();
        assert_eq!(resolve("zip_unknown", &doc), Route::Unmatched);
        assert_eq!(resolve("", &doc), Route::Unmatched);
        assert!(!resolve("nope", &doc).navigates());
    }
}

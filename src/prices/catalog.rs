//! Fixed instrument lists shown by the category views

use crate::models::InstrumentClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub id: &'static str,
    pub name: &'static str,
    /// Button label used on the category view; None keeps it off the grid.
    pub button: Option<&'static str>,
}

const fn instrument(
    id: &'static str,
    name: &'static str,
    button: Option<&'static str>,
) -> Instrument {
    Instrument { id, name, button }
}

pub const INDICES: &[Instrument] = &[
    instrument("^GSPC", "S&P 500", Some("🇺🇸 S&P 500")),
    instrument("^DJI", "Dow Jones", Some("🇺🇸 Dow Jones")),
    instrument("^IXIC", "NASDAQ", Some("🇺🇸 NASDAQ")),
    instrument("^FTSE", "FTSE 100", Some("🇬🇧 FTSE 100")),
    instrument("^GDAXI", "DAX", Some("🇩🇪 DAX")),
    instrument("^FCHI", "CAC 40", Some("🇫🇷 CAC 40")),
    instrument("^N225", "Nikkei 225", None),
    instrument("^HSI", "Hang Seng", None),
    instrument("^BSESN", "SENSEX", None),
    instrument("^MIB", "FTSE MIB", None),
];

pub const STOCKS: &[Instrument] = &[
    instrument("AAPL", "AAPL", Some("🍎 AAPL details")),
    instrument("MSFT", "MSFT", Some("💻 MSFT details")),
    instrument("GOOGL", "GOOGL", Some("🔍 GOOGL details")),
    instrument("AMZN", "AMZN", Some("📦 AMZN details")),
    instrument("TSLA", "TSLA", Some("🚗 TSLA details")),
    instrument("META", "META", Some("👥 META details")),
    instrument("NVDA", "NVDA", Some("🎮 NVDA details")),
    instrument("JPM", "JPM", None),
    instrument("JNJ", "JNJ", None),
    instrument("V", "V", None),
];

pub const CRYPTO: &[Instrument] = &[
    instrument("bitcoin", "BITCOIN", Some("₿ BTC details")),
    instrument("ethereum", "ETHEREUM", Some("Ξ ETH details")),
    instrument("binancecoin", "BINANCECOIN", Some("💠 BNB details")),
    instrument("ripple", "RIPPLE", Some("✖️ XRP details")),
    instrument("cardano", "CARDANO", Some("🔶 ADA details")),
    instrument("solana", "SOLANA", Some("◎ SOL details")),
    instrument("polkadot", "POLKADOT", None),
    instrument("dogecoin", "DOGECOIN", None),
];

pub fn instruments(class: InstrumentClass) -> &'static [Instrument] {
    match class {
        InstrumentClass::Index => INDICES,
        InstrumentClass::Stock => STOCKS,
        InstrumentClass::Crypto => CRYPTO,
    }
}

/// Human name for an id, falling back to the id itself (upper-cased for
/// crypto slugs).
pub fn display_name(class: InstrumentClass, id: &str) -> String {
    instruments(class)
        .iter()
        .find(|i| i.id == id)
        .map(|i| i.name.to_string())
        .unwrap_or_else(|| match class {
            InstrumentClass::Crypto => id.to_uppercase(),
            _ => id.to_string(),
        })
}

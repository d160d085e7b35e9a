use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Crypto,
    Forex,
    Other,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Crypto => write!(f, "crypto"),
            Market::Forex => write!(f, "forex"),
            Market::Other => write!(f, "other"),
        }
    }
}

impl Market {
    pub fn from_str_loose(s: &str) -> Option<Market> {
        match s.to_ascii_lowercase().as_str() {
            "crypto" => Some(Market::Crypto),
            "forex" | "fx" => Some(Market::Forex),
            "other" => Some(Market::Other),
            _ => None,
        }
    }
}

/// Maps an instrument symbol to a market tag.
pub trait MarketClassifier: Send + Sync {
    fn classify(&self, symbol: &str) -> Market;
}

const CRYPTO_TICKERS: &[&str] = &[
    "BTC", "ETH", "XRP", "SOL", "ADA", "DOGE", "BNB", "LTC", "DOT", "AVAX", "MATIC", "LINK",
    "USDT",
];
const FOREX_TICKERS: &[&str] = &["EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "NZD", "USD"];

/// Substring match against fixed ticker lists. Crypto is checked first so
/// that `BTCUSD` is crypto rather than forex.
#[derive(Debug, Clone)]
pub struct TickerListClassifier {
    crypto: Vec<String>,
    forex: Vec<String>,
}

impl Default for TickerListClassifier {
    fn default() -> Self {
        Self::new(
            CRYPTO_TICKERS.iter().map(|s| s.to_string()).collect(),
            FOREX_TICKERS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl TickerListClassifier {
    pub fn new(crypto: Vec<String>, forex: Vec<String>) -> Self {
        Self {
            crypto: crypto.into_iter().map(|t| t.to_ascii_uppercase()).collect(),
            forex: forex.into_iter().map(|t| t.to_ascii_uppercase()).collect(),
        }
    }
}

impl MarketClassifier for TickerListClassifier {
    fn classify(&self, symbol: &str) -> Market {
        let sym = symbol.to_ascii_uppercase();
        if self.crypto.iter().any(|t| sym.contains(t.as_str())) {
            Market::Crypto
        } else if self.forex.iter().any(|t| sym.contains(t.as_str())) {
            Market::Forex
        } else {
            Market::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lists() {
        let c = TickerListClassifier::default();
        assert_eq!(c.classify("BTCUSD"), Market::Crypto);
        assert_eq!(c.classify("eth-usdt"), Market::Crypto);
        assert_eq!(c.classify("EURUSD"), Market::Forex);
        assert_eq!(c.classify("GBP/JPY"), Market::Forex);
        assert_eq!(c.classify("XAUXAG"), Market::Other);
    }

    #[test]
    fn custom_lists() {
        let c = TickerListClassifier::new(vec!["xau".into()], vec![]);
        assert_eq!(c.classify("XAUUSD"), Market::Crypto);
        assert_eq!(c.classify("EURUSD"), Market::Other);
    }
}

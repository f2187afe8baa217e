//! Currency and crypto keyword detection plus live quote lookups.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::ProxyError;

pub const CURRENCIES: [&str; 11] = [
    "USD", "PKR", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "CNY", "NZD", "INR",
];

/// Binance symbols quoted against USDT.
pub const CRYPTO_SYMBOLS: [&str; 5] = ["BTCUSDT", "ETHUSDT", "BNBUSDT", "XRPUSDT", "DOGEUSDT"];

const QUOTE_SUFFIX: &str = "USDT";
const DEFAULT_BASE_CURRENCY: &str = "USD";

pub const FOREX_UNAVAILABLE: &str = "⚠️ Forex rates unavailable.";
pub const CRYPTO_UNAVAILABLE: &str = "⚠️ Crypto prices unavailable.";

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("amount pattern is valid"))
}

fn upper_words(prompt: &str) -> Vec<String> {
    prompt.split_whitespace().map(str::to_uppercase).collect()
}

/// Currency codes that appear as whole words, in `CURRENCIES` order.
pub fn detect_currencies(prompt: &str) -> Vec<&'static str> {
    let words = upper_words(prompt);
    CURRENCIES
        .iter()
        .copied()
        .filter(|code| words.iter().any(|w| w.as_str() == *code))
        .collect()
}

/// First currency code mentioned in the prompt, USD when there is none.
pub fn detect_base_currency(prompt: &str) -> &'static str {
    upper_words(prompt)
        .iter()
        .find_map(|w| CURRENCIES.iter().copied().find(|code| w.as_str() == *code))
        .unwrap_or(DEFAULT_BASE_CURRENCY)
}

/// Symbols whose ticker ("btc", "doge", ...) occurs anywhere in the prompt.
pub fn detect_cryptos(prompt: &str) -> Vec<&'static str> {
    let prompt = prompt.to_lowercase();
    CRYPTO_SYMBOLS
        .iter()
        .copied()
        .filter(|symbol| prompt.contains(&ticker(symbol).to_lowercase()))
        .collect()
}

pub fn extract_amounts(prompt: &str) -> Vec<f64> {
    amount_pattern()
        .find_iter(prompt)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// "BTCUSDT" -> "BTC"
pub fn ticker(symbol: &str) -> &str {
    symbol.strip_suffix(QUOTE_SUFFIX).unwrap_or(symbol)
}

/// A rendered markdown table together with the figures it shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quotes {
    pub table: String,
    pub rates: Vec<(String, f64)>,
}

impl Quotes {
    fn unavailable(message: &str) -> Self {
        Self {
            table: message.to_string(),
            rates: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForexResponse {
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

pub struct MarketDataClient {
    http: reqwest::Client,
    exchangerate_base_url: String,
    exchangerate_api_key: Option<String>,
    binance_base_url: String,
}

impl MarketDataClient {
    pub fn new(
        http: reqwest::Client,
        exchangerate_base_url: impl Into<String>,
        exchangerate_api_key: Option<String>,
        binance_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            exchangerate_base_url: exchangerate_base_url.into(),
            exchangerate_api_key,
            binance_base_url: binance_base_url.into(),
        }
    }

    /// Rates from `base` to each target. Targets missing upstream get a
    /// "not available" row; a failed lookup degrades to a single notice.
    pub async fn fetch_forex(&self, base: &str, targets: &[&str]) -> Quotes {
        let conversion_rates = match self.forex_rates(base).await {
            Ok(rates) => rates,
            Err(e) => {
                warn!("Forex lookup for {} failed: {}", base, e);
                return Quotes::unavailable(FOREX_UNAVAILABLE);
            }
        };

        let mut quotes = Quotes {
            table: "| Currency Pair | Exchange Rate |\n| --- | --- |\n".to_string(),
            rates: Vec::new(),
        };
        for target in targets {
            match conversion_rates.get(*target) {
                Some(rate) => {
                    quotes.table.push_str(&format!("| {} to {} | {} |\n", base, target, rate));
                    quotes.rates.push((target.to_string(), *rate));
                }
                None => {
                    quotes
                        .table
                        .push_str(&format!("| {} to {} | ⚠️ Not available |\n", base, target));
                }
            }
        }
        quotes
    }

    /// USDT prices for each symbol; any failed lookup degrades the whole table.
    pub async fn fetch_crypto(&self, symbols: &[&str]) -> Quotes {
        let mut quotes = Quotes {
            table: "| Crypto | Price (USDT) |\n| --- | --- |\n".to_string(),
            rates: Vec::new(),
        };

        for symbol in symbols {
            match self.crypto_price(symbol).await {
                Ok(price) => {
                    quotes.table.push_str(&format!("| {} | {} |\n", symbol, price));
                    quotes.rates.push((symbol.to_string(), price));
                }
                Err(e) => {
                    warn!("Crypto price lookup for {} failed: {}", symbol, e);
                    return Quotes::unavailable(CRYPTO_UNAVAILABLE);
                }
            }
        }
        quotes
    }

    async fn forex_rates(&self, base: &str) -> Result<HashMap<String, f64>, ProxyError> {
        let key = self
            .exchangerate_api_key
            .as_deref()
            .ok_or(ProxyError::MissingApiKey("exchangerate"))?;
        let url = format!(
            "{}/v6/{}/latest/{}",
            self.exchangerate_base_url.trim_end_matches('/'),
            key,
            base
        );

        let response: ForexResponse = self.http.get(url).send().await?.json().await?;
        Ok(response.conversion_rates)
    }

    async fn crypto_price(&self, symbol: &str) -> Result<f64, ProxyError> {
        let url = format!(
            "{}/api/v3/ticker/price",
            self.binance_base_url.trim_end_matches('/')
        );

        let ticker: TickerPrice = self
            .http
            .get(url)
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        ticker
            .price
            .parse()
            .map_err(|e| ProxyError::ResponseError(format!("bad price {:?}: {}", ticker.price, e)))
    }
}

//! Chat replies that put live forex and crypto figures in front of an AI answer.

use tracing::{info, warn};

use super::completion::CompletionClient;
use super::market::{self, MarketDataClient, Quotes};

const BASE_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub struct ChatService {
    market: MarketDataClient,
    completion: CompletionClient,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Markdown tables converting `amount` with each fetched rate.
pub fn conversion_table(amount: f64, forex_rates: &[(String, f64)], crypto_prices: &[(String, f64)]) -> String {
    let mut table = String::new();

    if !forex_rates.is_empty() {
        table.push_str("| Currency | Converted Amount |\n| --- | --- |\n");
        for (currency, rate) in forex_rates {
            table.push_str(&format!("| {} | {} |\n", currency, round_to(amount * rate, 4)));
        }
    }

    if !crypto_prices.is_empty() {
        if !table.is_empty() {
            table.push('\n');
        }
        table.push_str("| Crypto | Amount |\n| --- | --- |\n");
        for (symbol, price) in crypto_prices {
            table.push_str(&format!(
                "| {} | {} |\n",
                market::ticker(symbol),
                round_to(amount / price, 8)
            ));
        }
    }

    table
}

pub fn system_prompt(forex_table: &str, crypto_table: &str) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    if !forex_table.is_empty() || !crypto_table.is_empty() {
        prompt.push_str(
            "\nBelow are the latest live rates fetched from APIs. \
             If the user asks for conversion, refer to the provided conversion table. \
             Do NOT repeat numbers already shown. Explain, summarize, or give advice.\n",
        );
        prompt.push_str(&format!(
            "Forex Rates:\n{}\nCrypto Prices:\n{}",
            forex_table, crypto_table
        ));
    }
    prompt
}

pub fn compose_reply(
    base_currency: &str,
    forex_table: &str,
    crypto_table: &str,
    conversions: &str,
    ai_reply: &str,
) -> String {
    let mut reply = String::new();
    if !forex_table.is_empty() {
        reply.push_str(&format!("💵 Forex Rates ({} Base):\n{}\n", base_currency, forex_table));
    }
    if !crypto_table.is_empty() {
        reply.push_str(&format!("💰 Crypto Prices:\n{}\n", crypto_table));
    }
    if !conversions.is_empty() {
        reply.push_str(&format!("🔢 Conversion based on your amount:\n{}\n", conversions));
    }
    reply.push_str(ai_reply);
    reply
}

impl ChatService {
    pub fn new(market: MarketDataClient, completion: CompletionClient) -> Self {
        Self { market, completion }
    }

    /// Never fails: each provider degrades to a notice or fallback text.
    pub async fn reply(&self, prompt: &str) -> String {
        let prompt = prompt.trim().to_lowercase();

        let base_currency = market::detect_base_currency(&prompt);
        let targets: Vec<&str> = market::detect_currencies(&prompt)
            .into_iter()
            .filter(|code| *code != base_currency)
            .collect();
        let cryptos = market::detect_cryptos(&prompt);

        let forex = if targets.is_empty() {
            Quotes::default()
        } else {
            self.market.fetch_forex(base_currency, &targets).await
        };
        let crypto = if cryptos.is_empty() {
            Quotes::default()
        } else {
            self.market.fetch_crypto(&cryptos).await
        };

        let conversions = market::extract_amounts(&prompt)
            .first()
            .copied()
            .filter(|amount| *amount != 0.0)
            .map(|amount| conversion_table(amount, &forex.rates, &crypto.rates))
            .unwrap_or_default();

        let system = system_prompt(&forex.table, &crypto.table);
        let ai_reply = match self.completion.complete(&system, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Completion failed, using fallback reply: {}", e);
                format!("AI fallback reply: {}", prompt)
            }
        };

        info!(
            base = base_currency,
            targets = targets.len(),
            cryptos = cryptos.len(),
            "Chat reply composed"
        );
        compose_reply(base_currency, &forex.table, &crypto.table, &conversions, &ai_reply)
    }
}

use crate::api::QuoteSource;
use crate::error::StockWatchError;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Hands out the session cookie the crumb is tied to.
pub const YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";
const QUOTE_PATH: &str = "/v7/finance/quote";
const CRUMB_PATH: &str = "/v1/test/getcrumb";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stockwatch/0.1)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<QuoteEntry>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEntry {
    symbol: String,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

/// Error shape of a rejected session: `{"finance": {"error": {...}}}`.
#[derive(Debug, Deserialize)]
struct FinanceEnvelope {
    finance: FinanceError,
}

#[derive(Debug, Deserialize)]
struct FinanceError {
    error: Option<ApiError>,
}

/// Batched quote lookups against the Yahoo Finance quote endpoint.
///
/// The endpoint only answers requests carrying a session cookie and the
/// matching crumb. Both are fetched lazily and dropped when the service
/// rejects them, so the next attempt starts a fresh session.
#[derive(Debug)]
pub struct YahooQuoteClient {
    client: Client,
    base_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooQuoteClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StockWatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String, StockWatchError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie page itself answers 404; only the Set-Cookie header matters.
        if let Err(e) = self.client.get(YAHOO_COOKIE_URL).send().await {
            debug!("Cookie request to {} failed: {}", YAHOO_COOKIE_URL, e);
        }

        let url = format!("{}{}", self.base_url, CRUMB_PATH);
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let crumb = parse_crumb(status, &text)?;

        info!("Opened quote session");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn forget_crumb(&self) {
        *self.crumb.lock().await = None;
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteClient {
    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, f64>, StockWatchError> {
        let crumb = self.crumb().await?;
        let url = format!("{}{}", self.base_url, QUOTE_PATH);
        let joined = symbols.join(",");
        debug!("Requesting quotes for {}", joined);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbols", joined.as_str()),
                ("fields", "regularMarketPrice"),
                ("crumb", crumb.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let result = parse_quote_response(status, &text, &joined);
        if let Err(StockWatchError::Unauthorized(_)) = &result {
            warn!("Quote session rejected, a new one will be opened");
            self.forget_crumb().await;
        }
        result
    }
}

fn parse_crumb(status: u16, text: &str) -> Result<String, StockWatchError> {
    let crumb = text.trim();
    if status >= 400 || crumb.is_empty() || crumb.starts_with('{') || crumb.starts_with('<') {
        return Err(StockWatchError::QuoteService {
            status,
            message: format!("no crumb issued: {}", crumb.chars().take(200).collect::<String>()),
        });
    }
    Ok(crumb.to_string())
}

/// Maps a raw quote response to prices. Entries without a price are left out;
/// deciding whether a price is usable is the caller's business.
fn parse_quote_response(
    status: u16,
    text: &str,
    requested: &str,
) -> Result<HashMap<String, f64>, StockWatchError> {
    if status == 404 {
        return Err(StockWatchError::SymbolNotFound(requested.to_string()));
    }
    if status == 401 {
        let reason = serde_json::from_str::<FinanceEnvelope>(text)
            .ok()
            .and_then(|envelope| envelope.finance.error)
            .map(|error| error.description)
            .unwrap_or_else(|| text.chars().take(200).collect());
        return Err(StockWatchError::Unauthorized(reason));
    }
    if status >= 400 {
        return Err(StockWatchError::QuoteService {
            status,
            message: text.chars().take(200).collect(),
        });
    }

    let envelope: QuoteEnvelope = serde_json::from_str(text)?;
    if let Some(error) = envelope.quote_response.error {
        if error.code.eq_ignore_ascii_case("not found") {
            return Err(StockWatchError::SymbolNotFound(requested.to_string()));
        }
        return Err(StockWatchError::QuoteService {
            status,
            message: format!("{}: {}", error.code, error.description),
        });
    }

    let mut prices = HashMap::new();
    for entry in envelope.quote_response.result {
        match entry.regular_market_price {
            Some(price) => {
                prices.insert(entry.symbol.to_uppercase(), price);
            }
            None => warn!("Quote for {} carried no market price", entry.symbol),
        }
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prices_from_batched_response() {
        let body = r#"{
            "quoteResponse": {
                "result": [
                    {"symbol": "PETR4.SA", "regularMarketPrice": 37.52, "currency": "BRL"},
                    {"symbol": "VALE3.SA", "regularMarketPrice": 61.1},
                    {"symbol": "ITUB4.SA"}
                ],
                "error": null
            }
        }"#;

        let prices = parse_quote_response(200, body, "PETR4.SA,VALE3.SA,ITUB4.SA").unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["PETR4.SA"], 37.52);
        assert_eq!(prices["VALE3.SA"], 61.1);
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let body = r#"{"quoteResponse": {"result": [], "error": null}}"#;
        let prices = parse_quote_response(200, body, "NOPE").unwrap();
        assert!(prices.is_empty());
    }

    #[test]
    fn not_found_maps_to_symbol_not_found() {
        assert!(matches!(
            parse_quote_response(404, "Not Found", "NOPE"),
            Err(StockWatchError::SymbolNotFound(s)) if s == "NOPE"
        ));

        let body = r#"{"quoteResponse": {"result": [], "error": {"code": "Not Found", "description": "No data found"}}}"#;
        assert!(matches!(
            parse_quote_response(200, body, "NOPE"),
            Err(StockWatchError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn server_errors_keep_status() {
        let result = parse_quote_response(503, "Service Unavailable", "PETR4.SA");
        match result {
            Err(err @ StockWatchError::QuoteService { status: 503, .. }) => {
                assert!(err.is_retryable())
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn invalid_crumb_is_unauthorized_and_retryable() {
        let body = r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#;

        match parse_quote_response(401, body, "PETR4.SA") {
            Err(err @ StockWatchError::Unauthorized(_)) => {
                assert_eq!(err.to_string(), "Quote service rejected the session: Invalid Crumb");
                assert!(err.is_retryable());
                assert!(!err.is_fatal());
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(matches!(
            parse_quote_response(401, "Unauthorized", "PETR4.SA"),
            Err(StockWatchError::Unauthorized(reason)) if reason == "Unauthorized"
        ));
    }

    #[test]
    fn crumb_is_plain_text() {
        assert_eq!(parse_crumb(200, "aBc/De.1\n").unwrap(), "aBc/De.1");
        assert!(parse_crumb(429, "Too Many Requests").is_err());
        assert!(parse_crumb(200, "").is_err());
        assert!(parse_crumb(200, r#"{"finance":{"error":{}}}"#).is_err());
    }

    #[test]
    fn malformed_body_is_a_json_error() {
        assert!(matches!(
            parse_quote_response(200, "<html>", "PETR4.SA"),
            Err(StockWatchError::JsonError(_))
        ));
    }
}

use super::retry::RetryPolicy;
use super::shutdown::Shutdown;
use crate::api::QuoteSource;
use crate::error::StockWatchError;
use async_trait::async_trait;
use log::{error, warn};
use std::collections::HashMap;

/// Where the monitoring loop gets its prices from.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Best-effort prices for `symbols`. Missing symbols mean "no update";
    /// only fatal or cancellation errors are returned.
    async fn fetch_all(&self, symbols: &[String]) -> Result<HashMap<String, f64>, StockWatchError>;

    async fn fetch_one(&self, symbol: &str) -> Result<f64, StockWatchError> {
        let symbol = symbol.to_uppercase();
        let prices = self.fetch_all(std::slice::from_ref(&symbol)).await?;
        prices
            .get(&symbol)
            .copied()
            .ok_or(StockWatchError::SymbolNotFound(symbol))
    }
}

/// Wraps a [`QuoteSource`] with retries and graceful degradation.
pub struct QuoteFetcher<S> {
    source: S,
    policy: RetryPolicy,
    shutdown: Shutdown,
}

impl<S: QuoteSource> QuoteFetcher<S> {
    pub fn new(source: S, policy: RetryPolicy, shutdown: Shutdown) -> Self {
        Self {
            source,
            policy,
            shutdown,
        }
    }
}

#[async_trait]
impl<S: QuoteSource> PriceFeed for QuoteFetcher<S> {
    async fn fetch_all(&self, symbols: &[String]) -> Result<HashMap<String, f64>, StockWatchError> {
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let outcome = self
            .policy
            .run(
                &self.shutdown,
                || self.source.quotes(&symbols),
                StockWatchError::is_retryable,
            )
            .await;

        let quotes = match outcome {
            Ok(quotes) => quotes,
            Err(e) if e.is_fatal() || matches!(e, StockWatchError::Cancelled) => return Err(e),
            Err(e) => {
                error!(
                    "Could not fetch quotes for {} after {} attempts: {}",
                    symbols.join(", "),
                    self.policy.max_retries() + 1,
                    e
                );
                return Ok(HashMap::new());
            }
        };

        let mut prices = HashMap::with_capacity(symbols.len());
        let mut missing = Vec::new();
        for symbol in &symbols {
            match quotes.get(symbol) {
                Some(&price) if price.is_finite() && price > 0.0 => {
                    prices.insert(symbol.clone(), price);
                }
                Some(&price) => {
                    warn!("Ignoring invalid price {} for {}", price, symbol);
                    missing.push(symbol.as_str());
                }
                None => missing.push(symbol.as_str()),
            }
        }
        if !missing.is_empty() {
            warn!("No quote available for: {}", missing.join(", "));
        }

        Ok(prices)
    }
}

pub mod yahoo;

use crate::error::StockWatchError;
use async_trait::async_trait;
use std::collections::HashMap;

/// One batched price lookup against an external quote service.
///
/// Symbols the service does not know are simply absent from the map.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, f64>, StockWatchError>;
}

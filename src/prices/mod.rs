pub mod binance;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use binance::BinancePriceSource;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("no valid prices found for {0:?}")]
    NoPrices(Vec<String>),
    #[error("price API rate limit reached")]
    RateLimited,
    #[error("price API error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Middleware(#[from] reqwest_middleware::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Результат запроса цен: найденные цены и тикеры без цены
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceQuote {
    pub prices: HashMap<String, f64>,
    pub missing: Vec<String>,
}

impl PriceQuote {
    pub fn from_prices(tickers: &[String], prices: HashMap<String, f64>) -> Self {
        let missing = tickers
            .iter()
            .filter(|t| !prices.contains_key(*t))
            .cloned()
            .collect();
        Self { prices, missing }
    }
}

/// Источник текущих цен в USD
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_current_prices(&self, tickers: &[String]) -> Result<PriceQuote, PriceError>;
}

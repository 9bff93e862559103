use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use super::types::{ApiErrorBody, TickerResponse};
use super::{PriceError, PriceQuote, PriceSource};

const RETRIES: u32 = 2;
const QUOTE_ASSET: &str = "USDT";
const INVALID_SYMBOL_CODE: i64 = -1121;

pub struct BinancePriceSource {
    client: ClientWithMiddleware,
    base_url: String,
}

impl BinancePriceSource {
    pub fn new(base_url: &str) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRIES);

        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn request(&self, query: (&str, String)) -> Result<HashMap<String, f64>, PriceError> {
        let response = self
            .client
            .get(format!("{}/api/v3/ticker/price", self.base_url))
            .header("Accept", "application/json")
            .query(&[query])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_ticker_response(status, &body)
    }

    /// Запрос по одному символу, когда пачку отклонили из-за неизвестного тикера
    async fn fetch_one_by_one(&self, tickers: &[String]) -> Result<HashMap<String, f64>, PriceError> {
        let mut prices = HashMap::new();

        for ticker in tickers {
            match self.request(("symbol", pair_for(ticker))).await {
                Ok(found) => prices.extend(found),
                Err(PriceError::RateLimited) => return Err(PriceError::RateLimited),
                Err(e) => log::warn!("⚠️ No price for {}: {}", ticker, e),
            }
        }

        Ok(prices)
    }
}

#[async_trait]
impl PriceSource for BinancePriceSource {
    async fn fetch_current_prices(&self, tickers: &[String]) -> Result<PriceQuote, PriceError> {
        if tickers.is_empty() {
            return Ok(PriceQuote::default());
        }

        let pairs: Vec<String> = tickers.iter().map(|t| pair_for(t)).collect();
        let symbols = serde_json::to_string(&pairs)?;

        let by_pair = match self.request(("symbols", symbols)).await {
            Ok(found) => found,
            Err(PriceError::Api { code, .. }) if code == INVALID_SYMBOL_CODE && tickers.len() > 1 => {
                log::warn!("⚠️ Batch price request rejected, retrying per symbol");
                self.fetch_one_by_one(tickers).await?
            }
            Err(e) => return Err(e),
        };

        let prices: HashMap<String, f64> = tickers
            .iter()
            .filter_map(|t| by_pair.get(&pair_for(t)).map(|price| (t.clone(), *price)))
            .collect();

        let quote = PriceQuote::from_prices(tickers, prices);
        if !quote.missing.is_empty() {
            log::warn!("⚠️ Prices not found for: {}", quote.missing.join(", "));
        }
        if quote.prices.is_empty() {
            return Err(PriceError::NoPrices(quote.missing));
        }

        log::debug!("📈 Fetched {} prices", quote.prices.len());
        Ok(quote)
    }
}

fn pair_for(ticker: &str) -> String {
    format!("{}{}", ticker.to_uppercase(), QUOTE_ASSET)
}

/// Разбирает ответ тикера: цены по символу пары
pub fn parse_ticker_response(status: StatusCode, body: &str) -> Result<HashMap<String, f64>, PriceError> {
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return Err(PriceError::RateLimited);
    }

    if !status.is_success() {
        return Err(match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) => PriceError::Api {
                code: err.code,
                msg: err.msg,
            },
            Err(_) => PriceError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            },
        });
    }

    let items = serde_json::from_str::<TickerResponse>(body)?.into_vec();
    let mut prices = HashMap::with_capacity(items.len());
    for item in items {
        match item.price.parse::<f64>() {
            Ok(price) if price > 0.0 => {
                prices.insert(item.symbol, price);
            }
            _ => log::warn!("⚠️ Skipping unparsable price '{}' for {}", item.price, item.symbol),
        }
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_response() {
        let body = r#"[{"symbol":"BTCUSDT","price":"64000.10"},{"symbol":"ETHUSDT","price":"3100.5"}]"#;
        let prices = parse_ticker_response(StatusCode::OK, body).expect("valid body");
        assert_eq!(prices.get("BTCUSDT"), Some(&64000.10));
        assert_eq!(prices.get("ETHUSDT"), Some(&3100.5));
    }

    #[test]
    fn parses_single_symbol_response() {
        let body = r#"{"symbol":"DOGEUSDT","price":"0.12"}"#;
        let prices = parse_ticker_response(StatusCode::OK, body).expect("valid body");
        assert_eq!(prices.len(), 1);
    }

    #[test]
    fn skips_garbage_prices() {
        let body = r#"[{"symbol":"BTCUSDT","price":"n/a"},{"symbol":"ETHUSDT","price":"3000"}]"#;
        let prices = parse_ticker_response(StatusCode::OK, body).expect("valid body");
        assert_eq!(prices.len(), 1);
    }

    #[test]
    fn maps_api_errors() {
        let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;
        match parse_ticker_response(StatusCode::BAD_REQUEST, body) {
            Err(PriceError::Api { code, .. }) => assert_eq!(code, INVALID_SYMBOL_CODE),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_ticker_response(StatusCode::TOO_MANY_REQUESTS, ""),
            Err(PriceError::RateLimited)
        ));
        assert!(matches!(
            parse_ticker_response(StatusCode::BAD_GATEWAY, "<html>"),
            Err(PriceError::Status { status: 502, .. })
        ));
    }

    #[test]
    fn quote_lists_missing_tickers() {
        let tickers = vec!["BTC".to_string(), "FOO".to_string()];
        let quote = PriceQuote::from_prices(&tickers, HashMap::from([("BTC".to_string(), 1.0)]));
        assert_eq!(quote.missing, vec!["FOO".to_string()]);
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Тикеры, которые всегда предлагаются при выборе актива
pub const DEFAULT_TICKERS: [&str; 4] = ["BTC", "ETH", "DOGE", "XRP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxSide {
    Buy,
    Sell,
}

impl TxSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxSide::Buy => "buy",
            TxSide::Sell => "sell",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            TxSide::Buy => "🟢",
            TxSide::Sell => "🔴",
        }
    }
}

impl fmt::Display for TxSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TxSide::Buy),
            "sell" => Ok(TxSide::Sell),
            other => Err(format!("unknown transaction side '{}'", other)),
        }
    }
}

/// Черновик транзакции, собираемый по шагам диалога
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxDraft {
    pub ticker: Option<String>,
    pub side: Option<TxSide>,
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub date: Option<NaiveDate>,
}

impl TxDraft {
    /// Сумма в USD считается только из количества и цены, отдельно не хранится
    pub fn usd_total(&self) -> Option<f64> {
        Some(self.amount? * self.price?)
    }

    pub fn into_new_transaction(&self, portfolio_id: i64) -> Option<NewTransaction> {
        Some(NewTransaction {
            portfolio_id,
            ticker: self.ticker.clone()?,
            side: self.side?,
            amount: self.amount?,
            price: self.price?,
            usd_amount: self.usd_total()?,
            date: self.date?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub portfolio_id: i64,
    pub ticker: String,
    pub side: TxSide,
    pub amount: f64,
    pub price: f64,
    pub usd_amount: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub portfolio_name: String,
    pub ticker: String,
    pub side: TxSide,
    pub amount: f64,
    pub price: f64,
    pub usd_amount: f64,
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_is_incomplete_until_every_field_is_set() {
        let mut draft = TxDraft {
            ticker: Some("BTC".into()),
            side: Some(TxSide::Buy),
            amount: Some(0.5),
            price: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 14),
        };
        assert_eq!(draft.usd_total(), None);
        assert!(draft.into_new_transaction(1).is_none());

        draft.price = Some(60_000.0);
        let tx = draft.into_new_transaction(7).expect("complete draft");
        assert_eq!(tx.portfolio_id, 7);
        assert_eq!(tx.usd_amount, 30_000.0);
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("BUY".parse::<TxSide>(), Ok(TxSide::Buy));
        assert_eq!(" sell ".parse::<TxSide>(), Ok(TxSide::Sell));
        assert!("hold".parse::<TxSide>().is_err());
    }
}

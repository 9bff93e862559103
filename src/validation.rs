//! Проверка пользовательского ввода: тикер, количество, цена, дата.
//! Функции чистые, отказ возвращается как данные.

use std::sync::LazyLock;

use chrono::{Days, Months, NaiveDate, Utc};
use regex::Regex;
use thiserror::Error;

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3,8}$").expect("valid ticker regex"));
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]{1,8})?$").expect("valid decimal regex"));
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date regex"));
static NAME_JUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("valid name regex"));
static UNDERSCORES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid underscore regex"));

pub const MIN_QUANTITY: f64 = 0.000_000_01;
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;
pub const MAX_PRICE: f64 = 10_000_000.0;
pub const MAX_PORTFOLIO_NAME_LEN: usize = 40;
const MAX_DATE_AGE_MONTHS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Ticker,
    Amount,
    Price,
    Date,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    Ticker(String),
    Amount(f64),
    Price(f64),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Wrong asset format. Use asset ticker like 'BTC', 'ETH', 'DOGE'. Only letters allowed, 3-8 characters total.")]
    TickerFormat,
    #[error("Wrong amount format. Use numbers with up to 8 decimal places (e.g. 1234, 12.345, 0.00000001).")]
    AmountFormat,
    #[error("Could not parse amount. Please try again.")]
    AmountUnparsable,
    #[error("Amount must be greater than 0.")]
    AmountNotPositive,
    #[error("Amount too small. Minimum allowed: 0.00000001.")]
    AmountTooSmall,
    #[error("Amount too large. Maximum allowed: 1,000,000,000.")]
    AmountTooLarge,
    #[error("Wrong price format. Use numbers with up to 8 decimal places (e.g. 1234, 12.345, 0.00000001).")]
    PriceFormat,
    #[error("Could not parse price. Please try again.")]
    PriceUnparsable,
    #[error("Price must be greater than 0.")]
    PriceNotPositive,
    #[error("Price too small. Minimum allowed: 0.00000001.")]
    PriceTooSmall,
    #[error("Price too high. Maximum allowed: 10,000,000.")]
    PriceTooLarge,
    #[error("Wrong date format. Use YYYY-MM-DD (e.g. 2024-06-14) or select a date button.")]
    DateFormat,
    #[error("Could not parse the date. Please use YYYY-MM-DD format.")]
    DateUnparsable,
    #[error("Transaction date cannot be in the future.")]
    DateInFuture,
    #[error("Transaction date is too old (maximum 10 years ago).")]
    DateTooOld,
    #[error("Portfolio name must contain letters or digits.")]
    PortfolioNameEmpty,
}

pub fn validate(raw: &str, kind: InputKind) -> Result<Validated, Rejection> {
    match kind {
        InputKind::Ticker => validate_ticker(raw).map(Validated::Ticker),
        InputKind::Amount => validate_amount(raw).map(Validated::Amount),
        InputKind::Price => validate_price(raw).map(Validated::Price),
        InputKind::Date => validate_date(raw).map(Validated::Date),
    }
}

pub fn validate_ticker(raw: &str) -> Result<String, Rejection> {
    let ticker = raw.trim().to_ascii_uppercase();
    if TICKER_RE.is_match(&ticker) {
        Ok(ticker)
    } else {
        Err(Rejection::TickerFormat)
    }
}

struct QuantityRules {
    max: f64,
    format: Rejection,
    unparsable: Rejection,
    not_positive: Rejection,
    too_small: Rejection,
    too_large: Rejection,
}

const AMOUNT_RULES: QuantityRules = QuantityRules {
    max: MAX_AMOUNT,
    format: Rejection::AmountFormat,
    unparsable: Rejection::AmountUnparsable,
    not_positive: Rejection::AmountNotPositive,
    too_small: Rejection::AmountTooSmall,
    too_large: Rejection::AmountTooLarge,
};

const PRICE_RULES: QuantityRules = QuantityRules {
    max: MAX_PRICE,
    format: Rejection::PriceFormat,
    unparsable: Rejection::PriceUnparsable,
    not_positive: Rejection::PriceNotPositive,
    too_small: Rejection::PriceTooSmall,
    too_large: Rejection::PriceTooLarge,
};

fn validate_quantity(raw: &str, rules: &QuantityRules) -> Result<f64, Rejection> {
    let raw = raw.trim();
    if !DECIMAL_RE.is_match(raw) {
        return Err(rules.format);
    }
    let value: f64 = raw.parse().map_err(|_| rules.unparsable)?;
    if value <= 0.0 {
        return Err(rules.not_positive);
    }
    if value > rules.max {
        return Err(rules.too_large);
    }
    if value < MIN_QUANTITY {
        return Err(rules.too_small);
    }
    Ok(value)
}

pub fn validate_amount(raw: &str) -> Result<f64, Rejection> {
    validate_quantity(raw, &AMOUNT_RULES)
}

pub fn validate_price(raw: &str) -> Result<f64, Rejection> {
    validate_quantity(raw, &PRICE_RULES)
}

pub fn validate_date(raw: &str) -> Result<NaiveDate, Rejection> {
    validate_date_at(raw, Utc::now().date_naive())
}

/// То же, что `validate_date`, но относительно заданного "сегодня" (UTC)
pub fn validate_date_at(raw: &str, today: NaiveDate) -> Result<NaiveDate, Rejection> {
    let token = raw.trim().to_ascii_lowercase();
    let shortcut = match token.as_str() {
        "today" => Some(today),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        "2days" | "2 days ago" => today.checked_sub_days(Days::new(2)),
        "1week" | "1 week ago" => today.checked_sub_days(Days::new(7)),
        "1month" | "1 month ago" => today.checked_sub_months(Months::new(1)),
        _ => None,
    };
    if let Some(date) = shortcut {
        return Ok(date);
    }

    if !DATE_RE.is_match(&token) {
        return Err(Rejection::DateFormat);
    }
    let date =
        NaiveDate::parse_from_str(&token, "%Y-%m-%d").map_err(|_| Rejection::DateUnparsable)?;

    if let Some(limit) = today.checked_add_days(Days::new(1)) {
        if date > limit {
            return Err(Rejection::DateInFuture);
        }
    }
    if let Some(oldest) = today.checked_sub_months(Months::new(MAX_DATE_AGE_MONTHS)) {
        if date < oldest {
            return Err(Rejection::DateTooOld);
        }
    }
    Ok(date)
}

/// Приводит имя портфеля к виду `my_crypto`
pub fn normalize_portfolio_name(raw: &str) -> Result<String, Rejection> {
    let spaced = raw.trim().replace(' ', "_");
    let cleaned = NAME_JUNK_RE.replace_all(&spaced, "").to_lowercase();
    let collapsed = UNDERSCORES_RE.replace_all(&cleaned, "_");
    let name: String = collapsed.chars().take(MAX_PORTFOLIO_NAME_LEN).collect();

    if name.chars().any(|c| c.is_ascii_alphanumeric()) {
        Ok(name)
    } else {
        Err(Rejection::PortfolioNameEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn ticker_is_trimmed_and_uppercased() {
        assert_eq!(validate_ticker("  eth "), Ok("ETH".to_string()));
        assert_eq!(validate_ticker("DoGe"), Ok("DOGE".to_string()));
    }

    #[test]
    fn ticker_rules() {
        assert_eq!(validate_ticker("bt"), Err(Rejection::TickerFormat));
        assert_eq!(validate_ticker("ABCDEFGHI"), Err(Rejection::TickerFormat));
        assert_eq!(validate_ticker("BTC1"), Err(Rejection::TickerFormat));
        assert_eq!(validate_ticker("B TC"), Err(Rejection::TickerFormat));
    }

    #[test]
    fn only_ascii_letters_and_digits_pass() {
        assert_eq!(validate_ticker("ßtc"), Err(Rejection::TickerFormat));
        assert_eq!(validate_ticker("ёth"), Err(Rejection::TickerFormat));
        assert_eq!(validate_amount("١٢"), Err(Rejection::AmountFormat));
        assert_eq!(validate_price("１００"), Err(Rejection::PriceFormat));
        assert_eq!(
            validate_date_at("٢٠٢٤-٠٦-٠١", day(2024, 6, 14)),
            Err(Rejection::DateFormat)
        );
    }

    #[test]
    fn amount_decimal_places() {
        assert_eq!(validate_amount("12.345678901"), Err(Rejection::AmountFormat));
        assert_eq!(validate_amount("12.3"), Ok(12.3));
        assert_eq!(validate_amount("0.00000001"), Ok(0.000_000_01));
        assert_eq!(validate_amount("1,5"), Err(Rejection::AmountFormat));
        assert_eq!(validate_amount("-1"), Err(Rejection::AmountFormat));
    }

    #[test]
    fn amount_bounds_have_distinct_reasons() {
        assert_eq!(validate_amount("0"), Err(Rejection::AmountNotPositive));
        assert_eq!(validate_amount("0.00000000"), Err(Rejection::AmountNotPositive));
        assert_eq!(validate_amount("1000000000"), Ok(MAX_AMOUNT));
        assert_eq!(validate_amount("1000000000.01"), Err(Rejection::AmountTooLarge));
    }

    #[test]
    fn price_has_its_own_ceiling() {
        assert_eq!(validate_price("10000000"), Ok(MAX_PRICE));
        assert_eq!(validate_price("10000001"), Err(Rejection::PriceTooLarge));
        assert_eq!(validate_price("abc"), Err(Rejection::PriceFormat));
        assert_eq!(validate_price("0"), Err(Rejection::PriceNotPositive));
    }

    #[test]
    fn date_shortcuts() {
        let today = day(2024, 3, 31);
        assert_eq!(validate_date_at("Today", today), Ok(today));
        assert_eq!(validate_date_at("yesterday", today), Ok(day(2024, 3, 30)));
        assert_eq!(validate_date_at("2 days ago", today), Ok(day(2024, 3, 29)));
        assert_eq!(validate_date_at("2days", today), Ok(day(2024, 3, 29)));
        assert_eq!(validate_date_at("1week", today), Ok(day(2024, 3, 24)));
        assert_eq!(validate_date_at("1 month ago", today), Ok(day(2024, 2, 29)));
    }

    #[test]
    fn explicit_dates() {
        let today = day(2024, 6, 14);
        assert_eq!(validate_date_at("2024-06-01", today), Ok(day(2024, 6, 1)));
        assert_eq!(validate_date_at("2024-06-15", today), Ok(day(2024, 6, 15)));
        assert_eq!(validate_date_at("2024-06-16", today), Err(Rejection::DateInFuture));
        assert_eq!(validate_date_at("2014-06-13", today), Err(Rejection::DateTooOld));
        assert_eq!(validate_date_at("2014-06-14", today), Ok(day(2014, 6, 14)));
        assert_eq!(validate_date_at("2024-02-30", today), Err(Rejection::DateUnparsable));
        assert_eq!(validate_date_at("14.06.2024", today), Err(Rejection::DateFormat));
    }

    #[test]
    fn dispatches_by_kind() {
        assert_eq!(
            validate("btc", InputKind::Ticker),
            Ok(Validated::Ticker("BTC".into()))
        );
        assert_eq!(validate("2", InputKind::Price), Ok(Validated::Price(2.0)));
        assert_eq!(validate("x", InputKind::Amount), Err(Rejection::AmountFormat));
    }

    #[test]
    fn portfolio_names_are_normalized() {
        assert_eq!(normalize_portfolio_name("My_Crypto"), Ok("my_crypto".into()));
        assert_eq!(normalize_portfolio_name("Long  term!! bag"), Ok("long_term_bag".into()));
        assert_eq!(normalize_portfolio_name("***"), Err(Rejection::PortfolioNameEmpty));
        assert_eq!(normalize_portfolio_name(&"a".repeat(60)).map(|n| n.len()), Ok(40));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn validation_is_deterministic(raw in ".{0,24}", kind in prop_oneof![
                Just(InputKind::Ticker),
                Just(InputKind::Amount),
                Just(InputKind::Price),
                Just(InputKind::Date),
            ]) {
                prop_assert_eq!(validate(&raw, kind), validate(&raw, kind));
            }

            #[test]
            fn accepted_tickers_are_upper_ascii(raw in "[a-zA-Z]{1,10}") {
                if let Ok(ticker) = validate_ticker(&raw) {
                    prop_assert!(ticker.chars().all(|c| c.is_ascii_uppercase()));
                    prop_assert!((3..=8).contains(&ticker.len()));
                }
            }

            #[test]
            fn accepted_amounts_are_in_range(raw in "[0-9]{1,11}(\\.[0-9]{1,9})?") {
                if let Ok(value) = validate_amount(&raw) {
                    prop_assert!(value >= MIN_QUANTITY && value <= MAX_AMOUNT);
                }
            }

            #[test]
            fn normalized_names_use_safe_alphabet(raw in ".{0,80}") {
                if let Ok(name) = normalize_portfolio_name(&raw) {
                    prop_assert!(name.len() <= MAX_PORTFOLIO_NAME_LEN);
                    prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
                    prop_assert!(!name.contains("__"));
                }
            }
        }
    }
}

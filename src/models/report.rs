use std::collections::HashMap;

/// Агрегат по активу для расчёта P&L
#[derive(Debug, Clone, PartialEq)]
pub struct AssetAggregate {
    pub ticker: String,
    pub total_amount: f64,
    /// Покупки минус продажи в USD, может быть отрицательным
    pub net_invested_usd: f64,
}

/// Процент P&L. `PureProfit` - вложения уже выведены полностью, отношение не считается.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PnlPercent {
    Ratio(f64),
    PureProfit,
}

pub fn pnl_percent(invested: f64, current_value: f64) -> PnlPercent {
    if invested > 0.0 {
        PnlPercent::Ratio((current_value / invested - 1.0) * 100.0)
    } else if invested < 0.0 {
        PnlPercent::PureProfit
    } else {
        PnlPercent::Ratio(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionPnl {
    pub ticker: String,
    pub amount: f64,
    pub invested: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub current_value: f64,
    pub pnl_usd: f64,
    pub pnl_percent: PnlPercent,
}

impl PositionPnl {
    /// Цена, при которой позиция выходит в ноль
    pub fn break_even_price(&self) -> Option<f64> {
        if self.amount > 0.0 && self.invested > 0.0 {
            Some(self.invested / self.amount)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PnlReport {
    pub positions: Vec<PositionPnl>,
    pub skipped: Vec<String>,
    pub total_invested: f64,
    pub total_value: f64,
}

impl PnlReport {
    pub fn total_pnl(&self) -> f64 {
        self.total_value - self.total_invested
    }

    pub fn total_percent(&self) -> PnlPercent {
        pnl_percent(self.total_invested, self.total_value)
    }
}

pub fn build_pnl_report(aggregates: &[AssetAggregate], prices: &HashMap<String, f64>) -> PnlReport {
    let mut report = PnlReport::default();

    for agg in aggregates {
        let Some(&price) = prices.get(&agg.ticker) else {
            report.skipped.push(agg.ticker.clone());
            continue;
        };

        let current_value = agg.total_amount * price;
        let avg_price = if agg.total_amount > 0.0 {
            agg.net_invested_usd / agg.total_amount
        } else {
            0.0
        };

        report.total_invested += agg.net_invested_usd;
        report.total_value += current_value;
        report.positions.push(PositionPnl {
            ticker: agg.ticker.clone(),
            amount: agg.total_amount,
            invested: agg.net_invested_usd,
            avg_price,
            current_price: price,
            current_value,
            pnl_usd: current_value - agg.net_invested_usd,
            pnl_percent: pnl_percent(agg.net_invested_usd, current_value),
        });
    }

    report
}

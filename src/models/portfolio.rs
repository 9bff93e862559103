use sqlx::FromRow;

/// Максимум портфелей на пользователя
pub const PORTFOLIO_LIMIT: i64 = 2;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_default: bool,
}

/// Позиция по одному активу внутри портфеля
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioAsset {
    pub ticker: String,
    pub total_amount: f64,
    pub total_usd: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub name: String,
    pub assets: Vec<PortfolioAsset>,
}

impl PortfolioSummary {
    pub fn total_usd(&self) -> f64 {
        self.assets.iter().map(|a| a.total_usd).sum()
    }
}

use std::collections::BTreeMap;

use super::{Database, StoreError, StoreResult};
use crate::models::{Portfolio, PortfolioAsset, PortfolioSummary, PORTFOLIO_LIMIT};

impl Database {
    pub async fn portfolio_exists(&self, user_id: i64) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM portfolios WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn portfolio_name_exists(&self, user_id: i64, name: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM portfolios WHERE user_id = $1 AND name = $2)",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn reached_portfolio_limit(&self, user_id: i64) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM portfolios WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count >= PORTFOLIO_LIMIT)
    }

    /// Первый портфель пользователя становится портфелем по умолчанию
    pub async fn create_portfolio(&self, user_id: i64, name: &str, description: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO portfolios (user_id, name, description, is_default)
            VALUES ($1, $2, $3, NOT EXISTS(SELECT 1 FROM portfolios WHERE user_id = $1))
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(description)
        .execute(&self.pool)
        .await?;

        log::info!("📁 Portfolio '{}' created for user {}", name, user_id);
        Ok(())
    }

    pub async fn rename_portfolio(&self, user_id: i64, old_name: &str, new_name: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE portfolios SET name = $3 WHERE user_id = $1 AND name = $2")
            .bind(user_id)
            .bind(old_name)
            .bind(new_name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("portfolio '{}'", old_name)));
        }
        Ok(())
    }

    pub async fn delete_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM portfolios WHERE user_id = $1 AND name = $2")
            .bind(user_id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("portfolio '{}'", name)));
        }
        log::info!("🗑 Portfolio '{}' deleted for user {}", name, user_id);
        Ok(())
    }

    pub async fn default_portfolio(&self, user_id: i64) -> StoreResult<Option<Portfolio>> {
        let portfolio = sqlx::query_as::<_, Portfolio>(
            r#"
            SELECT id, name, description, is_default
            FROM portfolios
            WHERE user_id = $1 AND is_default
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(portfolio)
    }

    pub async fn change_default_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE portfolios SET is_default = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("UPDATE portfolios SET is_default = true WHERE user_id = $1 AND name = $2")
            .bind(user_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;

        // Без commit транзакция откатится при drop
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("portfolio '{}'", name)));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_portfolios(&self, user_id: i64, only_non_default: bool) -> StoreResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM portfolios
            WHERE user_id = $1 AND (NOT $2 OR NOT is_default)
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .bind(only_non_default)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Чистые позиции по портфелям, только с положительным остатком
    pub async fn portfolio_summaries(&self, user_id: i64) -> StoreResult<Vec<PortfolioSummary>> {
        let rows = sqlx::query_as::<_, (String, String, f64, f64)>(
            r#"
            SELECT p.name,
                   t.asset,
                   SUM(CASE WHEN t.type = 'buy' THEN t.asset_amount ELSE -t.asset_amount END) AS total_amount,
                   SUM(CASE WHEN t.type = 'buy' THEN t.amount_usd ELSE -t.amount_usd END) AS total_usd
            FROM portfolios p
            JOIN transactions t ON t.portfolio_id = p.id
            WHERE p.user_id = $1
            GROUP BY p.name, t.asset
            HAVING SUM(CASE WHEN t.type = 'buy' THEN t.asset_amount ELSE -t.asset_amount END) > 0
            ORDER BY p.name, t.asset
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: BTreeMap<String, Vec<PortfolioAsset>> = BTreeMap::new();
        for (name, ticker, total_amount, total_usd) in rows {
            grouped.entry(name).or_default().push(PortfolioAsset {
                ticker,
                total_amount,
                total_usd,
            });
        }

        Ok(grouped
            .into_iter()
            .map(|(name, assets)| PortfolioSummary { name, assets })
            .collect())
    }
}

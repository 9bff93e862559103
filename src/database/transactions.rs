use chrono::NaiveDate;

use super::{Database, StoreError, StoreResult};
use crate::models::{AssetAggregate, NewTransaction, Transaction, TxSide};

type TransactionRow = (i64, String, String, String, f64, f64, f64, NaiveDate);

impl Database {
    pub async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
            (portfolio_id, asset, type, asset_amount, asset_price, amount_usd, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tx.portfolio_id)
        .bind(&tx.ticker)
        .bind(tx.side.as_str())
        .bind(tx.amount)
        .bind(tx.price)
        .bind(tx.usd_amount)
        .bind(tx.date)
        .execute(&self.pool)
        .await?;

        log::info!(
            "💾 Transaction saved: {} {} {} into portfolio {}",
            tx.side,
            tx.amount,
            tx.ticker,
            tx.portfolio_id
        );
        Ok(())
    }

    pub async fn last_transactions(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT t.id, p.name, t.asset, t.type, t.asset_amount, t.asset_price, t.amount_usd, t.transaction_date
            FROM transactions t
            JOIN portfolios p ON p.id = t.portfolio_id
            WHERE p.user_id = $1
            ORDER BY t.transaction_date DESC, t.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, portfolio_name, ticker, side, amount, price, usd_amount, date)| {
                let side = side.parse::<TxSide>().map_err(StoreError::Corrupted)?;
                Ok(Transaction {
                    id,
                    portfolio_name,
                    ticker,
                    side,
                    amount,
                    price,
                    usd_amount,
                    date,
                })
            })
            .collect()
    }

    /// Удаляет транзакцию, только если она принадлежит пользователю
    pub async fn delete_transaction(&self, user_id: i64, tx_id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM transactions t
            USING portfolios p
            WHERE t.portfolio_id = p.id AND p.user_id = $1 AND t.id = $2
            "#,
        )
        .bind(user_id)
        .bind(tx_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("transaction {}", tx_id)));
        }
        Ok(())
    }

    pub async fn top_tickers(&self, user_id: i64, limit: i64) -> StoreResult<Vec<String>> {
        let tickers: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.asset
            FROM transactions t
            JOIN portfolios p ON p.id = t.portfolio_id
            WHERE p.user_id = $1
            GROUP BY t.asset
            ORDER BY COUNT(*) DESC, t.asset
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickers)
    }

    pub async fn report_aggregates(&self, user_id: i64) -> StoreResult<Vec<AssetAggregate>> {
        let rows = sqlx::query_as::<_, (String, f64, f64)>(
            r#"
            SELECT t.asset,
                   SUM(CASE WHEN t.type = 'buy' THEN t.asset_amount ELSE -t.asset_amount END) AS total_amount,
                   SUM(CASE WHEN t.type = 'buy' THEN t.amount_usd ELSE -t.amount_usd END) AS net_invested
            FROM transactions t
            JOIN portfolios p ON p.id = t.portfolio_id
            WHERE p.user_id = $1
            GROUP BY t.asset
            HAVING SUM(CASE WHEN t.type = 'buy' THEN t.asset_amount ELSE -t.asset_amount END) > 0
            ORDER BY t.asset
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(ticker, total_amount, net_invested_usd)| AssetAggregate {
                ticker,
                total_amount,
                net_invested_usd,
            })
            .collect())
    }
}

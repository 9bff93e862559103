mod portfolios;
mod transactions;
mod users;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

use crate::models::{AssetAggregate, NewTransaction, Portfolio, PortfolioSummary, Transaction};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("corrupted row: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Хранилище пользователей, портфелей и транзакций
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn user_exists(&self, telegram_id: i64) -> StoreResult<bool>;
    async fn create_user_if_not_exists(&self, telegram_id: i64, username: &str) -> StoreResult<()>;
    async fn lookup_user_id(&self, telegram_id: i64) -> StoreResult<Option<i64>>;

    async fn portfolio_exists(&self, user_id: i64) -> StoreResult<bool>;
    async fn portfolio_name_exists(&self, user_id: i64, name: &str) -> StoreResult<bool>;
    async fn reached_portfolio_limit(&self, user_id: i64) -> StoreResult<bool>;
    async fn create_portfolio(&self, user_id: i64, name: &str, description: &str) -> StoreResult<()>;
    async fn rename_portfolio(&self, user_id: i64, old_name: &str, new_name: &str) -> StoreResult<()>;
    async fn delete_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()>;
    async fn default_portfolio(&self, user_id: i64) -> StoreResult<Option<Portfolio>>;
    async fn change_default_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()>;
    async fn list_portfolios(&self, user_id: i64, only_non_default: bool) -> StoreResult<Vec<String>>;

    async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<()>;
    async fn last_transactions(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Transaction>>;
    async fn delete_transaction(&self, user_id: i64, tx_id: i64) -> StoreResult<()>;
    async fn top_tickers(&self, user_id: i64, limit: i64) -> StoreResult<Vec<String>>;
    async fn portfolio_summaries(&self, user_id: i64) -> StoreResult<Vec<PortfolioSummary>>;
    async fn report_aggregates(&self, user_id: i64) -> StoreResult<Vec<AssetAggregate>>;
}

#[derive(Clone, Debug)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                telegram_id BIGINT NOT NULL UNIQUE,
                username TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolios (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                is_default BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                UNIQUE (user_id, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id BIGSERIAL PRIMARY KEY,
                portfolio_id BIGINT NOT NULL REFERENCES portfolios(id) ON DELETE CASCADE,
                asset TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('buy', 'sell')),
                asset_amount DOUBLE PRECISION NOT NULL,
                asset_price DOUBLE PRECISION NOT NULL,
                amount_usd DOUBLE PRECISION NOT NULL,
                transaction_date DATE NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Индексы
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_portfolios_user ON portfolios(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_portfolio ON transactions(portfolio_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Persistence for Database {
    async fn user_exists(&self, telegram_id: i64) -> StoreResult<bool> {
        Database::user_exists(self, telegram_id).await
    }

    async fn create_user_if_not_exists(&self, telegram_id: i64, username: &str) -> StoreResult<()> {
        Database::create_user_if_not_exists(self, telegram_id, username).await
    }

    async fn lookup_user_id(&self, telegram_id: i64) -> StoreResult<Option<i64>> {
        Database::lookup_user_id(self, telegram_id).await
    }

    async fn portfolio_exists(&self, user_id: i64) -> StoreResult<bool> {
        Database::portfolio_exists(self, user_id).await
    }

    async fn portfolio_name_exists(&self, user_id: i64, name: &str) -> StoreResult<bool> {
        Database::portfolio_name_exists(self, user_id, name).await
    }

    async fn reached_portfolio_limit(&self, user_id: i64) -> StoreResult<bool> {
        Database::reached_portfolio_limit(self, user_id).await
    }

    async fn create_portfolio(&self, user_id: i64, name: &str, description: &str) -> StoreResult<()> {
        Database::create_portfolio(self, user_id, name, description).await
    }

    async fn rename_portfolio(&self, user_id: i64, old_name: &str, new_name: &str) -> StoreResult<()> {
        Database::rename_portfolio(self, user_id, old_name, new_name).await
    }

    async fn delete_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()> {
        Database::delete_portfolio(self, user_id, name).await
    }

    async fn default_portfolio(&self, user_id: i64) -> StoreResult<Option<Portfolio>> {
        Database::default_portfolio(self, user_id).await
    }

    async fn change_default_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()> {
        Database::change_default_portfolio(self, user_id, name).await
    }

    async fn list_portfolios(&self, user_id: i64, only_non_default: bool) -> StoreResult<Vec<String>> {
        Database::list_portfolios(self, user_id, only_non_default).await
    }

    async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<()> {
        Database::add_transaction(self, tx).await
    }

    async fn last_transactions(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Transaction>> {
        Database::last_transactions(self, user_id, limit).await
    }

    async fn delete_transaction(&self, user_id: i64, tx_id: i64) -> StoreResult<()> {
        Database::delete_transaction(self, user_id, tx_id).await
    }

    async fn top_tickers(&self, user_id: i64, limit: i64) -> StoreResult<Vec<String>> {
        Database::top_tickers(self, user_id, limit).await
    }

    async fn portfolio_summaries(&self, user_id: i64) -> StoreResult<Vec<PortfolioSummary>> {
        Database::portfolio_summaries(self, user_id).await
    }

    async fn report_aggregates(&self, user_id: i64) -> StoreResult<Vec<AssetAggregate>> {
        Database::report_aggregates(self, user_id).await
    }
}

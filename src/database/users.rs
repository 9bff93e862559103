use super::{Database, StoreResult};

impl Database {
    pub async fn user_exists(&self, telegram_id: i64) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE telegram_id = $1)")
                .bind(telegram_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn create_user_if_not_exists(&self, telegram_id: i64, username: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (telegram_id, username)
            VALUES ($1, $2)
            ON CONFLICT (telegram_id) DO NOTHING
            "#,
        )
        .bind(telegram_id)
        .bind(username)
        .execute(&self.pool)
        .await?;

        log::debug!("👤 User {} registered", telegram_id);
        Ok(())
    }

    pub async fn lookup_user_id(&self, telegram_id: i64) -> StoreResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::database::Persistence;
use crate::models::{DialogState, SessionField, UserSession};
use crate::prices::PriceSource;

type SessionMap = Arc<RwLock<HashMap<i64, UserSession>>>;

/// Общие зависимости обработчиков
#[derive(Clone)]
pub struct BotState {
    pub sessions: SessionStore,
    pub db: Arc<dyn Persistence>,
    pub prices: Arc<dyn PriceSource>,
}

impl BotState {
    pub fn new(db: Arc<dyn Persistence>, prices: Arc<dyn PriceSource>) -> Self {
        Self {
            sessions: SessionStore::new(),
            db,
            prices,
        }
    }
}

/// Сессии пользователей в памяти, ключ - telegram id
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: SessionMap,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Возвращает копию сессии и флаг, существовала ли она
    pub async fn get_or_create(&self, user_id: i64) -> (UserSession, bool) {
        let mut sessions = self.sessions.write().await;
        let existed = sessions.contains_key(&user_id);
        let session = sessions.entry(user_id).or_insert_with(UserSession::new);
        session.touch();
        if !existed {
            log::debug!("🆕 Session created for user {}", user_id);
        }
        (session.clone(), existed)
    }

    pub async fn get(&self, user_id: i64) -> Option<UserSession> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    pub async fn get_state(&self, user_id: i64) -> Option<DialogState> {
        self.sessions.read().await.get(&user_id).map(|s| s.state)
    }

    pub async fn set_state(&self, user_id: i64, state: DialogState) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id).or_insert_with(UserSession::new);
        session.state = state;
        session.touch();
    }

    pub async fn set_field(&self, user_id: i64, field: SessionField) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(user_id).or_insert_with(UserSession::new);
        session.apply(field);
        session.touch();
    }

    /// Сохраняет сессию целиком после перехода
    pub async fn put(&self, user_id: i64, mut session: UserSession) {
        session.touch();
        self.sessions.write().await.insert(user_id, session);
    }

    pub async fn clear(&self, user_id: i64) {
        if self.sessions.write().await.remove(&user_id).is_some() {
            log::debug!("🗑 Session cleared for user {}", user_id);
        }
    }

    pub async fn clear_all(&self) {
        let mut sessions = self.sessions.write().await;
        let previous_count = sessions.len();
        sessions.clear();
        log::info!("🧹 All sessions cleared ({} dropped)", previous_count);
    }

    /// Удаляет сессии без активности дольше `max_age`, возвращает число удалённых
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(max_age) else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let previous_count = sessions.len();
        sessions.retain(|_, session| session.updated_at >= cutoff);

        let current_count = sessions.len();
        log::debug!("🧹 Sessions swept: {} -> {} entries", previous_count, current_count);
        previous_count - current_count
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TxDraft;

    #[tokio::test]
    async fn get_or_create_reports_existence() {
        let store = SessionStore::new();
        let (session, existed) = store.get_or_create(1).await;
        assert!(!existed);
        assert_eq!(session.state, DialogState::Idle);

        let (_, existed) = store.get_or_create(1).await;
        assert!(existed);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn typed_fields_and_state_are_stored() {
        let store = SessionStore::new();
        store.set_state(5, DialogState::WaitingPortfolioName).await;
        store
            .set_field(5, SessionField::TempPortfolioName(Some("alpha".into())))
            .await;
        store.set_field(5, SessionField::BotMessageId(Some(42))).await;

        let session = store.get(5).await.expect("session exists");
        assert_eq!(session.state, DialogState::WaitingPortfolioName);
        assert_eq!(session.temp_portfolio_name.as_deref(), Some("alpha"));
        assert_eq!(session.bot_message_id, Some(42));
        assert_eq!(store.get_state(5).await, Some(DialogState::WaitingPortfolioName));
        assert_eq!(store.get_state(6).await, None);
    }

    #[tokio::test]
    async fn clear_and_clear_all() {
        let store = SessionStore::new();
        store.get_or_create(1).await;
        store.get_or_create(2).await;
        store.clear(1).await;
        assert!(store.get(1).await.is_none());
        assert!(store.get(2).await.is_some());

        store.clear_all().await;
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn reset_keeps_live_message() {
        let mut session = UserSession::new();
        session.bot_message_id = Some(9);
        session.selected_portfolio_name = Some("main".into());
        session.tx_draft = TxDraft {
            ticker: Some("BTC".into()),
            ..TxDraft::default()
        };
        session.reset(DialogState::MainMenu);

        assert_eq!(session.state, DialogState::MainMenu);
        assert_eq!(session.bot_message_id, Some(9));
        assert!(session.selected_portfolio_name.is_none());
        assert_eq!(session.tx_draft, TxDraft::default());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_idle_sessions() {
        let store = SessionStore::new();
        store.get_or_create(1).await;
        tokio::time::advance(Duration::from_secs(400)).await;
        store.get_or_create(2).await;

        let removed = store.sweep_expired(Duration::from_secs(300)).await;
        assert_eq!(removed, 1);
        assert!(store.get(1).await.is_none());
        assert!(store.get(2).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn touched_session_survives_sweep() {
        let store = SessionStore::new();
        store.get_or_create(1).await;
        tokio::time::advance(Duration::from_secs(200)).await;
        store.set_state(1, DialogState::MainMenu).await;
        tokio::time::advance(Duration::from_secs(200)).await;

        assert_eq!(store.sweep_expired(Duration::from_secs(300)).await, 0);
        assert!(store.get(1).await.is_some());
    }
}

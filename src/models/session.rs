use tokio::time::Instant;

use super::{DialogState, TxDraft};

/// Состояние диалога одного пользователя, живёт только в памяти
#[derive(Debug, Clone)]
pub struct UserSession {
    pub state: DialogState,
    pub temp_portfolio_name: Option<String>,
    pub selected_portfolio_name: Option<String>,
    pub tx_draft: TxDraft,
    pub pending_tx_id: Option<i64>,
    /// Единственное "живое" сообщение бота у пользователя
    pub bot_message_id: Option<i32>,
    pub updated_at: Instant,
}

impl UserSession {
    pub fn new() -> Self {
        Self {
            state: DialogState::Idle,
            temp_portfolio_name: None,
            selected_portfolio_name: None,
            tx_draft: TxDraft::default(),
            pending_tx_id: None,
            bot_message_id: None,
            updated_at: Instant::now(),
        }
    }

    /// Сбрасывает черновики и переводит в указанное состояние.
    /// Живое сообщение остаётся, чтобы следующий экран его заменил.
    pub fn reset(&mut self, state: DialogState) {
        self.state = state;
        self.temp_portfolio_name = None;
        self.selected_portfolio_name = None;
        self.tx_draft = TxDraft::default();
        self.pending_tx_id = None;
    }

    pub fn touch(&mut self) {
        self.updated_at = Instant::now();
    }

    pub fn apply(&mut self, field: SessionField) {
        match field {
            SessionField::TempPortfolioName(v) => self.temp_portfolio_name = v,
            SessionField::SelectedPortfolioName(v) => self.selected_portfolio_name = v,
            SessionField::TxDraft(v) => self.tx_draft = v,
            SessionField::PendingTxId(v) => self.pending_tx_id = v,
            SessionField::BotMessageId(v) => self.bot_message_id = v,
        }
    }
}

impl Default for UserSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Типизированная запись одного поля сессии
#[derive(Debug, Clone, PartialEq)]
pub enum SessionField {
    TempPortfolioName(Option<String>),
    SelectedPortfolioName(Option<String>),
    TxDraft(TxDraft),
    PendingTxId(Option<i64>),
    BotMessageId(Option<i32>),
}

pub mod callbacks;
pub mod commands;
pub mod confirmations;
pub mod messages;
pub mod portfolios;
pub mod reports;
pub mod transactions;
pub mod utils;

use std::time::Duration;

use thiserror::Error;

use crate::bot_state::BotState;
use crate::database::{Persistence, StoreError};
use crate::dispatcher::{InboundEvent, UserRef};
use crate::models::UserSession;
use crate::transport::Keyboard;

pub use callbacks::callback_handler;
pub use confirmations::TemplateError;
pub use messages::message_handler;

/// Исходящее действие, которое диспетчер выполнит через транспорт
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Новый экран, заменяет живое сообщение пользователя
    Prompt { text: String, keyboard: Option<Keyboard> },
    /// Временное сообщение, удаляется само через `ttl`
    Notice {
        text: String,
        keyboard: Option<Keyboard>,
        ttl: Duration,
    },
    DeleteMessage { message_id: i32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub effects: Vec<Effect>,
    /// Сценарий завершён, диспетчер удаляет сессию после эффектов
    pub ends_session: bool,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::new().with_prompt(text, Some(keyboard))
    }

    pub fn with_prompt(mut self, text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        self.effects.push(Effect::Prompt {
            text: text.into(),
            keyboard,
        });
        self
    }

    pub fn with_notice(self, text: impl Into<String>, ttl: Duration) -> Self {
        self.with_notice_keyboard(text, None, ttl)
    }

    pub fn with_notice_keyboard(
        mut self,
        text: impl Into<String>,
        keyboard: Option<Keyboard>,
        ttl: Duration,
    ) -> Self {
        self.effects.push(Effect::Notice {
            text: text.into(),
            keyboard,
            ttl,
        });
        self
    }

    pub fn with_delete(mut self, message_id: Option<i32>) -> Self {
        if let Some(message_id) = message_id {
            self.effects.push(Effect::DeleteMessage { message_id });
        }
        self
    }

    pub fn then(mut self, other: Reply) -> Self {
        self.effects.extend(other.effects);
        self.ends_session |= other.ends_session;
        self
    }

    pub fn ending_session(mut self) -> Self {
        self.ends_session = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum DialogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("user {0} is not registered")]
    NotRegistered(i64),
    #[error("broken dialog context: {0}")]
    Fault(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl DialogError {
    /// Ошибки логики, после которых сессию нельзя считать корректной
    pub fn is_fault(&self) -> bool {
        matches!(self, DialogError::Fault(_) | DialogError::Template(_))
    }

    pub fn missing(field: &str) -> Self {
        DialogError::Fault(format!("{} is not set", field))
    }
}

pub type HandlerResult = Result<Reply, DialogError>;

/// Контекст обработки одного события
pub struct Ctx<'a> {
    pub state: &'a BotState,
    pub user: &'a UserRef,
    pub chat_id: i64,
}

impl Ctx<'_> {
    pub fn db(&self) -> &dyn Persistence {
        self.state.db.as_ref()
    }

    /// Внутренний id пользователя в базе
    pub async fn user_id(&self) -> Result<i64, DialogError> {
        self.db()
            .lookup_user_id(self.user.id)
            .await?
            .ok_or(DialogError::NotRegistered(self.user.id))
    }
}

/// Один переход диалога: событие + сессия -> эффекты, сессия меняется на месте
pub async fn handle_event(ctx: &Ctx<'_>, session: &mut UserSession, event: &InboundEvent) -> HandlerResult {
    match event {
        InboundEvent::Message { message_id, text, .. } => {
            message_handler(ctx, session, *message_id, text).await
        }
        InboundEvent::Callback { data, .. } => callback_handler(ctx, session, data).await,
    }
}

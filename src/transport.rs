use std::error::Error;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
    ParseMode, ReplyMarkup,
};
use thiserror::Error;

use crate::dispatcher::{InboundEvent, UpdateDispatcher, UserRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Клавиатура: инлайн-кнопки с payload или постоянное меню
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    Inline(Vec<Vec<Button>>),
    Menu(Vec<Vec<String>>),
}

impl Keyboard {
    pub fn payloads(&self) -> Vec<&str> {
        match self {
            Keyboard::Inline(rows) => rows.iter().flatten().map(|b| b.payload.as_str()).collect(),
            Keyboard::Menu(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Исходящая сторона чата
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<i32, TransportError>;
    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;
    async fn delete(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError>;
}

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn inline_markup(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.payload.clone()))
            .collect::<Vec<_>>()
    }))
}

fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Inline(rows) => ReplyMarkup::InlineKeyboard(inline_markup(rows)),
        Keyboard::Menu(rows) => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(
                rows.iter()
                    .map(|row| row.iter().map(KeyboardButton::new).collect::<Vec<_>>()),
            )
            .resize_keyboard(),
        ),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<i32, TransportError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(reply_markup(keyboard));
        }
        let message = request.await?;
        Ok(message.id.0)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::MarkdownV2);
        match keyboard {
            Some(Keyboard::Inline(rows)) => request = request.reply_markup(inline_markup(rows)),
            Some(Keyboard::Menu(_)) => {
                return Err(TransportError::Rejected("reply keyboard cannot be edited in place".into()))
            }
            None => {}
        }
        request.await?;
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        self.bot.delete_message(ChatId(chat_id), MessageId(message_id)).await?;
        Ok(())
    }
}

fn user_ref(user: &teloxide::types::User) -> UserRef {
    UserRef {
        id: user.id.0 as i64,
        username: user.username.clone(),
    }
}

pub async fn message_endpoint(
    msg: Message,
    dispatcher: UpdateDispatcher,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    dispatcher
        .dispatch(InboundEvent::Message {
            user: msg.from.as_ref().map(user_ref),
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            text: text.to_string(),
        })
        .await;
    Ok(())
}

pub async fn callback_endpoint(
    bot: Bot,
    q: CallbackQuery,
    dispatcher: UpdateDispatcher,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    // Убираем "часики" на кнопке
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("⚠️ Failed to answer callback query: {}", e);
    }

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id.0)
        .unwrap_or(q.from.id.0 as i64);

    dispatcher
        .dispatch(InboundEvent::Callback {
            user: Some(user_ref(&q.from)),
            chat_id,
            message_id: q.message.as_ref().map(|m| m.id().0),
            data,
        })
        .await;
    Ok(())
}

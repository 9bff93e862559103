//! Граница обработки событий: одно событие - один переход диалога.
//! Здесь решается, что делать с ошибками, устаревшими кнопками и временными сообщениями.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bot_state::BotState;
use crate::handlers::utils::{escape_markdown_v2, inline, main_menu_button, restart_keyboard, TTL_NOTICE};
use crate::handlers::{self, commands, Ctx, DialogError, Effect, Reply};
use crate::models::UserSession;
use crate::transport::{ChatTransport, Keyboard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: i64,
    pub username: Option<String>,
}

/// Входящее событие от транспорта
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message {
        user: Option<UserRef>,
        chat_id: i64,
        message_id: i32,
        text: String,
    },
    Callback {
        user: Option<UserRef>,
        chat_id: i64,
        /// Сообщение, на котором нажата кнопка
        message_id: Option<i32>,
        data: String,
    },
}

impl InboundEvent {
    pub fn user(&self) -> Option<&UserRef> {
        match self {
            InboundEvent::Message { user, .. } | InboundEvent::Callback { user, .. } => user.as_ref(),
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            InboundEvent::Message { chat_id, .. } | InboundEvent::Callback { chat_id, .. } => *chat_id,
        }
    }

    fn origin_message(&self) -> Option<i32> {
        match self {
            InboundEvent::Message { .. } => None,
            InboundEvent::Callback { message_id, .. } => *message_id,
        }
    }
}

#[derive(Clone)]
pub struct UpdateDispatcher {
    state: BotState,
    transport: Arc<dyn ChatTransport>,
    shutdown: CancellationToken,
}

impl UpdateDispatcher {
    pub fn new(state: BotState, transport: Arc<dyn ChatTransport>, shutdown: CancellationToken) -> Self {
        Self {
            state,
            transport,
            shutdown,
        }
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    /// После рестарта ни одна сессия не переживает процесс
    pub async fn startup(&self) {
        self.state.sessions.clear_all().await;
    }

    /// Периодическая очистка неактивных сессий, останавливается по токену
    pub fn spawn_sweeper(&self, every: Duration, max_age: Duration) -> JoinHandle<()> {
        let sessions = self.state.sessions.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // первый тик срабатывает сразу
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        log::info!("🛑 Session sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = sessions.sweep_expired(max_age).await;
                        if removed > 0 {
                            log::info!("🧹 Expired {} idle sessions", removed);
                        }
                    }
                }
            }
        })
    }

    /// Обрабатывает одно событие. Паника или ошибка внутри не останавливает бота.
    pub async fn dispatch(&self, event: InboundEvent) {
        let Some(user) = event.user().cloned() else {
            log::debug!("🤷 Event without a user dropped");
            return;
        };
        let chat_id = event.chat_id();
        let origin = event.origin_message();

        let worker = self.clone();
        let task_user = user.clone();
        let outcome = tokio::spawn(async move { worker.process(&task_user, event).await }).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_fault() => {
                log::error!("💥 Dialog fault for user {}: {}", user.id, e);
                self.recover(&user, chat_id, origin).await;
            }
            Ok(Err(e)) => self.report_failure(&user, chat_id, e).await,
            Err(join_error) => {
                log::error!("💥 Handler for user {} crashed: {}", user.id, join_error);
                self.recover(&user, chat_id, origin).await;
            }
        }
    }

    async fn process(&self, user: &UserRef, event: InboundEvent) -> Result<(), DialogError> {
        let chat_id = event.chat_id();
        let origin = event.origin_message();

        let mut session = match &event {
            InboundEvent::Callback { .. } => match self.state.sessions.get(user.id).await {
                Some(session) => session,
                None => {
                    self.stale_callback(user, chat_id, origin).await;
                    return Ok(());
                }
            },
            InboundEvent::Message { .. } => self.state.sessions.get_or_create(user.id).await.0,
        };

        let ctx = Ctx {
            state: &self.state,
            user,
            chat_id,
        };
        let before = session.state;
        let reply = handlers::handle_event(&ctx, &mut session, &event).await?;
        if before != session.state {
            log::debug!("🔀 User {}: {} -> {}", user.id, before, session.state);
        }

        let ends_session = reply.ends_session;
        self.apply_effects(chat_id, origin, &mut session, reply).await;

        if ends_session {
            // Живой экран сценария больше не нужен, меню уходит временным сообщением
            if let Some(live) = session.bot_message_id {
                self.delete_quietly(chat_id, live).await;
            }
            self.state.sessions.clear(user.id).await;
            log::debug!("🏁 Flow of user {} finished, session cleared", user.id);
        } else {
            self.state.sessions.put(user.id, session).await;
        }
        Ok(())
    }

    /// Кнопка без сессии (рестарт или завершённый сценарий): payload не разбираем, предлагаем начать заново
    async fn stale_callback(&self, user: &UserRef, chat_id: i64, origin: Option<i32>) {
        log::info!("🕰 Stale callback from user {}", user.id);
        if let Some(message_id) = origin {
            self.delete_quietly(chat_id, message_id).await;
        }

        let mut session = UserSession::new();
        let reply = Reply::prompt(
            escape_markdown_v2("🔄 The service was restarted. Please start over."),
            restart_keyboard(),
        );
        self.apply_effects(chat_id, None, &mut session, reply).await;
        self.state.sessions.put(user.id, session).await;
    }

    /// Сбой логики: сессия сбрасывается, пользователь получает кнопку рестарта
    async fn recover(&self, user: &UserRef, chat_id: i64, origin: Option<i32>) {
        let previous = self.state.sessions.get(user.id).await;
        self.state.sessions.clear(user.id).await;

        if let Some(message_id) = origin {
            self.delete_quietly(chat_id, message_id).await;
        }
        if let Some(live) = previous.and_then(|s| s.bot_message_id) {
            if Some(live) != origin {
                self.delete_quietly(chat_id, live).await;
            }
        }

        let mut session = UserSession::new();
        let reply = Reply::prompt(
            escape_markdown_v2("⚠️ Something went wrong and your session was reset. Please restart."),
            restart_keyboard(),
        );
        self.apply_effects(chat_id, None, &mut session, reply).await;
        self.state.sessions.put(user.id, session).await;
    }

    /// Ошибка хранилища: состояние сессии не меняется, шаг можно повторить
    async fn report_failure(&self, user: &UserRef, chat_id: i64, error: DialogError) {
        let reply = match &error {
            DialogError::NotRegistered(_) => {
                log::info!("👤 User {} is not registered yet", user.id);
                commands::not_started()
            }
            _ => {
                log::error!("❌ Request of user {} failed: {}", user.id, error);
                Reply::new().with_notice_keyboard(
                    escape_markdown_v2("⚠️ Something went wrong. Please try again."),
                    Some(inline(vec![vec![main_menu_button()]])),
                    TTL_NOTICE,
                )
            }
        };

        let mut session = self.state.sessions.get(user.id).await.unwrap_or_default();
        self.apply_effects(chat_id, None, &mut session, reply).await;
        self.state.sessions.put(user.id, session).await;
    }

    async fn apply_effects(&self, chat_id: i64, origin: Option<i32>, session: &mut UserSession, reply: Reply) {
        for effect in reply.effects {
            match effect {
                Effect::Prompt { text, keyboard } => {
                    self.show_prompt(chat_id, origin, session, &text, keyboard.as_ref()).await
                }
                Effect::Notice { text, keyboard, ttl } => {
                    self.send_ephemeral(chat_id, &text, keyboard.as_ref(), ttl).await
                }
                Effect::DeleteMessage { message_id } => self.delete_quietly(chat_id, message_id).await,
            }
        }
    }

    /// Новый экран заменяет живое сообщение: правка на месте или удаление и отправка
    async fn show_prompt(
        &self,
        chat_id: i64,
        origin: Option<i32>,
        session: &mut UserSession,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) {
        if let (Some(live), Some(origin)) = (session.bot_message_id, origin) {
            if live == origin {
                match self.transport.edit(chat_id, live, text, keyboard).await {
                    Ok(()) => return,
                    Err(e) => log::debug!("✏️ Edit of {} failed, resending: {}", live, e),
                }
            }
        }

        if let Some(live) = session.bot_message_id.take() {
            self.delete_quietly(chat_id, live).await;
        }
        match self.transport.send(chat_id, text, keyboard).await {
            Ok(message_id) => session.bot_message_id = Some(message_id),
            Err(e) => log::error!("❌ Failed to send prompt to chat {}: {}", chat_id, e),
        }
    }

    /// Отправка временного сообщения с отложенным удалением
    async fn send_ephemeral(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>, ttl: Duration) {
        let message_id = match self.transport.send(chat_id, text, keyboard).await {
            Ok(id) => id,
            Err(e) => {
                log::error!("❌ Failed to send notice to chat {}: {}", chat_id, e);
                return;
            }
        };

        let transport = self.transport.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(ttl) => {
                    if let Err(e) = transport.delete(chat_id, message_id).await {
                        log::warn!("⚠️ Failed to delete notice {}: {}", message_id, e);
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    async fn delete_quietly(&self, chat_id: i64, message_id: i32) {
        if let Err(e) = self.transport.delete(chat_id, message_id).await {
            log::debug!("🗑 Could not delete message {}: {}", message_id, e);
        }
    }
}

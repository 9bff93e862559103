use crate::handlers::callbacks::tags;
use crate::handlers::utils::{
    back_keyboard, bold, escape_markdown_v2, inline, main_menu_keyboard, restart_keyboard,
    SERVICE_DESCRIPTION, TTL_LONG, TTL_NOTICE, TTL_SHORT,
};
use crate::handlers::{Ctx, HandlerResult, Reply};
use crate::models::{DialogState, UserSession};
use crate::transport::Button;

pub const START_COMMAND: &str = "/start";
pub const STATUS_COMMAND: &str = "/status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Status,
}

/// Команды распознаются в любом состоянии, `/start@bot_name` тоже
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let first = text.split_whitespace().next()?;
    let command = first.split('@').next().unwrap_or(first);
    match command {
        START_COMMAND => Some(BotCommand::Start),
        STATUS_COMMAND => Some(BotCommand::Status),
        _ => None,
    }
}

pub async fn handle_start(ctx: &Ctx<'_>, session: &mut UserSession) -> HandlerResult {
    let db = ctx.db();
    if db.user_exists(ctx.user.id).await? {
        return Ok(main_menu(session));
    }

    let username = ctx.user.username.as_deref().unwrap_or_default();
    db.create_user_if_not_exists(ctx.user.id, username).await?;
    log::info!("👋 New user {} ({})", ctx.user.id, username);

    session.reset(DialogState::MainMenu);
    let text = format!(
        "👋 {}\n\n{}",
        bold("Welcome!"),
        escape_markdown_v2("Let's create your first portfolio.")
    );
    Ok(Reply::prompt(
        text,
        inline(vec![vec![
            Button::new("➕ Create portfolio", tags::CREATE_PORTFOLIO),
            Button::new("🤖 Who am I?", tags::WHO_AM_I),
        ]]),
    ))
}

/// Главное меню, черновики сбрасываются
pub fn main_menu(session: &mut UserSession) -> Reply {
    session.reset(DialogState::MainMenu);
    Reply::prompt(
        escape_markdown_v2("What would you like to do next?"),
        main_menu_keyboard(),
    )
}

/// Конец сценария или отмена: сессия удаляется, меню остаётся только на клавиатуре
pub fn finish_flow(done: Option<String>) -> Reply {
    let reply = match done {
        Some(text) => Reply::new().with_notice(text, TTL_SHORT),
        None => Reply::new(),
    };
    reply
        .with_notice_keyboard(
            escape_markdown_v2("What would you like to do next?"),
            Some(main_menu_keyboard()),
            TTL_NOTICE,
        )
        .ending_session()
}

pub fn service_info() -> Reply {
    let text = format!(
        "{}\n\n{}",
        bold("🤖 Crypto Portfolio Tracker"),
        escape_markdown_v2(SERVICE_DESCRIPTION)
    );
    Reply::prompt(text, back_keyboard())
}

pub async fn status(ctx: &Ctx<'_>, session: &UserSession) -> HandlerResult {
    let sessions = ctx.state.sessions.count().await;
    let text = format!(
        "🩺 {}\n\nActive sessions: {}\nYour state: `{}`",
        bold("Service status"),
        sessions,
        session.state
    );
    Ok(Reply::new().with_notice(text, TTL_LONG))
}

/// Кнопка из прошлого шага, который уже не актуален
pub fn outdated_button(session: &mut UserSession) -> Reply {
    Reply::new()
        .with_notice(
            escape_markdown_v2("⌛ This button is no longer active. Here is the main menu."),
            TTL_SHORT,
        )
        .then(main_menu(session))
}

pub fn not_started() -> Reply {
    Reply::prompt(
        escape_markdown_v2("👋 Please press Start to begin."),
        restart_keyboard(),
    )
}

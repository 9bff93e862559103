use crate::handlers::callbacks::{tags, PortfolioAction};
use crate::handlers::confirmations::{self, ConfirmAction};
use crate::handlers::utils::{
    back_button, back_keyboard, bold, escape_markdown_v2, inline, new_portfolio_button, two_columns,
    TTL_NOTICE, TTL_SHORT,
};
use crate::handlers::{commands, Ctx, DialogError, HandlerResult, Reply};
use crate::models::{DialogState, UserSession, PORTFOLIO_LIMIT};
use crate::transport::{Button, Keyboard};
use crate::validation::normalize_portfolio_name;

pub fn menu() -> Reply {
    let buttons = vec![
        Button::new("➕ Create portfolio", tags::CREATE_PORTFOLIO),
        Button::new("📊 General report", tags::REPORTS_GENERAL),
        Button::new("🗑 Delete portfolio", tags::PORTFOLIOS_DELETE),
        Button::new("⭐ Default portfolio", tags::PORTFOLIO_GET_DEFAULT),
        Button::new("🔁 Change default", tags::PORTFOLIO_CHANGE_DEFAULT),
        Button::new("✏️ Rename portfolio", tags::PORTFOLIO_RENAME),
    ];
    let mut rows = two_columns(buttons);
    rows.push(vec![back_button()]);

    Reply::prompt(
        format!("💼 {}\n\n{}", bold("Portfolios"), escape_markdown_v2("Choose an action:")),
        inline(rows),
    )
}

fn name_prompt(error: Option<&str>) -> Reply {
    let mut text = String::new();
    if let Some(error) = error {
        text.push_str(&format!("❌ {}\n\n", escape_markdown_v2(error)));
    }
    text.push_str(&escape_markdown_v2(
        "Please enter a name for your portfolio (letters, digits and underscores):",
    ));
    Reply::prompt(text, back_keyboard())
}

fn new_name_prompt(current: &str, error: Option<&str>) -> Reply {
    let mut text = String::new();
    if let Some(error) = error {
        text.push_str(&format!("❌ {}\n\n", escape_markdown_v2(error)));
    }
    text.push_str(&format!(
        "{} {}{}",
        escape_markdown_v2("Please enter a new name for portfolio"),
        bold(current),
        escape_markdown_v2(":"),
    ));
    Reply::prompt(text, back_keyboard())
}

/// Проверка лимита до запроса имени
pub async fn begin_create(ctx: &Ctx<'_>, session: &mut UserSession) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    if ctx.db().reached_portfolio_limit(user_id).await? {
        log::info!("🚫 User {} reached the portfolio limit", ctx.user.id);
        let text = escape_markdown_v2(&format!(
            "Sorry, you can create up to {} portfolios. Delete one to create a new one.",
            PORTFOLIO_LIMIT
        ));
        return Ok(Reply::new()
            .with_notice(format!("🚫 {}", text), TTL_NOTICE)
            .then(commands::main_menu(session)));
    }

    session.reset(DialogState::WaitingPortfolioName);
    Ok(name_prompt(None))
}

pub async fn on_name(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    text: &str,
    consumed: Option<i32>,
) -> HandlerResult {
    let reply = Reply::new().with_delete(consumed);
    let name = match normalize_portfolio_name(text) {
        Ok(name) => name,
        Err(rejection) => return Ok(reply.then(name_prompt(Some(&rejection.to_string())))),
    };

    let user_id = ctx.user_id().await?;
    if ctx.db().portfolio_name_exists(user_id, &name).await? {
        let error = format!("Portfolio with name '{}' already exists, try another name.", name);
        return Ok(reply.then(name_prompt(Some(&error))));
    }

    session.temp_portfolio_name = Some(name.clone());
    session.state = DialogState::WaitingPortfolioDescription;
    Ok(reply.with_prompt(
        format!(
            "{} {}{}",
            escape_markdown_v2("Please enter a description for portfolio"),
            bold(&name),
            escape_markdown_v2(":")
        ),
        Some(back_keyboard()),
    ))
}

pub async fn on_description(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    text: &str,
    consumed: Option<i32>,
) -> HandlerResult {
    let name = session
        .temp_portfolio_name
        .clone()
        .ok_or_else(|| DialogError::missing("portfolio name"))?;
    let user_id = ctx.user_id().await?;

    ctx.db().create_portfolio(user_id, &name, text.trim()).await?;
    log::info!("📁 User {} created portfolio '{}'", ctx.user.id, name);

    Ok(Reply::new()
        .with_delete(consumed)
        .then(commands::finish_flow(Some(format!(
            "✅ Portfolio {} created successfully\\!",
            bold(&name)
        )))))
}

fn empty_list_reply(action: PortfolioAction) -> Reply {
    let text = match action {
        PortfolioAction::ChangeDefault => "You have no other portfolio to make default. Let's create a new one!",
        _ => "You have no portfolios yet. Let's create one!",
    };
    Reply::prompt(
        escape_markdown_v2(text),
        inline(vec![vec![new_portfolio_button(), back_button()]]),
    )
}

/// Список портфелей с кнопками `action::name`
pub async fn list_for(ctx: &Ctx<'_>, action: PortfolioAction) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let only_non_default = action == PortfolioAction::ChangeDefault;
    let names = ctx.db().list_portfolios(user_id, only_non_default).await?;

    if names.is_empty() {
        return Ok(empty_list_reply(action));
    }

    let title = match action {
        PortfolioAction::Delete => "Select a portfolio to delete:",
        PortfolioAction::Rename => "Select a portfolio to rename:",
        PortfolioAction::ChangeDefault => "Select a new default portfolio:",
    };
    let mut rows: Vec<Vec<Button>> = names
        .iter()
        .map(|name| vec![Button::new(format!("📁 {}", name), action.payload(name))])
        .collect();
    rows.push(vec![back_button()]);

    Ok(Reply::prompt(escape_markdown_v2(title), inline(rows)))
}

pub fn default_not_deletable(name: &str) -> Reply {
    let text = format!(
        "{} {}{}",
        escape_markdown_v2("You cannot delete the"),
        bold(&format!("default portfolio '{}'", name)),
        escape_markdown_v2(". Change the default one first."),
    );
    Reply::prompt(
        format!("⚠️ {}", text),
        inline(vec![vec![
            Button::new("🔁 Change default", tags::PORTFOLIO_CHANGE_DEFAULT),
            Button::new("❌ Cancel", tags::CANCEL_ACTION),
        ]]),
    )
}

/// Нажатие на портфель из списка. Основной портфель перепроверяется на каждом нажатии.
pub async fn on_target(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    action: PortfolioAction,
    portfolio: &str,
) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let default = ctx.db().default_portfolio(user_id).await?;
    let is_default = default.as_ref().is_some_and(|p| p.name == portfolio);

    match action {
        PortfolioAction::Delete => {
            if is_default {
                log::info!("🚫 User {} tried to delete default portfolio '{}'", ctx.user.id, portfolio);
                return Ok(default_not_deletable(portfolio));
            }
            session.selected_portfolio_name = Some(portfolio.to_string());
            confirmations::ask(session, ConfirmAction::DeletePortfolio, &[portfolio])
        }
        PortfolioAction::Rename => {
            session.selected_portfolio_name = Some(portfolio.to_string());
            session.temp_portfolio_name = None;
            session.state = DialogState::WaitingForNewPortfolioName;
            Ok(new_name_prompt(portfolio, None))
        }
        PortfolioAction::ChangeDefault => {
            if is_default {
                return Ok(Reply::new()
                    .with_notice(
                        format!("⭐ {} {}", bold(portfolio), escape_markdown_v2("is already your default portfolio.")),
                        TTL_SHORT,
                    )
                    .then(commands::main_menu(session)));
            }
            session.selected_portfolio_name = Some(portfolio.to_string());
            confirmations::ask(session, ConfirmAction::ChangeDefaultPortfolio, &[portfolio])
        }
    }
}

pub async fn on_new_name(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    text: &str,
    consumed: Option<i32>,
) -> HandlerResult {
    let current = session
        .selected_portfolio_name
        .clone()
        .ok_or_else(|| DialogError::missing("selected portfolio"))?;
    let reply = Reply::new().with_delete(consumed);

    let name = match normalize_portfolio_name(text) {
        Ok(name) => name,
        Err(rejection) => return Ok(reply.then(new_name_prompt(&current, Some(&rejection.to_string())))),
    };

    let user_id = ctx.user_id().await?;
    if ctx.db().portfolio_name_exists(user_id, &name).await? {
        let error = format!("Portfolio with name '{}' already exists, try another name.", name);
        return Ok(reply.then(new_name_prompt(&current, Some(&error))));
    }

    session.temp_portfolio_name = Some(name.clone());
    let confirm = confirmations::ask(session, ConfirmAction::RenamePortfolio, &[&current, &name])?;
    Ok(reply.then(confirm))
}

pub async fn show_default(ctx: &Ctx<'_>) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let Some(default) = ctx.db().default_portfolio(user_id).await? else {
        return Ok(Reply::prompt(
            escape_markdown_v2("You have no default portfolio yet. Create your first portfolio and it becomes the default one."),
            inline(vec![vec![new_portfolio_button(), back_button()]]),
        ));
    };

    let mut text = format!(
        "⭐ {} {}{}",
        escape_markdown_v2("Your default portfolio is"),
        bold(&default.name),
        escape_markdown_v2(".")
    );
    if !default.description.is_empty() {
        text.push_str(&format!("\n\n_{}_", escape_markdown_v2(&default.description)));
    }

    let keyboard: Keyboard = inline(vec![
        vec![
            Button::new("🔁 Change default", tags::PORTFOLIO_CHANGE_DEFAULT),
            Button::new("✏️ Rename", PortfolioAction::Rename.payload(&default.name)),
        ],
        vec![back_button()],
    ]);
    Ok(Reply::prompt(text, keyboard))
}

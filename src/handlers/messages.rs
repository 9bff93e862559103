//! Текст от пользователя: смысл определяется только текущим состоянием.

use crate::handlers::commands::{self, BotCommand};
use crate::handlers::utils::{
    escape_markdown_v2, MENU_HELP, MENU_PORTFOLIOS, MENU_REPORTS, MENU_TRANSACTIONS, TTL_SHORT,
};
use crate::handlers::{portfolios, reports, transactions, Ctx, HandlerResult, Reply};
use crate::models::{DialogState, UserSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRoute {
    Command(BotCommand),
    PortfoliosMenu,
    TransactionsMenu,
    ReportsMenu,
    Help,
    UnknownMenuText,
    PortfolioName,
    PortfolioDescription,
    NewPortfolioName,
    Ticker,
    Amount,
    Price,
    Date,
    UseButtons,
}

pub fn route_message(state: DialogState, text: &str) -> MessageRoute {
    if let Some(command) = commands::parse_command(text) {
        return MessageRoute::Command(command);
    }

    match state {
        DialogState::Idle | DialogState::MainMenu => match text.trim() {
            MENU_PORTFOLIOS => MessageRoute::PortfoliosMenu,
            MENU_TRANSACTIONS => MessageRoute::TransactionsMenu,
            MENU_REPORTS => MessageRoute::ReportsMenu,
            MENU_HELP => MessageRoute::Help,
            _ => MessageRoute::UnknownMenuText,
        },
        DialogState::WaitingPortfolioName => MessageRoute::PortfolioName,
        DialogState::WaitingPortfolioDescription => MessageRoute::PortfolioDescription,
        DialogState::WaitingForNewPortfolioName => MessageRoute::NewPortfolioName,
        DialogState::WaitingTransactionAsset => MessageRoute::Ticker,
        DialogState::WaitingTransactionAssetAmount => MessageRoute::Amount,
        DialogState::WaitingTransactionAssetPrice => MessageRoute::Price,
        DialogState::WaitingTransactionDate => MessageRoute::Date,
        DialogState::WaitingRenamePortfolioDecision
        | DialogState::WaitingDeletePortfolioDecision
        | DialogState::WaitingChangeDefaultPortfolioDecision
        | DialogState::WaitingTransactionType
        | DialogState::WaitingTransactionConfirmation
        | DialogState::WaitingDeleteTransactionDecision => MessageRoute::UseButtons,
    }
}

pub async fn message_handler(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    message_id: i32,
    text: &str,
) -> HandlerResult {
    let route = route_message(session.state, text);
    log::debug!("💬 Message from user {} in {} -> {:?}", ctx.user.id, session.state, route);

    // Введённый текст убираем из чата, команды и кнопки меню оставляем
    let consumed = Some(message_id);

    match route {
        MessageRoute::Command(BotCommand::Start) => commands::handle_start(ctx, session).await,
        MessageRoute::Command(BotCommand::Status) => commands::status(ctx, session).await,
        MessageRoute::PortfoliosMenu => Ok(portfolios::menu()),
        MessageRoute::TransactionsMenu => Ok(transactions::menu()),
        MessageRoute::ReportsMenu => Ok(reports::menu()),
        MessageRoute::Help => Ok(commands::service_info()),
        MessageRoute::UnknownMenuText if session.state == DialogState::Idle => Ok(commands::not_started()),
        MessageRoute::UnknownMenuText => Ok(Reply::new()
            .with_notice(
                escape_markdown_v2("Please use the menu buttons below."),
                TTL_SHORT,
            )
            .then(commands::main_menu(session))),
        MessageRoute::PortfolioName => portfolios::on_name(ctx, session, text, consumed).await,
        MessageRoute::PortfolioDescription => {
            portfolios::on_description(ctx, session, text, consumed).await
        }
        MessageRoute::NewPortfolioName => portfolios::on_new_name(ctx, session, text, consumed).await,
        MessageRoute::Ticker => transactions::on_ticker(ctx, session, text, consumed).await,
        MessageRoute::Amount => transactions::on_amount(session, text, consumed),
        MessageRoute::Price => transactions::on_price(session, text, consumed),
        MessageRoute::Date => transactions::on_date(session, text, consumed),
        MessageRoute::UseButtons => Ok(Reply::new()
            .with_delete(consumed)
            .with_notice(
                escape_markdown_v2("Please use the buttons above, or press Cancel to go back."),
                TTL_SHORT,
            )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_win_over_state() {
        for state in DialogState::ALL {
            assert_eq!(
                route_message(state, "/start"),
                MessageRoute::Command(BotCommand::Start)
            );
            assert_eq!(
                route_message(state, "/status"),
                MessageRoute::Command(BotCommand::Status)
            );
        }
    }

    #[test]
    fn free_text_depends_on_state() {
        assert_eq!(
            route_message(DialogState::WaitingPortfolioName, "My_Crypto"),
            MessageRoute::PortfolioName
        );
        assert_eq!(
            route_message(DialogState::WaitingTransactionAssetAmount, "12.3"),
            MessageRoute::Amount
        );
        assert_eq!(
            route_message(DialogState::WaitingTransactionConfirmation, "yes"),
            MessageRoute::UseButtons
        );
        assert_eq!(
            route_message(DialogState::MainMenu, MENU_REPORTS),
            MessageRoute::ReportsMenu
        );
        // в середине диалога подпись кнопки меню - это обычный ввод
        assert_eq!(
            route_message(DialogState::WaitingPortfolioDescription, MENU_HELP),
            MessageRoute::PortfolioDescription
        );
    }
}

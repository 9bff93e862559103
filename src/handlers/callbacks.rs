//! Маршрутизация нажатий на инлайн-кнопки: точные теги, префиксы и пары `action::target`.

use crate::handlers::confirmations::{self, ConfirmationTemplate};
use crate::handlers::{commands, portfolios, reports, transactions, Ctx, HandlerResult};
use crate::models::{DialogState, UserSession};

pub mod tags {
    pub const RESTART: &str = "restart";
    pub const CANCEL_ACTION: &str = "cancel_action";
    pub const WHO_AM_I: &str = "who_am_i";

    pub const CREATE_PORTFOLIO: &str = "create_portfolio";
    pub const PORTFOLIOS_MAIN: &str = "gf_portfolios_main";
    pub const PORTFOLIOS_DELETE: &str = "gf_portfolios_delete";
    pub const PORTFOLIO_RENAME: &str = "gf_portfolio_rename";
    pub const PORTFOLIO_CHANGE_DEFAULT: &str = "gf_portfolio_change_default";
    pub const PORTFOLIO_GET_DEFAULT: &str = "gf_portfolio_get_default";

    pub const TRANSACTIONS_MAIN: &str = "gf_transactions_main";
    pub const ADD_TRANSACTION: &str = "gf_add_transaction";
    pub const SHOW_LAST_TRANSACTIONS: &str = "gf_show_last_5_transactions";
    pub const DELETE_TRANSACTION: &str = "gf_delete_transaction";
    pub const CONFIRM_TRANSACTION: &str = "tx_confirm_transaction";

    pub const REPORTS_MAIN: &str = "gf_reports_main";
    pub const REPORTS_GENERAL: &str = "gf_reports_general";
    pub const REPORTS_ADVANCED: &str = "gf_reports_advanced";

    pub const TX_TYPE_PREFIX: &str = "tx_type_";
    pub const TX_TICKER_PREFIX: &str = "tx_pair_chosen_";
    pub const TX_TICKER_LEGACY_PREFIX: &str = "tx_asset_chosen_";
    pub const TX_DATE_PREFIX: &str = "tx_date_";
    pub const DELETE_TRANSACTION_PREFIX: &str = "gf_delete_transaction_confirmation_";

    pub const TARGET_SEPARATOR: &str = "::";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackRoute {
    Restart,
    Cancel,
    ServiceInfo,
    CreatePortfolio,
    PortfoliosMenu,
    PickPortfolioToDelete,
    PickPortfolioToRename,
    PickPortfolioForDefault,
    ShowDefaultPortfolio,
    TransactionsMenu,
    AddTransaction,
    ShowLastTransactions,
    PickTransactionToDelete,
    ConfirmTransaction,
    ReportsMenu,
    GeneralReport,
    AdvancedReport,
}

pub const EXACT_ROUTES: &[(&str, CallbackRoute)] = &[
    (tags::RESTART, CallbackRoute::Restart),
    (tags::CANCEL_ACTION, CallbackRoute::Cancel),
    (tags::WHO_AM_I, CallbackRoute::ServiceInfo),
    (tags::CREATE_PORTFOLIO, CallbackRoute::CreatePortfolio),
    (tags::PORTFOLIOS_MAIN, CallbackRoute::PortfoliosMenu),
    (tags::PORTFOLIOS_DELETE, CallbackRoute::PickPortfolioToDelete),
    (tags::PORTFOLIO_RENAME, CallbackRoute::PickPortfolioToRename),
    (tags::PORTFOLIO_CHANGE_DEFAULT, CallbackRoute::PickPortfolioForDefault),
    (tags::PORTFOLIO_GET_DEFAULT, CallbackRoute::ShowDefaultPortfolio),
    (tags::TRANSACTIONS_MAIN, CallbackRoute::TransactionsMenu),
    (tags::ADD_TRANSACTION, CallbackRoute::AddTransaction),
    (tags::SHOW_LAST_TRANSACTIONS, CallbackRoute::ShowLastTransactions),
    (tags::DELETE_TRANSACTION, CallbackRoute::PickTransactionToDelete),
    (tags::CONFIRM_TRANSACTION, CallbackRoute::ConfirmTransaction),
    (tags::REPORTS_MAIN, CallbackRoute::ReportsMenu),
    (tags::REPORTS_GENERAL, CallbackRoute::GeneralReport),
    (tags::REPORTS_ADVANCED, CallbackRoute::AdvancedReport),
];

impl CallbackRoute {
    /// Состояние, в котором кнопка ещё актуальна
    pub fn expected_state(&self) -> Option<DialogState> {
        match self {
            CallbackRoute::ConfirmTransaction => Some(DialogState::WaitingTransactionConfirmation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixRoute {
    TxType,
    TxTicker,
    TxDate,
    DeleteTransaction,
}

pub const PREFIX_ROUTES: &[(&str, PrefixRoute)] = &[
    (tags::TX_TYPE_PREFIX, PrefixRoute::TxType),
    (tags::TX_TICKER_PREFIX, PrefixRoute::TxTicker),
    (tags::TX_TICKER_LEGACY_PREFIX, PrefixRoute::TxTicker),
    (tags::TX_DATE_PREFIX, PrefixRoute::TxDate),
    (tags::DELETE_TRANSACTION_PREFIX, PrefixRoute::DeleteTransaction),
];

impl PrefixRoute {
    pub fn expected_state(&self) -> Option<DialogState> {
        match self {
            PrefixRoute::TxType => Some(DialogState::WaitingTransactionType),
            PrefixRoute::TxTicker => Some(DialogState::WaitingTransactionAsset),
            PrefixRoute::TxDate => Some(DialogState::WaitingTransactionDate),
            PrefixRoute::DeleteTransaction => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortfolioAction {
    Delete,
    Rename,
    ChangeDefault,
}

impl PortfolioAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortfolioAction::Delete => "delete",
            PortfolioAction::Rename => "rename",
            PortfolioAction::ChangeDefault => "change_default",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delete" => Some(PortfolioAction::Delete),
            "rename" => Some(PortfolioAction::Rename),
            "change_default" => Some(PortfolioAction::ChangeDefault),
            _ => None,
        }
    }

    pub fn payload(&self, portfolio: &str) -> String {
        format!("{}{}{}", self.as_str(), tags::TARGET_SEPARATOR, portfolio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Route<'a> {
    Exact(CallbackRoute),
    Decision(&'static ConfirmationTemplate),
    Prefixed(PrefixRoute, &'a str),
    Target(PortfolioAction, &'a str),
    Unknown,
}

pub fn route_callback(data: &str) -> Route<'_> {
    if let Some((_, route)) = EXACT_ROUTES.iter().find(|(tag, _)| *tag == data) {
        return Route::Exact(*route);
    }
    if let Some(template) = confirmations::by_confirm_tag(data) {
        return Route::Decision(template);
    }
    for (prefix, route) in PREFIX_ROUTES {
        if let Some(rest) = data.strip_prefix(prefix) {
            return Route::Prefixed(*route, rest);
        }
    }
    if let Some((action, target)) = data.split_once(tags::TARGET_SEPARATOR) {
        if let Some(action) = PortfolioAction::parse(action) {
            if !target.is_empty() {
                return Route::Target(action, target);
            }
        }
    }
    Route::Unknown
}

pub async fn callback_handler(ctx: &Ctx<'_>, session: &mut UserSession, data: &str) -> HandlerResult {
    let route = route_callback(data);
    log::debug!("🔘 Callback '{}' from user {} -> {:?}", data, ctx.user.id, route);

    match route {
        Route::Exact(route) => {
            if route.expected_state().is_some_and(|s| s != session.state) {
                return Ok(commands::outdated_button(session));
            }
            exact(ctx, session, route).await
        }
        Route::Decision(template) => confirmations::resolve(ctx, session, template).await,
        Route::Prefixed(route, rest) => {
            if route.expected_state().is_some_and(|s| s != session.state) {
                return Ok(commands::outdated_button(session));
            }
            match route {
                PrefixRoute::TxType => transactions::on_type_chosen(ctx, session, rest).await,
                PrefixRoute::TxTicker => transactions::on_ticker(ctx, session, rest, None).await,
                PrefixRoute::TxDate => transactions::on_date(session, rest, None),
                PrefixRoute::DeleteTransaction => {
                    transactions::on_delete_pick(ctx, session, rest).await
                }
            }
        }
        Route::Target(action, portfolio) => portfolios::on_target(ctx, session, action, portfolio).await,
        Route::Unknown => {
            log::warn!("⚠️ Unknown callback '{}' from user {}", data, ctx.user.id);
            Ok(commands::outdated_button(session))
        }
    }
}

async fn exact(ctx: &Ctx<'_>, session: &mut UserSession, route: CallbackRoute) -> HandlerResult {
    match route {
        CallbackRoute::Restart => commands::handle_start(ctx, session).await,
        CallbackRoute::Cancel => Ok(commands::finish_flow(None)),
        CallbackRoute::ServiceInfo => Ok(commands::service_info()),
        CallbackRoute::CreatePortfolio => portfolios::begin_create(ctx, session).await,
        CallbackRoute::PortfoliosMenu => Ok(portfolios::menu()),
        CallbackRoute::PickPortfolioToDelete => {
            portfolios::list_for(ctx, PortfolioAction::Delete).await
        }
        CallbackRoute::PickPortfolioToRename => {
            portfolios::list_for(ctx, PortfolioAction::Rename).await
        }
        CallbackRoute::PickPortfolioForDefault => {
            portfolios::list_for(ctx, PortfolioAction::ChangeDefault).await
        }
        CallbackRoute::ShowDefaultPortfolio => portfolios::show_default(ctx).await,
        CallbackRoute::TransactionsMenu => Ok(transactions::menu()),
        CallbackRoute::AddTransaction => transactions::begin_add(ctx, session).await,
        CallbackRoute::ShowLastTransactions => transactions::show_last(ctx).await,
        CallbackRoute::PickTransactionToDelete => transactions::list_for_delete(ctx).await,
        CallbackRoute::ConfirmTransaction => transactions::commit(ctx, session).await,
        CallbackRoute::ReportsMenu => Ok(reports::menu()),
        CallbackRoute::GeneralReport => reports::general(ctx).await,
        CallbackRoute::AdvancedReport => reports::advanced(ctx).await,
    }
}

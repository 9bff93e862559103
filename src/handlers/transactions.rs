use crate::handlers::callbacks::tags;
use crate::handlers::confirmations::{self, ConfirmAction};
use crate::handlers::utils::{
    back_button, bold, escape_markdown_v2, format_quantity, format_usd, inline, main_menu_button,
    new_portfolio_button, quantity_plain, two_columns, usd_plain,
};
use crate::handlers::{commands, Ctx, DialogError, HandlerResult, Reply};
use crate::models::{DialogState, Transaction, TxDraft, TxSide, UserSession, DEFAULT_TICKERS};
use crate::transport::{Button, Keyboard};
use crate::validation::{validate_amount, validate_date, validate_price, validate_ticker};

const LAST_TRANSACTIONS: i64 = 5;
const TOP_TICKERS: i64 = 5;

pub fn menu() -> Reply {
    let rows = vec![
        vec![
            Button::new("➕ Add transaction", tags::ADD_TRANSACTION),
            Button::new("📜 Last 5 transactions", tags::SHOW_LAST_TRANSACTIONS),
        ],
        vec![
            Button::new("🗑 Delete transaction", tags::DELETE_TRANSACTION),
            back_button(),
        ],
    ];
    Reply::prompt(
        format!("💰 {}\n\n{}", bold("Transactions"), escape_markdown_v2("Choose an action:")),
        inline(rows),
    )
}

fn with_error(error: Option<&str>, prompt: &str) -> String {
    match error {
        Some(error) => format!("❌ {}\n\n{}", escape_markdown_v2(error), prompt),
        None => prompt.to_string(),
    }
}

fn step_keyboard() -> Keyboard {
    inline(vec![vec![
        Button::new("🔙 Back", tags::ADD_TRANSACTION),
        main_menu_button(),
    ]])
}

fn no_portfolio_reply() -> Reply {
    Reply::prompt(
        escape_markdown_v2("You have no portfolios yet. Create one first to add transactions."),
        inline(vec![vec![new_portfolio_button(), back_button()]]),
    )
}

/// Начало добавления транзакции: нужен хотя бы один портфель
pub async fn begin_add(ctx: &Ctx<'_>, session: &mut UserSession) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    if !ctx.db().portfolio_exists(user_id).await? {
        return Ok(no_portfolio_reply());
    }

    session.reset(DialogState::WaitingTransactionType);
    Ok(Reply::prompt(
        escape_markdown_v2("Choose what type of transaction you want to add:"),
        inline(vec![
            vec![
                Button::new("🟢 Buy", format!("{}buy", tags::TX_TYPE_PREFIX)),
                Button::new("🔴 Sell", format!("{}sell", tags::TX_TYPE_PREFIX)),
            ],
            vec![main_menu_button()],
        ]),
    ))
}

/// Базовые тикеры плюс самые частые у пользователя, без повторов
pub fn merge_tickers(top: Vec<String>) -> Vec<String> {
    let mut tickers: Vec<String> = DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect();
    for ticker in top {
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

async fn ticker_prompt(ctx: &Ctx<'_>, error: Option<&str>) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let top = ctx.db().top_tickers(user_id, TOP_TICKERS).await?;

    let buttons = merge_tickers(top)
        .into_iter()
        .map(|t| Button::new(t.clone(), format!("{}{}", tags::TX_TICKER_PREFIX, t)))
        .collect();
    let mut rows = two_columns(buttons);
    rows.push(vec![Button::new("🔙 Back", tags::ADD_TRANSACTION)]);

    let prompt = escape_markdown_v2("Please choose an asset or enter a ticker (e.g. BTC, eth, DoGe):");
    Ok(Reply::prompt(with_error(error, &prompt), inline(rows)))
}

pub async fn on_type_chosen(ctx: &Ctx<'_>, session: &mut UserSession, side: &str) -> HandlerResult {
    let side: TxSide = match side.parse() {
        Ok(side) => side,
        Err(e) => {
            log::warn!("⚠️ {} from user {}", e, ctx.user.id);
            return Ok(commands::outdated_button(session));
        }
    };

    session.tx_draft = TxDraft {
        side: Some(side),
        ..TxDraft::default()
    };
    session.state = DialogState::WaitingTransactionAsset;
    ticker_prompt(ctx, None).await
}

fn amount_prompt(error: Option<&str>) -> Reply {
    let prompt = escape_markdown_v2("Enter the asset amount (e.g. 1234, 12.34):");
    Reply::prompt(with_error(error, &prompt), step_keyboard())
}

fn price_prompt(ticker: &str, error: Option<&str>) -> Reply {
    let prompt = escape_markdown_v2(&format!(
        "Enter the price of 1 {} in USD (e.g. 1234, 12.34):",
        ticker
    ));
    Reply::prompt(with_error(error, &prompt), step_keyboard())
}

fn date_prompt(error: Option<&str>) -> Reply {
    let date_button = |label: &str, token: &str| Button::new(label, format!("{}{}", tags::TX_DATE_PREFIX, token));
    let rows = vec![
        vec![date_button("Today", "today"), date_button("Yesterday", "yesterday")],
        vec![date_button("2 days ago", "2days"), date_button("1 week ago", "1week")],
        vec![date_button("1 month ago", "1month")],
        vec![Button::new("🔙 Back", tags::ADD_TRANSACTION), main_menu_button()],
    ];
    let prompt = escape_markdown_v2("Select the transaction date or enter it as YYYY-MM-DD:");
    Reply::prompt(with_error(error, &prompt), inline(rows))
}

/// Тикер приходит и кнопкой, и текстом
pub async fn on_ticker(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    raw: &str,
    consumed: Option<i32>,
) -> HandlerResult {
    let reply = Reply::new().with_delete(consumed);
    match validate_ticker(raw) {
        Ok(ticker) => {
            session.tx_draft.ticker = Some(ticker);
            session.state = DialogState::WaitingTransactionAssetAmount;
            Ok(reply.then(amount_prompt(None)))
        }
        Err(rejection) => {
            let prompt = ticker_prompt(ctx, Some(&rejection.to_string())).await?;
            Ok(reply.then(prompt))
        }
    }
}

pub fn on_amount(session: &mut UserSession, raw: &str, consumed: Option<i32>) -> HandlerResult {
    let reply = Reply::new().with_delete(consumed);
    match validate_amount(raw) {
        Ok(amount) => {
            let ticker = session
                .tx_draft
                .ticker
                .clone()
                .ok_or_else(|| DialogError::missing("transaction ticker"))?;
            session.tx_draft.amount = Some(amount);
            session.state = DialogState::WaitingTransactionAssetPrice;
            Ok(reply.then(price_prompt(&ticker, None)))
        }
        Err(rejection) => Ok(reply.then(amount_prompt(Some(&rejection.to_string())))),
    }
}

pub fn on_price(session: &mut UserSession, raw: &str, consumed: Option<i32>) -> HandlerResult {
    let reply = Reply::new().with_delete(consumed);
    match validate_price(raw) {
        Ok(price) => {
            session.tx_draft.price = Some(price);
            session.state = DialogState::WaitingTransactionDate;
            Ok(reply.then(date_prompt(None)))
        }
        Err(rejection) => {
            let ticker = session.tx_draft.ticker.as_deref().unwrap_or("asset");
            Ok(reply.then(price_prompt(ticker, Some(&rejection.to_string()))))
        }
    }
}

pub fn on_date(session: &mut UserSession, raw: &str, consumed: Option<i32>) -> HandlerResult {
    let reply = Reply::new().with_delete(consumed);
    match validate_date(raw) {
        Ok(date) => {
            session.tx_draft.date = Some(date);
            session.state = DialogState::WaitingTransactionConfirmation;
            Ok(reply.then(confirmation_prompt(&session.tx_draft)?))
        }
        Err(rejection) => Ok(reply.then(date_prompt(Some(&rejection.to_string())))),
    }
}

fn confirmation_prompt(draft: &TxDraft) -> HandlerResult {
    let side = draft.side.ok_or_else(|| DialogError::missing("transaction side"))?;
    let ticker = draft
        .ticker
        .as_deref()
        .ok_or_else(|| DialogError::missing("transaction ticker"))?;
    let (amount, price, date) = match (draft.amount, draft.price, draft.date) {
        (Some(amount), Some(price), Some(date)) => (amount, price, date),
        _ => return Err(DialogError::missing("transaction amount, price or date")),
    };
    let total = amount * price;

    let text = format!(
        "📝 {}\n\n{} Type: {}\n🪙 Asset: {}\n🔢 Amount: {}\n💵 Price: {}\n💰 Total: {}\n📅 Date: {}",
        bold("Please confirm the transaction"),
        side.emoji(),
        bold(&side.as_str().to_uppercase()),
        bold(ticker),
        format_quantity(amount),
        format_usd(price),
        bold(&usd_plain(total)),
        escape_markdown_v2(&date.to_string()),
    );

    Ok(Reply::prompt(
        text,
        inline(vec![
            vec![
                Button::new("✅ Confirm", tags::CONFIRM_TRANSACTION),
                Button::new("🔙 Back", tags::ADD_TRANSACTION),
            ],
            vec![Button::new("❌ Cancel", tags::CANCEL_ACTION)],
        ]),
    ))
}

/// Запись транзакции в портфель по умолчанию
pub async fn commit(ctx: &Ctx<'_>, session: &mut UserSession) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let Some(portfolio) = ctx.db().default_portfolio(user_id).await? else {
        session.reset(DialogState::MainMenu);
        return Ok(no_portfolio_reply());
    };

    let tx = session
        .tx_draft
        .into_new_transaction(portfolio.id)
        .ok_or_else(|| DialogError::missing("transaction draft field"))?;
    ctx.db().add_transaction(&tx).await?;

    log::info!(
        "💾 User {} added {} {} {} to '{}'",
        ctx.user.id,
        tx.side,
        tx.amount,
        tx.ticker,
        portfolio.name
    );

    let text = escape_markdown_v2(&format!(
        "Transaction added successfully: {}, {}!",
        tx.ticker,
        usd_plain(tx.usd_amount)
    ));
    Ok(commands::finish_flow(Some(format!("✅ {}", text))))
}

fn transaction_line(tx: &Transaction) -> String {
    format!(
        "{} {} {} {} {} = {}",
        tx.side.emoji(),
        tx.date,
        tx.side.as_str().to_uppercase(),
        quantity_plain(tx.amount),
        tx.ticker,
        usd_plain(tx.usd_amount)
    )
}

pub async fn show_last(ctx: &Ctx<'_>) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let transactions = ctx.db().last_transactions(user_id, LAST_TRANSACTIONS).await?;

    let keyboard = inline(vec![
        vec![
            Button::new("➕ Add transaction", tags::ADD_TRANSACTION),
            Button::new("🔙 Transactions", tags::TRANSACTIONS_MAIN),
        ],
        vec![main_menu_button()],
    ]);

    if transactions.is_empty() {
        return Ok(Reply::prompt(
            escape_markdown_v2("You have no transactions yet."),
            keyboard,
        ));
    }

    let mut text = format!("📜 {}\n", bold("Last transactions"));
    for tx in &transactions {
        text.push_str(&format!(
            "\n{} {}",
            escape_markdown_v2(&transaction_line(tx)),
            escape_markdown_v2(&format!("({})", tx.portfolio_name))
        ));
    }
    Ok(Reply::prompt(text, keyboard))
}

pub async fn list_for_delete(ctx: &Ctx<'_>) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let transactions = ctx.db().last_transactions(user_id, LAST_TRANSACTIONS).await?;

    if transactions.is_empty() {
        return Ok(Reply::prompt(
            escape_markdown_v2("You have no transactions to delete."),
            inline(vec![vec![back_button()]]),
        ));
    }

    let mut rows: Vec<Vec<Button>> = transactions
        .iter()
        .map(|tx| {
            vec![Button::new(
                transaction_line(tx),
                format!("{}{}", tags::DELETE_TRANSACTION_PREFIX, tx.id),
            )]
        })
        .collect();
    rows.push(vec![back_button()]);

    Ok(Reply::prompt(
        escape_markdown_v2("Select a transaction to delete:"),
        inline(rows),
    ))
}

/// Выбор из списка: в подтверждении показываем саму транзакцию, а не её id
pub async fn on_delete_pick(ctx: &Ctx<'_>, session: &mut UserSession, raw_id: &str) -> HandlerResult {
    let Ok(tx_id) = raw_id.parse::<i64>() else {
        log::warn!("⚠️ Malformed transaction id '{}'", raw_id);
        return Ok(commands::outdated_button(session));
    };

    let user_id = ctx.user_id().await?;
    let transactions = ctx.db().last_transactions(user_id, LAST_TRANSACTIONS).await?;
    let Some(tx) = transactions.iter().find(|tx| tx.id == tx_id) else {
        log::info!("⏭ Transaction {} is no longer in the list of user {}", tx_id, ctx.user.id);
        return Ok(commands::outdated_button(session));
    };

    session.reset(DialogState::MainMenu);
    session.pending_tx_id = Some(tx_id);
    confirmations::ask(
        session,
        ConfirmAction::DeleteTransaction,
        &[&transaction_line(tx)],
    )
}

//! Заглушки хранилища, цен и транспорта для тестов диалогов.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::bot_state::BotState;
use crate::database::{Persistence, StoreError, StoreResult};
use crate::dispatcher::{InboundEvent, UpdateDispatcher, UserRef};
use crate::models::{
    AssetAggregate, NewTransaction, Portfolio, PortfolioAsset, PortfolioSummary, Transaction, TxSide,
    UserSession, PORTFOLIO_LIMIT,
};
use crate::prices::{PriceError, PriceQuote, PriceSource};
use crate::transport::{ChatTransport, Keyboard, TransportError};

#[derive(Default)]
struct Tables {
    next_id: i64,
    /// telegram id -> внутренний id
    users: HashMap<i64, i64>,
    portfolios: Vec<(i64, Portfolio)>,
    transactions: Vec<(i64, NewTransaction)>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_portfolios(&self, user_id: i64) -> impl Iterator<Item = &Portfolio> {
        self.portfolios
            .iter()
            .filter(move |(owner, _)| *owner == user_id)
            .map(|(_, p)| p)
    }

    fn user_transactions(&self, user_id: i64) -> Vec<(i64, &Portfolio, &NewTransaction)> {
        self.transactions
            .iter()
            .filter_map(|(id, tx)| {
                self.portfolios
                    .iter()
                    .find(|(owner, p)| *owner == user_id && p.id == tx.portfolio_id)
                    .map(|(_, p)| (*id, p, tx))
            })
            .collect()
    }
}

// как CASE WHEN side = 'buy' в SQL
fn signed(side: TxSide) -> f64 {
    match side {
        TxSide::Buy => 1.0,
        TxSide::Sell => -1.0,
    }
}

/// Хранилище в памяти с теми же правилами, что и SQL
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
    failing: AtomicBool,
    panicking: AtomicBool,
}

impl MemoryDb {
    /// Все последующие вызовы вернут ошибку базы
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Следующие вызовы паникуют, как упавший обработчик
    pub fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    fn tables(&self) -> StoreResult<std::sync::MutexGuard<'_, Tables>> {
        if self.panicking.load(Ordering::SeqCst) {
            panic!("storage exploded");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tables.lock().unwrap())
    }

    pub fn portfolio_names(&self, telegram_id: i64) -> Vec<String> {
        let tables = self.tables.lock().unwrap();
        let Some(&user_id) = tables.users.get(&telegram_id) else {
            return Vec::new();
        };
        tables.user_portfolios(user_id).map(|p| p.name.clone()).collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.tables.lock().unwrap().transactions.len()
    }
}

#[async_trait]
impl Persistence for MemoryDb {
    async fn user_exists(&self, telegram_id: i64) -> StoreResult<bool> {
        Ok(self.tables()?.users.contains_key(&telegram_id))
    }

    async fn create_user_if_not_exists(&self, telegram_id: i64, _username: &str) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&telegram_id) {
            let id = tables.next_id();
            tables.users.insert(telegram_id, id);
        }
        Ok(())
    }

    async fn lookup_user_id(&self, telegram_id: i64) -> StoreResult<Option<i64>> {
        Ok(self.tables()?.users.get(&telegram_id).copied())
    }

    async fn portfolio_exists(&self, user_id: i64) -> StoreResult<bool> {
        Ok(self.tables()?.user_portfolios(user_id).next().is_some())
    }

    async fn portfolio_name_exists(&self, user_id: i64, name: &str) -> StoreResult<bool> {
        Ok(self.tables()?.user_portfolios(user_id).any(|p| p.name == name))
    }

    async fn reached_portfolio_limit(&self, user_id: i64) -> StoreResult<bool> {
        Ok(self.tables()?.user_portfolios(user_id).count() as i64 >= PORTFOLIO_LIMIT)
    }

    async fn create_portfolio(&self, user_id: i64, name: &str, description: &str) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let is_default = tables.user_portfolios(user_id).next().is_none();
        let id = tables.next_id();
        tables.portfolios.push((
            user_id,
            Portfolio {
                id,
                name: name.to_string(),
                description: description.to_string(),
                is_default,
            },
        ));
        Ok(())
    }

    async fn rename_portfolio(&self, user_id: i64, old_name: &str, new_name: &str) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let portfolio = tables
            .portfolios
            .iter_mut()
            .find(|(owner, p)| *owner == user_id && p.name == old_name)
            .ok_or_else(|| StoreError::NotFound(format!("portfolio '{}'", old_name)))?;
        portfolio.1.name = new_name.to_string();
        Ok(())
    }

    async fn delete_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let id = tables
            .user_portfolios(user_id)
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| StoreError::NotFound(format!("portfolio '{}'", name)))?;
        tables.portfolios.retain(|(_, p)| p.id != id);
        tables.transactions.retain(|(_, tx)| tx.portfolio_id != id);
        Ok(())
    }

    async fn default_portfolio(&self, user_id: i64) -> StoreResult<Option<Portfolio>> {
        Ok(self.tables()?.user_portfolios(user_id).find(|p| p.is_default).cloned())
    }

    async fn change_default_portfolio(&self, user_id: i64, name: &str) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if !tables.user_portfolios(user_id).any(|p| p.name == name) {
            return Err(StoreError::NotFound(format!("portfolio '{}'", name)));
        }
        for (owner, p) in tables.portfolios.iter_mut() {
            if *owner == user_id {
                p.is_default = p.name == name;
            }
        }
        Ok(())
    }

    async fn list_portfolios(&self, user_id: i64, only_non_default: bool) -> StoreResult<Vec<String>> {
        Ok(self
            .tables()?
            .user_portfolios(user_id)
            .filter(|p| !only_non_default || !p.is_default)
            .map(|p| p.name.clone())
            .collect())
    }

    async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        tables.transactions.push((id, tx.clone()));
        Ok(())
    }

    async fn last_transactions(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Transaction>> {
        let tables = self.tables()?;
        let mut rows: Vec<Transaction> = tables
            .user_transactions(user_id)
            .into_iter()
            .map(|(id, p, tx)| Transaction {
                id,
                portfolio_name: p.name.clone(),
                ticker: tx.ticker.clone(),
                side: tx.side,
                amount: tx.amount,
                price: tx.price,
                usd_amount: tx.usd_amount,
                date: tx.date,
            })
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn delete_transaction(&self, user_id: i64, tx_id: i64) -> StoreResult<()> {
        let mut tables = self.tables()?;
        let owned = tables.user_transactions(user_id).iter().any(|(id, _, _)| *id == tx_id);
        if !owned {
            return Err(StoreError::NotFound(format!("transaction {}", tx_id)));
        }
        tables.transactions.retain(|(id, _)| *id != tx_id);
        Ok(())
    }

    async fn top_tickers(&self, user_id: i64, limit: i64) -> StoreResult<Vec<String>> {
        let tables = self.tables()?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_, _, tx) in tables.user_transactions(user_id) {
            *counts.entry(tx.ticker.clone()).or_default() += 1;
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(ranked.into_iter().take(limit as usize).map(|(t, _)| t).collect())
    }

    async fn portfolio_summaries(&self, user_id: i64) -> StoreResult<Vec<PortfolioSummary>> {
        let tables = self.tables()?;
        let mut grouped: BTreeMap<String, BTreeMap<String, (f64, f64)>> = BTreeMap::new();
        for (_, p, tx) in tables.user_transactions(user_id) {
            let entry = grouped
                .entry(p.name.clone())
                .or_default()
                .entry(tx.ticker.clone())
                .or_default();
            entry.0 += signed(tx.side) * tx.amount;
            entry.1 += signed(tx.side) * tx.usd_amount;
        }
        Ok(grouped
            .into_iter()
            .filter_map(|(name, assets)| {
                let assets: Vec<PortfolioAsset> = assets
                    .into_iter()
                    .filter(|(_, (amount, _))| *amount > 0.0)
                    .map(|(ticker, (total_amount, total_usd))| PortfolioAsset {
                        ticker,
                        total_amount,
                        total_usd,
                    })
                    .collect();
                (!assets.is_empty()).then_some(PortfolioSummary { name, assets })
            })
            .collect())
    }

    async fn report_aggregates(&self, user_id: i64) -> StoreResult<Vec<AssetAggregate>> {
        let tables = self.tables()?;
        let mut grouped: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for (_, _, tx) in tables.user_transactions(user_id) {
            let entry = grouped.entry(tx.ticker.clone()).or_default();
            entry.0 += signed(tx.side) * tx.amount;
            entry.1 += signed(tx.side) * tx.usd_amount;
        }
        Ok(grouped
            .into_iter()
            .filter(|(_, (amount, _))| *amount > 0.0)
            .map(|(ticker, (total_amount, net_invested_usd))| AssetAggregate {
                ticker,
                total_amount,
                net_invested_usd,
            })
            .collect())
    }
}

/// Фиксированные цены; `rate_limited` имитирует отказ API
#[derive(Default)]
pub struct FixedPrices {
    pub prices: HashMap<String, f64>,
    pub rate_limited: AtomicBool,
}

impl FixedPrices {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            rate_limited: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PriceSource for FixedPrices {
    async fn fetch_current_prices(&self, tickers: &[String]) -> Result<PriceQuote, PriceError> {
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(PriceError::RateLimited);
        }
        let found: HashMap<String, f64> = tickers
            .iter()
            .filter_map(|t| self.prices.get(t).map(|p| (t.clone(), *p)))
            .collect();
        if found.is_empty() {
            return Err(PriceError::NoPrices(tickers.to_vec()));
        }
        Ok(PriceQuote::from_prices(tickers, found))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Send {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
}

#[derive(Default)]
struct Chat {
    log: Vec<Sent>,
    /// Сообщения, которые сейчас видны: id -> (текст, клавиатура)
    visible: BTreeMap<i32, (String, Option<Keyboard>)>,
}

/// Транспорт, который запоминает всё отправленное
#[derive(Default)]
pub struct RecordingTransport {
    next_id: AtomicI32,
    chat: Mutex<Chat>,
}

impl RecordingTransport {
    pub fn next_message_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn log(&self) -> Vec<Sent> {
        self.chat.lock().unwrap().log.clone()
    }

    pub fn visible_ids(&self) -> HashSet<i32> {
        self.chat.lock().unwrap().visible.keys().copied().collect()
    }

    pub fn visible(&self, message_id: i32) -> Option<(String, Option<Keyboard>)> {
        self.chat.lock().unwrap().visible.get(&message_id).cloned()
    }

    /// Все видимые тексты одной строкой, для поиска подстрок
    pub fn visible_text(&self) -> String {
        let chat = self.chat.lock().unwrap();
        chat.visible
            .values()
            .map(|(text, _)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    /// Сообщение пользователя тоже появляется в чате
    pub fn user_message(&self, text: &str) -> i32 {
        let id = self.next_message_id();
        self.chat
            .lock()
            .unwrap()
            .visible
            .insert(id, (text.to_string(), None));
        id
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<i32, TransportError> {
        let message_id = self.next_message_id();
        let mut chat = self.chat.lock().unwrap();
        chat.log.push(Sent::Send {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        chat.visible.insert(message_id, (text.to_string(), keyboard.cloned()));
        Ok(message_id)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if matches!(keyboard, Some(Keyboard::Menu(_))) {
            return Err(TransportError::Rejected("reply keyboard cannot be edited in place".into()));
        }
        let mut chat = self.chat.lock().unwrap();
        if !chat.visible.contains_key(&message_id) {
            return Err(TransportError::Rejected(format!("message {} not found", message_id)));
        }
        chat.log.push(Sent::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        chat.visible.insert(message_id, (text.to_string(), keyboard.cloned()));
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        let mut chat = self.chat.lock().unwrap();
        if chat.visible.remove(&message_id).is_none() {
            return Err(TransportError::Rejected(format!("message {} not found", message_id)));
        }
        chat.log.push(Sent::Delete { chat_id, message_id });
        Ok(())
    }
}

/// Диспетчер со всеми заглушками, один чат на пользователя
pub struct Harness {
    pub db: Arc<MemoryDb>,
    pub prices: Arc<FixedPrices>,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: UpdateDispatcher,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prices(FixedPrices::new(&[("BTC", 60000.0), ("ETH", 3000.0)]))
    }

    pub fn with_prices(prices: FixedPrices) -> Self {
        let db = Arc::new(MemoryDb::default());
        let prices = Arc::new(prices);
        let transport = Arc::new(RecordingTransport::default());
        let shutdown = CancellationToken::new();
        let state = BotState::new(db.clone(), prices.clone());
        let dispatcher = UpdateDispatcher::new(state, transport.clone(), shutdown.clone());
        Self {
            db,
            prices,
            transport,
            dispatcher,
            shutdown,
        }
    }

    fn user(id: i64) -> Option<UserRef> {
        Some(UserRef {
            id,
            username: Some(format!("user{}", id)),
        })
    }

    /// Возвращает id сообщения пользователя
    pub async fn text(&self, user: i64, text: &str) -> i32 {
        let message_id = self.transport.user_message(text);
        self.dispatcher
            .dispatch(InboundEvent::Message {
                user: Self::user(user),
                chat_id: user,
                message_id,
                text: text.to_string(),
            })
            .await;
        message_id
    }

    /// Нажатие на кнопку живого сообщения
    pub async fn click(&self, user: i64, data: &str) {
        let live = self.session(user).await.and_then(|s| s.bot_message_id);
        self.click_on(user, live, data).await;
    }

    pub async fn click_on(&self, user: i64, message_id: Option<i32>, data: &str) {
        self.dispatcher
            .dispatch(InboundEvent::Callback {
                user: Self::user(user),
                chat_id: user,
                message_id,
                data: data.to_string(),
            })
            .await;
    }

    pub async fn session(&self, user: i64) -> Option<UserSession> {
        self.dispatcher.state().sessions.get(user).await
    }

    /// Текст и клавиатура живого сообщения
    pub async fn live(&self, user: i64) -> Option<(String, Option<Keyboard>)> {
        let id = self.session(user).await?.bot_message_id?;
        self.transport.visible(id)
    }

    pub async fn live_payloads(&self, user: i64) -> Vec<String> {
        self.live(user)
            .await
            .and_then(|(_, keyboard)| keyboard)
            .map(|k| k.payloads().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Регистрация и первый портфель по умолчанию
    pub async fn registered_with_portfolio(&self, user: i64, name: &str) {
        self.text(user, "/start").await;
        self.click(user, "create_portfolio").await;
        self.text(user, name).await;
        self.text(user, "test portfolio").await;
        self.reopen_menu(user).await;
    }

    /// После завершённого сценария сессии нет, меню открывается заново
    pub async fn reopen_menu(&self, user: i64) {
        self.text(user, "/start").await;
    }

    pub async fn add_transaction(&self, user: i64, side: TxSide, ticker: &str, amount: &str, price: &str) {
        self.click(user, "gf_add_transaction").await;
        self.click(user, &format!("tx_type_{}", side.as_str())).await;
        self.text(user, ticker).await;
        self.text(user, amount).await;
        self.text(user, price).await;
        self.click(user, "tx_date_today").await;
        self.click(user, "tx_confirm_transaction").await;
        self.reopen_menu(user).await;
    }
}

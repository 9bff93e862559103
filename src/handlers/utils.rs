use std::time::Duration;

use crate::handlers::callbacks::tags;
use crate::transport::{Button, Keyboard};

/// Время жизни временных сообщений
pub const TTL_SHORT: Duration = Duration::from_secs(10);
pub const TTL_NOTICE: Duration = Duration::from_secs(20);
pub const TTL_LONG: Duration = Duration::from_secs(60);

pub const MENU_PORTFOLIOS: &str = "💼 My portfolios";
pub const MENU_TRANSACTIONS: &str = "💰 Transactions";
pub const MENU_REPORTS: &str = "📊 Reports";
pub const MENU_HELP: &str = "ℹ️ Help";

pub const SERVICE_DESCRIPTION: &str = "Track your crypto portfolios right in the chat. \
Create up to two portfolios, record buy and sell transactions, \
and see cost basis and profit/loss reports with live prices.\n\n\
Commands:\n/start - main menu\n/status - service status";

/// Экранирование MarkdownV2
pub fn escape_markdown_v2(text: &str) -> String {
    let specials = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
    ];
    let mut out = String::with_capacity(text.len() * 2);

    for ch in text.chars() {
        if specials.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn bold(text: &str) -> String {
    format!("*{}*", escape_markdown_v2(text))
}

/// Сумма в долларах с разделителями тысяч, уже экранированная
pub fn format_usd(value: f64) -> String {
    escape_markdown_v2(&usd_plain(value))
}

pub fn usd_plain(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{}", sign, grouped, frac)
}

/// Количество актива: до 8 знаков без хвостовых нулей
pub fn format_quantity(value: f64) -> String {
    escape_markdown_v2(&quantity_plain(value))
}

pub fn quantity_plain(value: f64) -> String {
    let text = format!("{:.8}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn inline(rows: Vec<Vec<Button>>) -> Keyboard {
    Keyboard::Inline(rows)
}

/// Раскладка кнопок по две в ряд
pub fn two_columns(buttons: Vec<Button>) -> Vec<Vec<Button>> {
    let mut rows = Vec::with_capacity(buttons.len().div_ceil(2));
    let mut iter = buttons.into_iter();
    while let Some(first) = iter.next() {
        let mut row = vec![first];
        if let Some(second) = iter.next() {
            row.push(second);
        }
        rows.push(row);
    }
    rows
}

pub fn back_button() -> Button {
    Button::new("🔙 Back", tags::CANCEL_ACTION)
}

pub fn main_menu_button() -> Button {
    Button::new("🏠 Main menu", tags::CANCEL_ACTION)
}

pub fn new_portfolio_button() -> Button {
    Button::new("➕ New portfolio", tags::CREATE_PORTFOLIO)
}

/// Главное меню
pub fn main_menu_keyboard() -> Keyboard {
    Keyboard::Menu(vec![
        vec![MENU_PORTFOLIOS.to_string(), MENU_TRANSACTIONS.to_string()],
        vec![MENU_REPORTS.to_string(), MENU_HELP.to_string()],
    ])
}

pub fn restart_keyboard() -> Keyboard {
    inline(vec![vec![Button::new("🔄 Start over", tags::RESTART)]])
}

pub fn back_keyboard() -> Keyboard {
    inline(vec![vec![back_button()]])
}

use crate::handlers::callbacks::tags;
use crate::handlers::utils::{
    back_button, bold, escape_markdown_v2, format_quantity, format_usd, inline, main_menu_button,
    new_portfolio_button, usd_plain,
};
use crate::handlers::{Ctx, HandlerResult, Reply};
use crate::models::{build_pnl_report, PnlPercent, PnlReport, PortfolioSummary, PositionPnl};
use crate::prices::PriceError;
use crate::transport::{Button, Keyboard};

pub fn menu() -> Reply {
    Reply::prompt(
        format!("📊 {}\n\n{}", bold("Reports"), escape_markdown_v2("Choose a report:")),
        inline(vec![
            vec![
                Button::new("📋 General report", tags::REPORTS_GENERAL),
                Button::new("📈 P&L report", tags::REPORTS_ADVANCED),
            ],
            vec![back_button()],
        ]),
    )
}

fn report_keyboard(refresh_tag: &str) -> Keyboard {
    inline(vec![
        vec![
            Button::new("🔄 Refresh", refresh_tag),
            Button::new("🔙 Reports", tags::REPORTS_MAIN),
        ],
        vec![main_menu_button()],
    ])
}

fn empty_reply() -> Reply {
    Reply::prompt(
        escape_markdown_v2("You have no holdings yet. Add a transaction to see a report."),
        inline(vec![
            vec![Button::new("➕ Add transaction", tags::ADD_TRANSACTION)],
            vec![new_portfolio_button(), back_button()],
        ]),
    )
}

pub fn render_general(summaries: &[PortfolioSummary]) -> String {
    let mut text = format!("📋 {}\n", bold("General report"));
    let mut grand_total = 0.0;

    for summary in summaries {
        text.push_str(&format!("\n📁 {}\n", bold(&summary.name)));
        if summary.assets.is_empty() {
            text.push_str(&escape_markdown_v2("  no holdings\n"));
            continue;
        }
        for asset in &summary.assets {
            text.push_str(&format!(
                "  • {}: {} \\= {}\n",
                escape_markdown_v2(&asset.ticker),
                format_quantity(asset.total_amount),
                format_usd(asset.total_usd)
            ));
        }
        let total = summary.total_usd();
        grand_total += total;
        text.push_str(&format!("  {} {}\n", escape_markdown_v2("Total:"), bold(&usd_plain(total))));
    }

    text.push_str(&format!(
        "\n💰 {} {}",
        escape_markdown_v2("Grand total:"),
        bold(&usd_plain(grand_total))
    ));
    text
}

/// Сводка по портфелям: только положительные остатки
pub async fn general(ctx: &Ctx<'_>) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let summaries = ctx.db().portfolio_summaries(user_id).await?;

    if summaries.iter().all(|s| s.assets.is_empty()) {
        return Ok(empty_reply());
    }
    Ok(Reply::prompt(
        render_general(&summaries),
        report_keyboard(tags::REPORTS_GENERAL),
    ))
}

fn percent_text(percent: PnlPercent) -> String {
    match percent {
        PnlPercent::Ratio(value) => escape_markdown_v2(&format!("{:+.2}%", value)),
        PnlPercent::PureProfit => bold("🚀 PURE PROFIT"),
    }
}

fn pnl_emoji(pnl: f64) -> &'static str {
    if pnl >= 0.0 {
        "🟢"
    } else {
        "🔴"
    }
}

fn render_position(position: &PositionPnl) -> String {
    let mut text = format!("\n🪙 {}\n", bold(&position.ticker));
    text.push_str(&format!("  Amount: {}\n", format_quantity(position.amount)));

    if position.invested < 0.0 {
        text.push_str(&format!(
            "  Net Profit Taken: {}\n",
            format_usd(-position.invested)
        ));
    } else {
        text.push_str(&format!("  Invested: {}\n", format_usd(position.invested)));
        text.push_str(&format!("  Avg price: {}\n", format_usd(position.avg_price)));
    }

    text.push_str(&format!("  Current price: {}\n", format_usd(position.current_price)));
    text.push_str(&format!("  Value: {}\n", format_usd(position.current_value)));
    text.push_str(&format!(
        "  {} P&L: {} \\({}\\)\n",
        pnl_emoji(position.pnl_usd),
        format_usd(position.pnl_usd),
        percent_text(position.pnl_percent)
    ));

    match position.break_even_price() {
        Some(price) => text.push_str(&format!("  Break\\-even: {}\n", format_usd(price))),
        None => text.push_str(&escape_markdown_v2("  Break-even: already covered\n")),
    }
    text
}

pub fn render_pnl(report: &PnlReport) -> String {
    let mut text = format!("📈 {}\n", bold("Profit & Loss report"));
    for position in &report.positions {
        text.push_str(&render_position(position));
    }

    text.push_str(&format!("\n💼 {}\n", bold("Total")));
    if report.total_invested < 0.0 {
        text.push_str(&format!(
            "  Net Profit Taken: {}\n",
            format_usd(-report.total_invested)
        ));
    } else {
        text.push_str(&format!("  Invested: {}\n", format_usd(report.total_invested)));
    }
    text.push_str(&format!("  Value: {}\n", format_usd(report.total_value)));
    text.push_str(&format!(
        "  {} P&L: {} \\({}\\)",
        pnl_emoji(report.total_pnl()),
        format_usd(report.total_pnl()),
        percent_text(report.total_percent())
    ));

    if !report.skipped.is_empty() {
        text.push_str(&format!(
            "\n\n⚠️ {}",
            escape_markdown_v2(&format!("No price for: {}", report.skipped.join(", ")))
        ));
    }
    text
}

/// Подсказка по классу ошибки цен, текст ошибки пользователю не показываем
fn price_error_reply(error: &PriceError) -> Reply {
    let hint = match error {
        PriceError::NoPrices(_) => "No valid prices were found for your assets. Please try again later.",
        PriceError::RateLimited => "The price service is busy right now (rate limit). Please try again in a minute.",
        _ => "Could not load current prices. Please try again later.",
    };
    Reply::prompt(
        format!("⚠️ {}", escape_markdown_v2(hint)),
        inline(vec![vec![
            Button::new("🔄 Try again", tags::REPORTS_ADVANCED),
            main_menu_button(),
        ]]),
    )
}

pub async fn advanced(ctx: &Ctx<'_>) -> HandlerResult {
    let user_id = ctx.user_id().await?;
    let aggregates = ctx.db().report_aggregates(user_id).await?;
    if aggregates.is_empty() {
        return Ok(empty_reply());
    }

    let tickers: Vec<String> = aggregates.iter().map(|a| a.ticker.clone()).collect();
    let quote = match ctx.state.prices.fetch_current_prices(&tickers).await {
        Ok(quote) => quote,
        Err(e) => {
            log::error!("❌ Price fetch for user {} failed: {}", ctx.user.id, e);
            return Ok(price_error_reply(&e));
        }
    };

    let report = build_pnl_report(&aggregates, &quote.prices);
    log::info!(
        "📈 P&L report for user {}: {} positions, {} skipped",
        ctx.user.id,
        report.positions.len(),
        report.skipped.len()
    );
    Ok(Reply::prompt(
        render_pnl(&report),
        report_keyboard(tags::REPORTS_ADVANCED),
    ))
}

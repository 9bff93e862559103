pub mod portfolio;
pub mod report;
pub mod session;
pub mod transaction;
pub mod user_state;

pub use portfolio::{Portfolio, PortfolioAsset, PortfolioSummary, PORTFOLIO_LIMIT};
pub use report::{build_pnl_report, AssetAggregate, PnlPercent, PnlReport, PositionPnl};
pub use session::{SessionField, UserSession};
pub use transaction::{NewTransaction, Transaction, TxDraft, TxSide, DEFAULT_TICKERS};
pub use user_state::DialogState;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Шаг диалога, в котором находится пользователь
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DialogState {
    #[default]
    Idle,
    MainMenu,
    WaitingPortfolioName,
    WaitingPortfolioDescription,
    WaitingForNewPortfolioName,
    WaitingRenamePortfolioDecision,
    WaitingDeletePortfolioDecision,
    WaitingChangeDefaultPortfolioDecision,
    WaitingTransactionType,
    WaitingTransactionAsset,
    WaitingTransactionAssetAmount,
    WaitingTransactionAssetPrice,
    WaitingTransactionDate,
    WaitingTransactionConfirmation,
    WaitingDeleteTransactionDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dialog state '{0}'")]
pub struct UnknownState(pub String);

impl DialogState {
    pub const ALL: [DialogState; 15] = [
        DialogState::Idle,
        DialogState::MainMenu,
        DialogState::WaitingPortfolioName,
        DialogState::WaitingPortfolioDescription,
        DialogState::WaitingForNewPortfolioName,
        DialogState::WaitingRenamePortfolioDecision,
        DialogState::WaitingDeletePortfolioDecision,
        DialogState::WaitingChangeDefaultPortfolioDecision,
        DialogState::WaitingTransactionType,
        DialogState::WaitingTransactionAsset,
        DialogState::WaitingTransactionAssetAmount,
        DialogState::WaitingTransactionAssetPrice,
        DialogState::WaitingTransactionDate,
        DialogState::WaitingTransactionConfirmation,
        DialogState::WaitingDeleteTransactionDecision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DialogState::Idle => "idle",
            DialogState::MainMenu => "main_menu",
            DialogState::WaitingPortfolioName => "waiting_portfolio_name",
            DialogState::WaitingPortfolioDescription => "waiting_portfolio_description",
            DialogState::WaitingForNewPortfolioName => "waiting_for_new_portfolio_name",
            DialogState::WaitingRenamePortfolioDecision => "waiting_rename_portfolio_decision",
            DialogState::WaitingDeletePortfolioDecision => "waiting_delete_portfolio_decision",
            DialogState::WaitingChangeDefaultPortfolioDecision => {
                "waiting_change_default_portfolio_decision"
            }
            DialogState::WaitingTransactionType => "waiting_transaction_type",
            DialogState::WaitingTransactionAsset => "waiting_transaction_asset",
            DialogState::WaitingTransactionAssetAmount => "waiting_transaction_asset_amount",
            DialogState::WaitingTransactionAssetPrice => "waiting_transaction_asset_price",
            DialogState::WaitingTransactionDate => "waiting_transaction_date",
            DialogState::WaitingTransactionConfirmation => "waiting_transaction_confirmation",
            DialogState::WaitingDeleteTransactionDecision => "waiting_delete_transaction_decision",
        }
    }
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialogState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DialogState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

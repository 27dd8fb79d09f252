use thiserror::Error;

use crate::domain::{AccountId, Cents, Currency, EntryId, TransferId};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Currency mismatch: cannot transfer {from} into a {to} account")]
    CurrencyMismatch { from: Currency, to: Currency },

    #[error("Balance of account {account_id} would overflow")]
    BalanceOverflow { account_id: AccountId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Caller mistakes that are fixed by changing the input, not by retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAmount(_)
                | AppError::UnsupportedCurrency(_)
                | AppError::CurrencyMismatch { .. }
        )
    }
}

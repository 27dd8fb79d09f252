use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, Currency};

pub type AccountId = i64;

/// A balance-holding account. The balance is only ever changed by the
/// transfer engine, inside the same store transaction that records the
/// matching entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub currency: Currency,
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

/// Input for opening a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: Currency,
    /// Opening balance in cents.
    pub balance: Cents,
}

impl CreateAccountParams {
    pub fn new(owner: impl Into<String>, currency: Currency) -> Self {
        Self {
            owner: owner.into(),
            currency,
            balance: 0,
        }
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.balance = balance;
        self
    }
}

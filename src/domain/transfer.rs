use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Account, AccountId, Cents, Entry};

pub type TransferId = i64;

/// The record of one money movement. Always paired with exactly two entries
/// whose amounts cancel out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Always positive
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn is_self_transfer(&self) -> bool {
        self.from_account_id == self.to_account_id
    }
}

/// Caller input for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Cents) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// The account whose row is updated first: the lower id of the pair.
    pub fn first_locked(&self) -> AccountId {
        self.from_account_id.min(self.to_account_id)
    }

    /// The debit and the credit as `(account, delta)` pairs, in the order the
    /// account rows are updated. The row returned by `first_locked` comes first.
    pub fn balance_deltas(&self) -> [(AccountId, Cents); 2] {
        let debit = (self.from_account_id, -self.amount);
        let credit = (self.to_account_id, self.amount);
        if self.first_locked() == self.from_account_id {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}

/// Everything a committed transfer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl TransferResult {
    /// Sum of both entry amounts. Zero for every well-formed transfer.
    pub fn entries_total(&self) -> Cents {
        self.from_entry.amount + self.to_entry.amount
    }
}

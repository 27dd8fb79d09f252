use tracing::{debug, instrument};

use crate::domain::{Account, AccountId, Cents, TransferParams, TransferResult};
use crate::storage::{Queries, UnitOfWork};

use super::AppError;

/// Rules applied to every transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    /// When false, a debit that would take the source account below zero is
    /// rejected. Self-transfers are never rejected since their net change is zero.
    pub allow_negative_balance: bool,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            allow_negative_balance: true,
        }
    }
}

/// The money-transfer business transaction, run through `Store::exec_tx`.
///
/// Writes happen in a fixed order: transfer row, debit entry, credit entry,
/// then both balances. Balances are re-read inside the transaction and the
/// two account rows are always updated lowest id first
/// ([`TransferParams::balance_deltas`]), whichever side is the source. Both
/// accounts must hold the same currency. Two transfers running in opposite directions over the same
/// pair therefore request row locks in the same order and cannot deadlock.
#[derive(Debug, Clone, Copy)]
pub struct TransferTx {
    params: TransferParams,
    policy: TransferPolicy,
}

impl TransferTx {
    pub fn new(params: TransferParams, policy: TransferPolicy) -> Self {
        Self { params, policy }
    }
}

impl UnitOfWork for TransferTx {
    type Output = TransferResult;
    type Error = AppError;

    #[instrument(name = "transfer_tx", skip_all, fields(
        from = self.params.from_account_id,
        to = self.params.to_account_id,
        amount = self.params.amount,
    ))]
    async fn execute(self, queries: &mut Queries<'_>) -> Result<TransferResult, AppError> {
        let TransferParams {
            from_account_id: from,
            to_account_id: to,
            amount,
        } = self.params;

        let transfer = match queries.create_transfer(&self.params).await {
            Ok(transfer) => transfer,
            Err(err) if err.is_foreign_key_violation() => {
                return Err(match missing_account(queries, &self.params).await? {
                    Some(id) => AppError::AccountNotFound(id),
                    None => err.into(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let from_entry = queries.create_entry(from, -amount).await?;
        let to_entry = queries.create_entry(to, amount).await?;

        let (from_account, to_account) = if from == to {
            // Net change is zero: the row is written back once with its current balance.
            let account = load_account(queries, from).await?;
            let account = write_balance(queries, account.id, account.balance).await?;
            (account.clone(), account)
        } else {
            let [first, second] = self.params.balance_deltas();
            let first_account = load_account(queries, first.0).await?;
            let second_account = load_account(queries, second.0).await?;
            let (source, destination) = if first.0 == from {
                (&first_account, &second_account)
            } else {
                (&second_account, &first_account)
            };

            if source.currency != destination.currency {
                return Err(AppError::CurrencyMismatch {
                    from: source.currency,
                    to: destination.currency,
                });
            }
            if !self.policy.allow_negative_balance && source.balance < amount {
                return Err(AppError::InsufficientFunds {
                    account_id: from,
                    balance: source.balance,
                    required: amount,
                });
            }

            let first_updated = apply_delta(queries, &first_account, first.1).await?;
            let second_updated = apply_delta(queries, &second_account, second.1).await?;
            if first.0 == from {
                (first_updated, second_updated)
            } else {
                (second_updated, first_updated)
            }
        };

        debug!(
            transfer_id = transfer.id,
            from_balance = from_account.balance,
            to_balance = to_account.balance,
            "transfer applied"
        );

        Ok(TransferResult {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    }
}

/// Which side of a transfer whose insert hit a foreign key failure is absent.
/// The source is reported first when both are.
async fn missing_account(
    queries: &mut Queries<'_>,
    params: &TransferParams,
) -> Result<Option<AccountId>, AppError> {
    for id in [params.from_account_id, params.to_account_id] {
        if queries.get_account(id).await?.is_none() {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

async fn load_account(queries: &mut Queries<'_>, id: AccountId) -> Result<Account, AppError> {
    queries
        .get_account(id)
        .await?
        .ok_or(AppError::AccountNotFound(id))
}

async fn apply_delta(
    queries: &mut Queries<'_>,
    account: &Account,
    delta: Cents,
) -> Result<Account, AppError> {
    let balance = account
        .balance
        .checked_add(delta)
        .ok_or(AppError::BalanceOverflow {
            account_id: account.id,
        })?;
    write_balance(queries, account.id, balance).await
}

async fn write_balance(
    queries: &mut Queries<'_>,
    id: AccountId,
    balance: Cents,
) -> Result<Account, AppError> {
    queries
        .update_account(id, balance)
        .await?
        .ok_or(AppError::AccountNotFound(id))
}

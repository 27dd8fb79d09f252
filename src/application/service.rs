use tracing::{info, instrument};

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, Cents, CreateAccountParams, Currency, Entry, EntryId, IntegrityReport,
    Transfer, TransferId, TransferParams, TransferResult, build_integrity_report,
};
use crate::storage::{Context, Page, Queries, Store, UnitOfWork};

use super::{AppError, TransferPolicy, TransferTx};

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, tests).
#[derive(Clone)]
pub struct LedgerService {
    store: Store,
    policy: TransferPolicy,
}

/// Filter for listing transfers.
#[derive(Debug, Clone, Copy)]
pub struct TransferFilter {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub page: Page,
}

struct CreateAccountTx(CreateAccountParams);

impl UnitOfWork for CreateAccountTx {
    type Output = Account;
    type Error = AppError;

    async fn execute(self, queries: &mut Queries<'_>) -> Result<Account, AppError> {
        Ok(queries.create_account(&self.0).await?)
    }
}

impl LedgerService {
    /// Create a new ledger service over an already connected store.
    pub fn new(store: Store, policy: TransferPolicy) -> Self {
        Self { store, policy }
    }

    /// Initialize a new database at the given path with default settings.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        Self::init_with(&LedgerConfig::for_database(database_path)).await
    }

    /// Create (if needed) and migrate the database described by `config`.
    pub async fn init_with(config: &LedgerConfig) -> Result<Self, AppError> {
        let store = Store::init(&config.store_options(true)).await?;
        Ok(Self::new(store, config.transfer_policy()))
    }

    /// Connect to an existing database.
    pub async fn connect_with(config: &LedgerConfig) -> Result<Self, AppError> {
        let store = Store::connect_with(&config.store_options(false)).await?;
        Ok(Self::new(store, config.transfer_policy()))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn policy(&self) -> TransferPolicy {
        self.policy
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account.
    pub async fn create_account(
        &self,
        owner: &str,
        currency: &str,
        balance: Cents,
    ) -> Result<Account, AppError> {
        let currency = Currency::from_code(currency)
            .ok_or_else(|| AppError::UnsupportedCurrency(currency.to_string()))?;
        let params = CreateAccountParams::new(owner, currency).with_balance(balance);

        let account = self
            .store
            .exec_tx(&Context::background(), CreateAccountTx(params))
            .await?;
        info!(account_id = account.id, currency = %account.currency, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        let mut conn = self.store.connection().await?;
        Queries::new(&mut conn)
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    pub async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, AppError> {
        let mut conn = self.store.connection().await?;
        Ok(Queries::new(&mut conn).list_accounts(page).await?)
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move `amount` cents from one account to another in a single atomic
    /// unit: one transfer record, a debit and a credit entry, and both
    /// balance updates. Either all of it commits or none of it is visible.
    #[instrument(skip(self, ctx))]
    pub async fn transfer(
        &self,
        ctx: &Context,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<TransferResult, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "Amount must be positive, got {amount}"
            )));
        }

        let params = TransferParams::new(from_account_id, to_account_id, amount);
        let result = self
            .store
            .exec_tx(ctx, TransferTx::new(params, self.policy))
            .await?;

        info!(transfer_id = result.transfer.id, "transfer committed");
        Ok(result)
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        let mut conn = self.store.connection().await?;
        Queries::new(&mut conn)
            .get_transfer(id)
            .await?
            .ok_or(AppError::TransferNotFound(id))
    }

    pub async fn list_transfers(&self, filter: TransferFilter) -> Result<Vec<Transfer>, AppError> {
        let mut conn = self.store.connection().await?;
        Ok(Queries::new(&mut conn)
            .list_transfers(filter.from_account_id, filter.to_account_id, filter.page)
            .await?)
    }

    // ========================
    // Entry operations
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, AppError> {
        let mut conn = self.store.connection().await?;
        Queries::new(&mut conn)
            .get_entry(id)
            .await?
            .ok_or(AppError::EntryNotFound(id))
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, AppError> {
        let mut conn = self.store.connection().await?;
        Ok(Queries::new(&mut conn)
            .list_entries(account_id, page)
            .await?)
    }

    // ========================
    // Integrity
    // ========================

    /// Check the double-entry invariants over the whole ledger.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let mut conn = self.store.connection().await?;
        let stats = Queries::new(&mut conn).integrity_stats().await?;
        Ok(build_integrity_report(&stats))
    }
}

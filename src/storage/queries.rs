use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    Account, AccountId, Cents, CreateAccountParams, Currency, Entry, EntryId, IntegrityStats,
    Transfer, TransferId, TransferParams,
};

use super::StoreError;

/// Page selection for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Ledger repository bound to a single connection.
///
/// The connection is either a plain pooled connection (autocommit reads) or
/// the connection of an open transaction handed out by
/// [`Store::exec_tx`](super::Store::exec_tx); every query then runs inside
/// that transaction. Lookups of missing rows return `None`.
pub struct Queries<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> Queries<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub(super) fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.conn
    }

    // ========================
    // Accounts
    // ========================

    pub async fn create_account(
        &mut self,
        params: &CreateAccountParams,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (owner, currency, balance, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, owner, currency, balance, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(params.currency.as_str())
        .bind(params.balance)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(StoreError::query("create_account"))?;

        row_to_account(&row)
    }

    pub async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, currency, balance, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(StoreError::query("get_account"))?;

        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn list_accounts(&mut self, page: Page) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, currency, balance, created_at
            FROM accounts
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(StoreError::query("list_accounts"))?;

        rows.iter().map(row_to_account).collect()
    }

    /// Overwrite an account's balance. Returns `None` when no such account exists.
    pub async fn update_account(
        &mut self,
        id: AccountId,
        balance: Cents,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = ?
            WHERE id = ?
            RETURNING id, owner, currency, balance, created_at
            "#,
        )
        .bind(balance)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(StoreError::query("update_account"))?;

        row.as_ref().map(row_to_account).transpose()
    }

    // ========================
    // Entries
    // ========================

    pub async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Entry, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount, created_at)
            VALUES (?, ?, ?)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(StoreError::query("create_entry"))?;

        row_to_entry(&row)
    }

    pub async fn get_entry(&mut self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(StoreError::query("get_entry"))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    pub async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(StoreError::query("list_entries"))?;

        rows.iter().map(row_to_entry).collect()
    }

    // ========================
    // Transfers
    // ========================

    pub async fn create_transfer(
        &mut self,
        params: &TransferParams,
    ) -> Result<Transfer, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(StoreError::query("create_transfer"))?;

        row_to_transfer(&row)
    }

    pub async fn get_transfer(&mut self, id: TransferId) -> Result<Option<Transfer>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(StoreError::query("get_transfer"))?;

        row.as_ref().map(row_to_transfer).transpose()
    }

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`, oldest first.
    pub async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = ? OR to_account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(StoreError::query("list_transfers"))?;

        rows.iter().map(row_to_transfer).collect()
    }

    // ========================
    // Integrity
    // ========================

    pub async fn integrity_stats(&mut self) -> Result<IntegrityStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM transfers) AS transfer_count,
                (SELECT COUNT(*) FROM entries) AS entry_count,
                (SELECT COALESCE(SUM(amount), 0) FROM entries) AS entries_total,
                (SELECT COUNT(*) FROM transfers WHERE amount <= 0) AS invalid_amounts,
                (
                    (SELECT COUNT(*) FROM transfers t
                     WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.from_account_id)
                        OR NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.to_account_id))
                  + (SELECT COUNT(*) FROM entries e
                     WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = e.account_id))
                ) AS dangling_refs
            "#,
        )
        .fetch_one(&mut *self.conn)
        .await
        .map_err(StoreError::query("integrity_stats"))?;

        Ok(IntegrityStats {
            account_count: row.get("account_count"),
            transfer_count: row.get("transfer_count"),
            entry_count: row.get("entry_count"),
            entries_total: row.get("entries_total"),
            invalid_amounts: row.get("invalid_amounts"),
            dangling_refs: row.get("dangling_refs"),
        })
    }
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode {
            column,
            detail: e.to_string(),
        })
}

fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
    let currency_str: String = row.get("currency");
    let created_at_str: String = row.get("created_at");

    Ok(Account {
        id: row.get("id"),
        owner: row.get("owner"),
        currency: Currency::from_code(&currency_str).ok_or_else(|| StoreError::Decode {
            column: "currency",
            detail: format!("unsupported currency {currency_str}"),
        })?,
        balance: row.get("balance"),
        created_at: parse_timestamp("created_at", &created_at_str)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry, StoreError> {
    let created_at_str: String = row.get("created_at");

    Ok(Entry {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: row.get("amount"),
        created_at: parse_timestamp("created_at", &created_at_str)?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer, StoreError> {
    let created_at_str: String = row.get("created_at");

    Ok(Transfer {
        id: row.get("id"),
        from_account_id: row.get("from_account_id"),
        to_account_id: row.get("to_account_id"),
        amount: row.get("amount"),
        created_at: parse_timestamp("created_at", &created_at_str)?,
    })
}

mod common;

use std::time::Duration;

use anyhow::Result;
use common::{create_account, create_account_in, test_service, test_service_with};
use tally::application::{AppError, LedgerService};
use tally::storage::{Page, Queries, StoreError, UnitOfWork};
use tally::{Context, Currency, TransferParams};

/// Writes part of a transfer and then fails, like a step erroring mid-way.
struct FailAfterWrites {
    params: TransferParams,
}

impl UnitOfWork for FailAfterWrites {
    type Output = ();
    type Error = AppError;

    async fn execute(self, queries: &mut Queries<'_>) -> Result<(), AppError> {
        queries.create_transfer(&self.params).await?;
        queries
            .create_entry(self.params.from_account_id, -self.params.amount)
            .await?;
        queries
            .update_account(self.params.from_account_id, -999)
            .await?;
        Err(AppError::InvalidAmount("simulated failure".to_string()))
    }
}

async fn assert_nothing_written(service: &LedgerService) -> Result<()> {
    let report = service.check_integrity().await?;
    assert_eq!(report.transfer_count, 0);
    assert_eq!(report.entry_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 100).await?;
    let a2 = create_account(&service, 100).await?;

    for amount in [0, -5] {
        let err = service
            .transfer(&Context::background(), a1.id, a2.id, amount)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)), "got {err:?}");
        assert!(err.is_validation());
    }

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(a1.id).await?.balance, 100);
    Ok(())
}

#[tokio::test]
async fn test_missing_account_is_named() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 100).await?;

    let err = service
        .transfer(&Context::background(), a1.id, 9_999, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(9_999)), "got {err:?}");

    let err = service
        .transfer(&Context::background(), 8_888, a1.id, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(8_888)), "got {err:?}");

    // Both missing: the source is reported
    let err = service
        .transfer(&Context::background(), 7_777, 6_666, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(7_777)), "got {err:?}");

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(a1.id).await?.balance, 100);
    Ok(())
}

#[tokio::test]
async fn test_currency_mismatch_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let usd = create_account_in(&service, "USD", 100).await?;
    let eur = create_account_in(&service, "EUR", 100).await?;

    let err = service
        .transfer(&Context::background(), usd.id, eur.id, 10)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            AppError::CurrencyMismatch {
                from: Currency::Usd,
                to: Currency::Eur
            }
        ),
        "got {err:?}"
    );
    assert!(err.is_validation());

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(usd.id).await?.balance, 100);
    assert_eq!(service.get_account(eur.id).await?.balance, 100);
    Ok(())
}

#[tokio::test]
async fn test_failure_after_writes_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 100).await?;
    let a2 = create_account(&service, 100).await?;

    let work = FailAfterWrites {
        params: TransferParams::new(a1.id, a2.id, 25),
    };
    let err = service
        .store()
        .exec_tx(&Context::background(), work)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)), "got {err:?}");

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(a1.id).await?.balance, 100);
    assert!(service.list_entries(a1.id, Page::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_negative_balance_allowed_by_default() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 20).await?;
    let a2 = create_account(&service, 0).await?;

    let result = service
        .transfer(&Context::background(), a1.id, a2.id, 30)
        .await?;
    assert_eq!(result.from_account.balance, -10);
    assert_eq!(result.to_account.balance, 30);
    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_when_negative_denied() -> Result<()> {
    let (service, _temp) = test_service_with(|c| c.allow_negative_balance = false).await?;
    let a1 = create_account(&service, 20).await?;
    let a2 = create_account(&service, 0).await?;

    let err = service
        .transfer(&Context::background(), a1.id, a2.id, 30)
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientFunds {
            account_id,
            balance,
            required,
        } => {
            assert_eq!(account_id, a1.id);
            assert_eq!(balance, 20);
            assert_eq!(required, 30);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
    assert_nothing_written(&service).await?;

    // Exactly the available balance is fine, and so is a self-transfer from empty
    service
        .transfer(&Context::background(), a1.id, a2.id, 20)
        .await?;
    service
        .transfer(&Context::background(), a1.id, a1.id, 50)
        .await?;
    assert_eq!(service.get_account(a1.id).await?.balance, 0);
    Ok(())
}

#[tokio::test]
async fn test_balance_overflow_aborts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 10).await?;
    let a2 = create_account(&service, i64::MAX - 5).await?;

    let err = service
        .transfer(&Context::background(), a1.id, a2.id, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BalanceOverflow { account_id } if account_id == a2.id));

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(a1.id).await?.balance, 10);
    Ok(())
}

#[tokio::test]
async fn test_self_transfer_near_limits_leaves_balance_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let low = create_account(&service, i64::MIN + 5).await?;
    let high = create_account(&service, i64::MAX - 5).await?;

    for account in [&low, &high] {
        let result = service
            .transfer(&Context::background(), account.id, account.id, 10)
            .await?;
        assert_eq!(result.from_account.balance, account.balance);
        assert_eq!(result.to_account.balance, account.balance);
        assert_eq!(service.get_account(account.id).await?.balance, account.balance);
    }
    Ok(())
}

#[tokio::test]
async fn test_cancelled_context_never_writes() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 100).await?;
    let a2 = create_account(&service, 100).await?;

    let ctx = Context::background();
    ctx.cancel();
    let err = service.transfer(&ctx, a1.id, a2.id, 10).await.unwrap_err();
    assert!(matches!(err, AppError::Store(StoreError::Cancelled)), "got {err:?}");

    assert_nothing_written(&service).await?;
    Ok(())
}

/// Holds the SQLite write lock from another connection so the transfer blocks.
async fn hold_write_lock(
    service: &LedgerService,
) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
    let mut conn = service.store().connection().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

async fn release_write_lock(mut conn: sqlx::pool::PoolConnection<sqlx::Sqlite>) -> Result<()> {
    sqlx::query("ROLLBACK").execute(&mut *conn).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_while_blocked_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 100).await?;
    let a2 = create_account(&service, 100).await?;
    let (id1, id2) = (a1.id, a2.id);

    let lock = hold_write_lock(&service).await?;

    let ctx = Context::background();
    let pending = {
        let service = service.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { service.transfer(&ctx, id1, id2, 10).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.cancel();
    release_write_lock(lock).await?;

    let err = pending.await?.unwrap_err();
    assert!(matches!(err, AppError::Store(StoreError::Cancelled)), "got {err:?}");

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(id1).await?.balance, 100);
    assert_eq!(service.get_account(id2).await?.balance, 100);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deadline_while_blocked_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let a1 = create_account(&service, 100).await?;
    let a2 = create_account(&service, 100).await?;

    let lock = hold_write_lock(&service).await?;

    let ctx = Context::background().with_timeout(Duration::from_millis(50));
    let pending = {
        let service = service.clone();
        let (id1, id2) = (a1.id, a2.id);
        tokio::spawn(async move { service.transfer(&ctx, id1, id2, 10).await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    release_write_lock(lock).await?;

    let err = pending.await?.unwrap_err();
    assert!(
        matches!(err, AppError::Store(StoreError::DeadlineExceeded)),
        "got {err:?}"
    );

    assert_nothing_written(&service).await?;
    assert_eq!(service.get_account(a1.id).await?.balance, 100);
    Ok(())
}

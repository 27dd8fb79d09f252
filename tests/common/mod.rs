// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tally::Account;
use tally::application::LedgerService;
use tally::config::LedgerConfig;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    test_service_with(|_| {}).await
}

/// Same as `test_service`, letting the caller tweak the config first
pub async fn test_service_with(
    configure: impl FnOnce(&mut LedgerConfig),
) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let mut config = LedgerConfig::for_database(db_path.to_str().unwrap());
    configure(&mut config);
    let service = LedgerService::init_with(&config).await?;
    Ok((service, temp_dir))
}

pub fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// Random lowercase owner name
pub fn random_owner() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(|c| c.is_ascii_alphabetic())
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect()
}

pub fn random_money() -> i64 {
    random_int(1, 1000)
}

/// Transfers need both sides in one currency, so shared helpers stick to USD
pub async fn create_account(service: &LedgerService, balance: i64) -> Result<Account> {
    create_account_in(service, "USD", balance).await
}

pub async fn create_account_in(
    service: &LedgerService,
    currency: &str,
    balance: i64,
) -> Result<Account> {
    Ok(service
        .create_account(&random_owner(), currency, balance)
        .await?)
}

pub async fn create_random_account(service: &LedgerService) -> Result<Account> {
    create_account(service, random_money()).await
}

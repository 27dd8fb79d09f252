use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use crate::application::{LedgerService, TransferFilter};
use crate::config::LedgerConfig;
use crate::domain::{AccountId, TransferId, format_cents, parse_cents};
use crate::storage::{Context, Page};

/// Tally - double-entry ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "A double-entry ledger with atomic account-to-account transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the config file)
    #[arg(short, long, env = "TALLY_DATABASE")]
    pub database: Option<String>,

    /// JSON config file
    #[arg(long, env = "TALLY_CONFIG", default_value = "tally.json")]
    pub config: PathBuf,

    /// Reject transfers that would make the source balance negative
    #[arg(long, global = true)]
    pub deny_negative: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money from one account to another
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account id
        #[arg(long)]
        from: AccountId,

        /// Destination account id
        #[arg(long)]
        to: AccountId,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List transfers leaving one account or arriving at another
    Transfers {
        /// Source account id
        #[arg(long)]
        from: AccountId,

        /// Destination account id
        #[arg(long)]
        to: AccountId,

        /// Maximum number of transfers to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Number of transfers to skip
        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// List entries of an account
    Entries {
        /// Account id
        account: AccountId,

        #[arg(short, long, default_value = "20")]
        limit: i64,

        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Show a transfer
    #[command(name = "show")]
    ShowTransfer {
        /// Transfer id
        id: TransferId,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Owner name
        owner: String,

        /// Currency code: USD, EUR, CAD, GBP, CHF
        #[arg(short, long, default_value = "EUR")]
        currency: String,

        /// Opening balance (e.g., "100.00")
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// List accounts
    List {
        #[arg(short, long, default_value = "50")]
        limit: i64,

        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Show account details
    Show {
        /// Account id
        id: AccountId,
    },
}

impl Cli {
    fn config(&self) -> Result<LedgerConfig> {
        let mut config = LedgerConfig::load(&self.config)?;
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if self.deny_negative {
            config.allow_negative_balance = false;
        }
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config()?;

        match self.command {
            Commands::Init => {
                LedgerService::init_with(&config).await?;
                println!("Database initialized: {}", config.database);
            }

            Commands::Account(account_cmd) => {
                let service = LedgerService::connect_with(&config).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                timeout,
                json,
            } => {
                let service = LedgerService::connect_with(&config).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let ctx = match timeout {
                    Some(secs) => Context::background().with_timeout(Duration::from_secs(secs)),
                    None => Context::background(),
                };
                let result = service.transfer(&ctx, from, to, amount_cents).await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    println!(
                        "Recorded transfer #{}: {} {} -> {}",
                        result.transfer.id,
                        format_cents(result.transfer.amount),
                        result.transfer.from_account_id,
                        result.transfer.to_account_id
                    );
                    println!(
                        "  #{:<6} {:>14} {}",
                        result.from_account.id,
                        format_cents(result.from_account.balance),
                        result.from_account.currency
                    );
                    println!(
                        "  #{:<6} {:>14} {}",
                        result.to_account.id,
                        format_cents(result.to_account.balance),
                        result.to_account.currency
                    );
                }
            }

            Commands::Transfers {
                from,
                to,
                limit,
                offset,
            } => {
                let service = LedgerService::connect_with(&config).await?;
                let filter = TransferFilter {
                    from_account_id: from,
                    to_account_id: to,
                    page: Page::new(limit, offset),
                };
                run_transfers_command(&service, filter).await?;
            }

            Commands::Entries {
                account,
                limit,
                offset,
            } => {
                let service = LedgerService::connect_with(&config).await?;
                let entries = service
                    .list_entries(account, Page::new(limit, offset))
                    .await?;
                if entries.is_empty() {
                    println!("No entries found.");
                } else {
                    println!("{:<8} {:<20} {:<7} {:>14}", "ID", "DATE", "SIDE", "AMOUNT");
                    println!("{}", "-".repeat(52));
                    for entry in entries {
                        println!(
                            "{:<8} {:<20} {:<7} {:>14}",
                            entry.id,
                            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                            if entry.is_debit() { "debit" } else { "credit" },
                            format_cents(entry.amount)
                        );
                    }
                }
            }

            Commands::ShowTransfer { id } => {
                let service = LedgerService::connect_with(&config).await?;
                let transfer = service.get_transfer(id).await?;
                println!("Transfer #{}", transfer.id);
                println!("  From:    #{}", transfer.from_account_id);
                println!("  To:      #{}", transfer.to_account_id);
                println!("  Amount:  {}", format_cents(transfer.amount));
                println!(
                    "  Created: {}",
                    transfer.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }

            Commands::Check => {
                let service = LedgerService::connect_with(&config).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            currency,
            balance,
        } => {
            let balance = parse_cents(&balance).context("Invalid opening balance")?;
            let account = service.create_account(&owner, &currency, balance).await?;
            println!(
                "Created account #{} for {} ({} {})",
                account.id,
                account.owner,
                format_cents(account.balance),
                account.currency
            );
        }

        AccountCommands::List { limit, offset } => {
            let accounts = service.list_accounts(Page::new(limit, offset)).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<8} {:<20} {:>14} {:<8}", "ID", "OWNER", "BALANCE", "CURRENCY");
                println!("{}", "-".repeat(53));
                for account in accounts {
                    println!(
                        "{:<8} {:<20} {:>14} {:<8}",
                        account.id,
                        truncate(&account.owner, 20),
                        format_cents(account.balance),
                        account.currency
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            println!("Account #{}", account.id);
            println!("  Owner:    {}", account.owner);
            println!("  Currency: {}", account.currency);
            println!("  Balance:  {}", format_cents(account.balance));
            println!(
                "  Created:  {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

async fn run_transfers_command(service: &LedgerService, filter: TransferFilter) -> Result<()> {
    let transfers = service.list_transfers(filter).await?;

    if transfers.is_empty() {
        println!("No transfers found.");
        return Ok(());
    }

    println!(
        "{:<8} {:<20} {:>8} {:>8} {:>14}",
        "ID", "DATE", "FROM", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(62));
    for transfer in transfers {
        println!(
            "{:<8} {:<20} {:>8} {:>8} {:>14}",
            transfer.id,
            transfer.created_at.format("%Y-%m-%d %H:%M:%S"),
            transfer.from_account_id,
            transfer.to_account_id,
            format_cents(transfer.amount)
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:  {}", report.account_count);
    println!("Transfers: {}", report.transfer_count);
    println!("Entries:   {}", report.entry_count);
    println!(
        "Entry sum: {}  {}",
        format_cents(report.entries_total),
        if report.is_balanced() { "OK" } else { "UNBALANCED!" }
    );
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

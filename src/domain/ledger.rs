use super::Cents;

/// Raw counts gathered by the store for an integrity check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub transfer_count: i64,
    pub entry_count: i64,
    /// Sum of every entry amount in the ledger.
    pub entries_total: Cents,
    /// Transfers with an amount that is zero or negative.
    pub invalid_amounts: i64,
    /// Transfers or entries pointing at an account that does not exist.
    pub dangling_refs: i64,
}

/// Outcome of checking the double-entry invariants over the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub transfer_count: i64,
    pub entry_count: i64,
    pub entries_total: Cents,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn is_balanced(&self) -> bool {
        self.entries_total == 0
    }
}

/// Every transfer writes two entries that cancel out, so the ledger is
/// consistent only when there are twice as many entries as transfers and all
/// entries sum to zero.
pub fn build_integrity_report(stats: &IntegrityStats) -> IntegrityReport {
    let mut issues = Vec::new();

    let expected_entries = stats.transfer_count * 2;
    if stats.entry_count != expected_entries {
        issues.push(format!(
            "Found {} entries for {} transfers (expected {})",
            stats.entry_count, stats.transfer_count, expected_entries
        ));
    }
    if stats.entries_total != 0 {
        issues.push(format!(
            "Entries do not sum to zero (total {})",
            stats.entries_total
        ));
    }
    if stats.invalid_amounts > 0 {
        issues.push(format!(
            "Found {} transfers with non-positive amounts",
            stats.invalid_amounts
        ));
    }
    if stats.dangling_refs > 0 {
        issues.push(format!(
            "Found {} rows referencing missing accounts",
            stats.dangling_refs
        ));
    }

    IntegrityReport {
        account_count: stats.account_count,
        transfer_count: stats.transfer_count,
        entry_count: stats.entry_count,
        entries_total: stats.entries_total,
        issues,
    }
}

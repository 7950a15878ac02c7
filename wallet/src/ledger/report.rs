//! Filtered, ordered ledger view with token totals.

use serde::{Deserialize, Serialize};

use super::filter::LedgerFilter;
use super::types::{Direction, LedgerEntry};
use crate::amount::{format_units, parse_units, Currency};
use crate::error::WalletError;

/// What a ledger query returns.
///
/// The totals cover token entries only, and only those that survived the
/// filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub address: String,
    #[serde(rename = "total_income_USDC")]
    pub total_income_usdc: String,
    #[serde(rename = "total_spent_USDC")]
    pub total_spent_usdc: String,
    pub transactions: Vec<LedgerEntry>,
}

impl LedgerReport {
    /// Filters, sorts newest first, then totals.
    pub fn build(
        address: impl Into<String>,
        entries: Vec<LedgerEntry>,
        filter: &LedgerFilter,
    ) -> Result<Self, WalletError> {
        let mut transactions = Vec::with_capacity(entries.len());
        for entry in entries {
            if filter.matches(&entry)? {
                transactions.push(entry);
            }
        }

        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let decimals = Currency::Usdc.decimals();
        let (mut income, mut spent) = (0u64, 0u64);
        for entry in transactions.iter().filter(|e| e.currency == Currency::Usdc) {
            let units = parse_units(&entry.amount, decimals)?;
            match entry.direction {
                Direction::Incoming => income = income.saturating_add(units),
                Direction::Outgoing => spent = spent.saturating_add(units),
            }
        }

        Ok(Self {
            address: address.into(),
            total_income_usdc: format_units(income, decimals),
            total_spent_usdc: format_units(spent, decimals),
            transactions,
        })
    }

    /// Report for an address with no history.
    pub fn empty(address: impl Into<String>) -> Self {
        let zero = format_units(0, Currency::Usdc.decimals());
        Self {
            address: address.into(),
            total_income_usdc: zero.clone(),
            total_spent_usdc: zero,
            transactions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::TxStatus;
    use chrono::DateTime;

    fn entry(direction: Direction, currency: Currency, amount: &str, ts: i64) -> LedgerEntry {
        LedgerEntry {
            direction,
            tx_id: format!("tx-{ts}"),
            from: "a".into(),
            to: "b".into(),
            amount: amount.into(),
            currency,
            fee_paid: "0".into(),
            timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
            block_height: ts as u64,
            status: TxStatus::Success,
        }
    }

    fn sample() -> Vec<LedgerEntry> {
        vec![
            entry(Direction::Incoming, Currency::Usdc, "0.100000", 100),
            entry(Direction::Incoming, Currency::Usdc, "0.200000", 300),
            entry(Direction::Outgoing, Currency::Usdc, "1.500000", 200),
            entry(Direction::Incoming, Currency::Sol, "5.000000000", 400),
        ]
    }

    #[test]
    fn sorts_newest_first_and_totals_token_only() {
        let report = LedgerReport::build("me", sample(), &LedgerFilter::default()).unwrap();
        let order: Vec<_> = report.transactions.iter().map(|e| e.tx_id.as_str()).collect();
        assert_eq!(order, vec!["tx-400", "tx-300", "tx-200", "tx-100"]);

        // 0.1 + 0.2 is exact here.
        assert_eq!(report.total_income_usdc, "0.300000");
        assert_eq!(report.total_spent_usdc, "1.500000");
    }

    #[test]
    fn totals_follow_the_filter() {
        let filter = LedgerFilter {
            max_amount: Some("0.15".into()),
            currency: Some(Currency::Usdc),
            ..Default::default()
        };
        let report = LedgerReport::build("me", sample(), &filter).unwrap();
        assert_eq!(report.transactions.len(), 1);
        assert_eq!(report.total_income_usdc, "0.100000");
        assert_eq!(report.total_spent_usdc, "0.000000");
    }

    #[test]
    fn json_keys() {
        let json = serde_json::to_value(LedgerReport::empty("me")).unwrap();
        assert_eq!(json["address"], "me");
        assert_eq!(json["total_income_USDC"], "0.000000");
        assert_eq!(json["total_spent_USDC"], "0.000000");
        assert!(json["transactions"].as_array().unwrap().is_empty());
    }
}

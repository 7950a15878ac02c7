//! Ledger data types: the raw chain snapshot going into the reconciler and
//! the classified entry coming out.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Currency;
use crate::error::WalletError;

// ---------------------------------------------------------------------------
// Raw Input
// ---------------------------------------------------------------------------

/// One token-balance row of a transaction's pre or post snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    /// Wallet that owns the token account. Some rows carry no owner; they
    /// never count toward anyone's delta.
    pub owner: Option<String>,
    pub mint: String,
    /// Raw base units.
    pub amount: u64,
}

/// Everything the reconciler needs to know about one confirmed transaction.
///
/// `pre_balances[i]` and `post_balances[i]` are the lamport balances of
/// `account_keys[i]` before and after execution. Index 0 is the fee payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub signature: String,
    pub account_keys: Vec<String>,
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
    /// Declared network fee, lamports.
    pub fee: u64,
    /// Unix seconds. Absent for very old or not yet finalized blocks.
    pub block_time: Option<i64>,
    pub slot: u64,
    /// `false` if the transaction executed with an error.
    pub succeeded: bool,
}

impl RawTransaction {
    /// Lamport balance change of the account at `index`, or 0 if either
    /// snapshot is missing that index.
    pub fn native_delta_at(&self, index: usize) -> i128 {
        match (self.pre_balances.get(index), self.post_balances.get(index)) {
            (Some(&pre), Some(&post)) => i128::from(post) - i128::from(pre),
            _ => 0,
        }
    }

    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.account_keys.iter().position(|key| key == address)
    }
}

// ---------------------------------------------------------------------------
// Classified Output
// ---------------------------------------------------------------------------

/// Which way value moved, from the owner's point of view.
///
/// On the wire these keep their bookkeeping names: money coming in is a
/// `DEBIT` to the wallet, money going out a `CREDIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "DEBIT", alias = "incoming")]
    Incoming,
    #[serde(rename = "CREDIT", alias = "outgoing")]
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "DEBIT",
            Self::Outgoing => "CREDIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debit" | "incoming" => Ok(Self::Incoming),
            "credit" | "outgoing" => Ok(Self::Outgoing),
            _ => Err(WalletError::InvalidFilter {
                reason: "type must be DEBIT or CREDIT".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

impl From<bool> for TxStatus {
    fn from(succeeded: bool) -> Self {
        if succeeded {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

/// One classified movement of value relative to the owner.
///
/// Produced only by [`super::Reconciler`]. Amounts are decimal strings at
/// the currency's scale; `fee_paid` is always in SOL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "type")]
    pub direction: Direction,
    #[serde(rename = "txId")]
    pub tx_id: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub currency: Currency,
    /// Network fee attributed to this entry, or `"0"`.
    #[serde(rename = "ourFeeSOL")]
    pub fee_paid: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "blockNumber")]
    pub block_height: u64,
    pub status: TxStatus,
}

impl LedgerEntry {
    /// The other side of the transfer.
    pub fn counterparty(&self) -> &str {
        match self.direction {
            Direction::Incoming => &self.from,
            Direction::Outgoing => &self.to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::Incoming).unwrap(), "\"DEBIT\"");
        assert_eq!(
            serde_json::from_str::<Direction>("\"outgoing\"").unwrap(),
            Direction::Outgoing
        );
        assert_eq!("credit".parse::<Direction>().unwrap(), Direction::Outgoing);
        assert_eq!("Incoming".parse::<Direction>().unwrap(), Direction::Incoming);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn entry_json_shape() {
        let entry = LedgerEntry {
            direction: Direction::Outgoing,
            tx_id: "sig".into(),
            from: "me".into(),
            to: "you".into(),
            amount: "1.000000".into(),
            currency: Currency::Usdc,
            fee_paid: "0".into(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            block_height: 42,
            status: TxStatus::Success,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "CREDIT");
        assert_eq!(json["txId"], "sig");
        assert_eq!(json["ourFeeSOL"], "0");
        assert_eq!(json["blockNumber"], 42);
        assert_eq!(json["status"], "success");
        assert_eq!(json["currency"], "USDC");
        assert_eq!(entry.counterparty(), "you");
    }

    #[test]
    fn native_delta_handles_short_snapshots() {
        let tx = RawTransaction {
            signature: "s".into(),
            account_keys: vec!["a".into(), "b".into()],
            pre_balances: vec![10, 5],
            post_balances: vec![3],
            pre_token_balances: vec![],
            post_token_balances: vec![],
            fee: 0,
            block_time: None,
            slot: 0,
            succeeded: true,
        };
        assert_eq!(tx.native_delta_at(0), -7);
        assert_eq!(tx.native_delta_at(1), 0);
        assert_eq!(tx.index_of("b"), Some(1));
        assert_eq!(tx.index_of("c"), None);
    }
}

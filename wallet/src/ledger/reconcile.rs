//! # Transaction Reconciler
//!
//! Turns raw pre/post balance snapshots into classified ledger entries,
//! relative to one owner address and one tracked token mint.
//!
//! ## Classification
//!
//! 1. If the owner's token balance moved, the transaction is a token
//!    transfer. Whatever SOL the owner lost on an incoming token transfer
//!    is reported as fee; outgoing token transfers report a fee of zero.
//! 2. Otherwise, look at SOL. When the owner is the fee payer (account
//!    index 0) the declared fee is added back to isolate the transfer from
//!    the fee. Nothing left means nothing to report.
//! 3. Counterparties are the first account, in snapshot order, that moved
//!    the other way. With more than two participants that is a heuristic,
//!    not an attribution.
//!
//! All arithmetic is on signed 128-bit integers so that no `u64` balance
//! difference can overflow.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::types::{Direction, LedgerEntry, RawTransaction, TokenBalance};
use crate::amount::{format_units, Currency};
use crate::config::SOL_DECIMALS;

/// Classifies transactions from one owner's point of view.
#[derive(Debug, Clone)]
pub struct Reconciler {
    owner: String,
    mint: String,
}

impl Reconciler {
    /// `owner` is the wallet address, `mint` the tracked token's mint.
    pub fn new(owner: impl Into<String>, mint: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            mint: mint.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Deduplicates by signature (first occurrence wins) and classifies
    /// each remaining transaction. Irrelevant transactions are dropped.
    pub fn reconcile<I>(&self, transactions: I) -> Vec<LedgerEntry>
    where
        I: IntoIterator<Item = RawTransaction>,
    {
        let mut seen = HashSet::new();
        transactions
            .into_iter()
            .filter(|tx| seen.insert(tx.signature.clone()))
            .filter_map(|tx| self.classify(&tx))
            .collect()
    }

    /// Zero or one ledger entry for a single transaction.
    pub fn classify(&self, tx: &RawTransaction) -> Option<LedgerEntry> {
        let owner_index = tx.index_of(&self.owner);
        let native_delta = owner_index.map_or(0, |i| tx.native_delta_at(i));

        let token_deltas = self.token_deltas(tx);
        let token_delta = token_deltas
            .iter()
            .find(|(holder, _)| *holder == self.owner)
            .map_or(0, |(_, delta)| *delta);

        if token_delta != 0 {
            return Some(self.token_entry(tx, &token_deltas, token_delta, native_delta));
        }

        self.native_entry(tx, owner_index, native_delta)
    }

    /// Net token movement per holder for the tracked mint, in the order
    /// holders first appear in the snapshots.
    pub fn token_deltas(&self, tx: &RawTransaction) -> Vec<(String, i128)> {
        let mut deltas: Vec<(String, i128)> = Vec::new();

        let pre = tx.pre_token_balances.iter().map(|b| (b, -1));
        let post = tx.post_token_balances.iter().map(|b| (b, 1));

        for (balance, sign) in pre.chain(post) {
            let Some(holder) = self.tracked_holder(balance) else {
                continue;
            };
            let signed = sign * i128::from(balance.amount);
            match deltas.iter_mut().find(|(h, _)| h == holder) {
                Some((_, delta)) => *delta += signed,
                None => deltas.push((holder.to_string(), signed)),
            }
        }

        deltas
    }

    fn tracked_holder<'a>(&self, balance: &'a TokenBalance) -> Option<&'a str> {
        if balance.mint != self.mint {
            return None;
        }
        balance.owner.as_deref()
    }

    // -----------------------------------------------------------------------
    // Token transfers
    // -----------------------------------------------------------------------

    fn token_entry(
        &self,
        tx: &RawTransaction,
        deltas: &[(String, i128)],
        token_delta: i128,
        native_delta: i128,
    ) -> LedgerEntry {
        let direction = if token_delta > 0 {
            Direction::Incoming
        } else {
            Direction::Outgoing
        };

        let counterparty = deltas
            .iter()
            .filter(|(holder, _)| *holder != self.owner)
            .find(|(_, delta)| match direction {
                Direction::Incoming => *delta < 0,
                Direction::Outgoing => *delta > 0,
            })
            .map(|(holder, _)| holder.clone())
            .unwrap_or_default();

        let fee_paid = match direction {
            Direction::Incoming if native_delta < 0 => {
                format_units(to_units(native_delta), SOL_DECIMALS)
            }
            _ => "0".to_string(),
        };

        trace!(signature = %tx.signature, %direction, "token transfer classified");
        self.entry(tx, direction, counterparty, token_delta, Currency::Usdc, fee_paid)
    }

    // -----------------------------------------------------------------------
    // Native transfers
    // -----------------------------------------------------------------------

    fn native_entry(
        &self,
        tx: &RawTransaction,
        owner_index: Option<usize>,
        native_delta: i128,
    ) -> Option<LedgerEntry> {
        if native_delta == 0 {
            return None;
        }

        let is_fee_payer = owner_index == Some(0);
        let transfer = if is_fee_payer {
            native_delta + i128::from(tx.fee)
        } else {
            native_delta
        };

        if transfer == 0 {
            trace!(signature = %tx.signature, "fee-only transaction skipped");
            return None;
        }

        let direction = if transfer > 0 {
            Direction::Incoming
        } else {
            Direction::Outgoing
        };

        let counterparty = tx
            .account_keys
            .iter()
            .enumerate()
            .filter(|(i, key)| Some(*i) != owner_index && **key != self.owner)
            .find(|(i, _)| {
                let delta = tx.native_delta_at(*i);
                match direction {
                    Direction::Incoming => delta < 0,
                    Direction::Outgoing => delta > 0,
                }
            })
            .map(|(_, key)| key.clone())
            .unwrap_or_default();

        let fee_paid = if direction == Direction::Outgoing && is_fee_payer {
            format_units(tx.fee, SOL_DECIMALS)
        } else {
            "0".to_string()
        };

        trace!(signature = %tx.signature, %direction, "native transfer classified");
        Some(self.entry(tx, direction, counterparty, transfer, Currency::Sol, fee_paid))
    }

    fn entry(
        &self,
        tx: &RawTransaction,
        direction: Direction,
        counterparty: String,
        delta: i128,
        currency: Currency,
        fee_paid: String,
    ) -> LedgerEntry {
        let (from, to) = match direction {
            Direction::Incoming => (counterparty, self.owner.clone()),
            Direction::Outgoing => (self.owner.clone(), counterparty),
        };

        LedgerEntry {
            direction,
            tx_id: tx.signature.clone(),
            from,
            to,
            amount: format_units(to_units(delta), currency.decimals()),
            currency,
            fee_paid,
            timestamp: block_timestamp(tx.block_time),
            block_height: tx.slot,
            status: tx.succeeded.into(),
        }
    }
}

/// Merges signature lists, keeping first-seen order and dropping repeats.
pub fn dedup_signatures<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|sig| seen.insert(sig.clone()))
        .collect()
}

/// Magnitude of a signed delta in base units, saturating at `u64::MAX`.
fn to_units(delta: i128) -> u64 {
    u64::try_from(delta.unsigned_abs()).unwrap_or(u64::MAX)
}

fn block_timestamp(block_time: Option<i64>) -> DateTime<Utc> {
    block_time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

//! Ledger query filters.
//!
//! Every bound is optional. Amount bounds are decimal strings and are
//! compared as integers at the entry's own scale, so `"10.5"` matches a
//! `"10.500000"` USDC entry exactly.

use chrono::{DateTime, Utc};

use super::types::{Direction, LedgerEntry};
use crate::amount::{is_out_of_range, parse_units, Currency};
use crate::config::{SOL_DECIMALS, USDC_DECIMALS};
use crate::error::WalletError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub direction: Option<Direction>,
    pub tx_id: Option<String>,
    pub currency: Option<Currency>,
    /// Inclusive lower time bound.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub to: Option<DateTime<Utc>>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
}

impl LedgerFilter {
    /// Rejects inconsistent requests before any chain data is fetched.
    ///
    /// With no currency set, amount bounds are checked at the native scale,
    /// the finer of the two, so no digit a user typed is ignored. A bound
    /// too large for `u64` at that scale is checked again at the token
    /// scale, where it may still fit.
    pub fn validate(&self) -> Result<(), WalletError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if to < from {
                return Err(WalletError::InvalidFilter {
                    reason: "to date must be after or equal to from date".into(),
                });
            }
        }

        let scales = match self.currency {
            Some(currency) => vec![currency.decimals()],
            None => vec![SOL_DECIMALS, USDC_DECIMALS],
        };

        let mut overflow = None;
        for decimals in scales {
            match (
                parse_bound(self.min_amount.as_deref(), decimals),
                parse_bound(self.max_amount.as_deref(), decimals),
            ) {
                (Ok(min), Ok(max)) => {
                    if let (Some(min), Some(max)) = (min, max) {
                        if min > max {
                            return Err(WalletError::InvalidFilter {
                                reason: "minAmount must be less than or equal to maxAmount"
                                    .into(),
                            });
                        }
                    }
                    return Ok(());
                }
                (Err(e), _) | (_, Err(e)) => {
                    if !is_out_of_range(&e) {
                        return Err(e);
                    }
                    overflow = Some(e);
                }
            }
        }

        match overflow {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `true` if `entry` passes every bound that is set.
    pub fn matches(&self, entry: &LedgerEntry) -> Result<bool, WalletError> {
        if self.direction.is_some_and(|d| d != entry.direction) {
            return Ok(false);
        }
        if self.tx_id.as_deref().is_some_and(|id| id != entry.tx_id) {
            return Ok(false);
        }
        if self.currency.is_some_and(|c| c != entry.currency) {
            return Ok(false);
        }
        if self.from.is_some_and(|from| entry.timestamp < from) {
            return Ok(false);
        }
        if self.to.is_some_and(|to| entry.timestamp > to) {
            return Ok(false);
        }

        if self.min_amount.is_none() && self.max_amount.is_none() {
            return Ok(true);
        }

        let decimals = entry.currency.decimals();
        let amount = parse_units(&entry.amount, decimals)?;
        // A bound past u64 at this scale lies above every amount.
        if let Some(min) = &self.min_amount {
            match bound_units(min, decimals)? {
                Some(min) if amount < min => return Ok(false),
                None => return Ok(false),
                _ => {}
            }
        }
        if let Some(max) = &self.max_amount {
            if bound_units(max, decimals)?.is_some_and(|max| amount > max) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn parse_bound(text: Option<&str>, decimals: u32) -> Result<Option<u64>, WalletError> {
    text.map(|s| parse_units(s, decimals)).transpose()
}

/// Base units of a bound, or `None` when it does not fit at this scale.
fn bound_units(text: &str, decimals: u32) -> Result<Option<u64>, WalletError> {
    match parse_units(text, decimals) {
        Ok(units) => Ok(Some(units)),
        Err(e) if is_out_of_range(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

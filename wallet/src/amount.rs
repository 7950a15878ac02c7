//! # Amount Codec
//!
//! Lossless conversion between decimal strings ("0.024981836") and integer
//! base units (24_981_836 lamports). The decimal point is moved by string
//! manipulation only; `f64` never gets anywhere near a balance.
//!
//! The codec is generic over the scale. [`Currency`] just picks the right
//! `decimals` for the two assets this wallet knows about.
//!
//! Parsing truncates (never rounds) fractional digits beyond the scale, so
//! `parse_units("1.1234567", 6)` is `1_123_456`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{SOL_DECIMALS, USDC_DECIMALS};
use crate::error::WalletError;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Renders `value` base units as a decimal string with exactly `decimals`
/// fractional digits.
///
/// ```
/// use cwt_wallet::amount::format_units;
///
/// assert_eq!(format_units(24_981_836, 9), "0.024981836");
/// assert_eq!(format_units(10_500_000, 6), "10.500000");
/// ```
pub fn format_units(value: u64, decimals: u32) -> String {
    let digits = value.to_string();
    if decimals == 0 {
        return digits;
    }

    let scale = decimals as usize;
    let padded = if digits.len() <= scale {
        format!("{:0>width$}", digits, width = scale + 1)
    } else {
        digits
    };

    let split = padded.len() - scale;
    format!("{}.{}", &padded[..split], &padded[split..])
}

const VALUE_OUT_OF_RANGE: &str = "value out of range";

/// `true` when `err` is a well-formed amount too large for `u64` at the
/// scale it was parsed at.
pub(crate) fn is_out_of_range(err: &WalletError) -> bool {
    matches!(
        err,
        WalletError::InvalidAmountFormat { reason, .. } if *reason == VALUE_OUT_OF_RANGE
    )
}

/// Parses a decimal string into base units at the given scale.
///
/// Surrounding whitespace is ignored. Without a decimal point the whole
/// string is an integer amount and gets scaled up by `10^decimals`. With a
/// point, the fractional part is zero-padded or truncated to `decimals`
/// digits and glued to the integer part.
///
/// # Errors
///
/// [`WalletError::InvalidAmountFormat`] on empty input, more than one decimal
/// point, any non-digit character (signs included), or a value that does not
/// fit in a `u64`.
pub fn parse_units(text: &str, decimals: u32) -> Result<u64, WalletError> {
    let invalid = |reason: &'static str| WalletError::InvalidAmountFormat {
        input: text.to_string(),
        reason,
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty amount"));
    }

    let scale = 10u64
        .checked_pow(decimals)
        .ok_or_else(|| invalid("scale out of range"))?;

    let mut parts = trimmed.split('.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next();
    if parts.next().is_some() {
        return Err(invalid("multiple decimal points"));
    }

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !frac.map_or(true, all_digits) {
        return Err(invalid("non-digit characters"));
    }

    let Some(frac) = frac else {
        let units: u64 = whole.parse().map_err(|_| invalid(VALUE_OUT_OF_RANGE))?;
        return units
            .checked_mul(scale)
            .ok_or_else(|| invalid(VALUE_OUT_OF_RANGE));
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }

    let width = decimals as usize;
    let mut combined = String::with_capacity(whole.len() + width);
    combined.push_str(whole);
    if frac.len() >= width {
        combined.push_str(&frac[..width]);
    } else {
        combined.push_str(frac);
        combined.extend(std::iter::repeat('0').take(width - frac.len()));
    }

    // ".7" at scale 0 truncates to nothing.
    if combined.is_empty() {
        return Ok(0);
    }

    combined.parse().map_err(|_| invalid(VALUE_OUT_OF_RANGE))
}

/// Compares two decimal strings at the given scale as integers.
pub fn compare_units(a: &str, b: &str, decimals: u32) -> Result<Ordering, WalletError> {
    let a = parse_units(a, decimals)?;
    let b = parse_units(b, decimals)?;
    Ok(a.cmp(&b))
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// The two assets this wallet holds: the native coin and one SPL token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Native coin, 9 decimals (lamports).
    #[serde(rename = "SOL")]
    Sol,
    /// Tracked SPL token, 6 decimals.
    #[serde(rename = "USDC")]
    Usdc,
}

impl Currency {
    /// Number of fractional digits of this currency's base unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Sol => SOL_DECIMALS,
            Self::Usdc => USDC_DECIMALS,
        }
    }

    /// Ticker as shown to users and used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sol => "SOL",
            Self::Usdc => "USDC",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SOL" => Ok(Self::Sol),
            "USDC" => Ok(Self::Usdc),
            _ => Err(WalletError::InvalidFilter {
                reason: "currency must be USDC or SOL".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A non-negative amount in base units, tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Value in the currency's smallest unit.
    pub value: u64,
    /// Which scale `value` is expressed in.
    pub currency: Currency,
}

impl Amount {
    pub fn new(value: u64, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Parses a user-supplied decimal string at the currency's scale.
    pub fn parse(text: &str, currency: Currency) -> Result<Self, WalletError> {
        Ok(Self::new(parse_units(text, currency.decimals())?, currency))
    }

    /// Decimal rendering without the ticker, e.g. `"10.500000"`.
    pub fn to_decimal_string(&self) -> String {
        format_units(self.value, self.currency.decimals())
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_pads_small_values() {
        assert_eq!(format_units(24_981_836, 9), "0.024981836");
        assert_eq!(format_units(0, 6), "0.000000");
        assert_eq!(format_units(1, 9), "0.000000001");
        assert_eq!(format_units(5_000, 9), "0.000005000");
    }

    #[test]
    fn format_large_values() {
        assert_eq!(format_units(10_500_000, 6), "10.500000");
        assert_eq!(format_units(u64::MAX, 9), "18446744073.709551615");
        assert_eq!(format_units(42, 0), "42");
    }

    #[test]
    fn parse_known_values() {
        assert_eq!(parse_units("0.024981836", 9).unwrap(), 24_981_836);
        assert_eq!(parse_units("10.50", 6).unwrap(), 10_500_000);
        assert_eq!(parse_units("10", 6).unwrap(), 10_000_000);
        assert_eq!(parse_units("  1.5  ", 9).unwrap(), 1_500_000_000);
        assert_eq!(parse_units(".5", 6).unwrap(), 500_000);
        assert_eq!(parse_units("5.", 6).unwrap(), 5_000_000);
    }

    #[test]
    fn parse_truncates_extra_fraction_digits() {
        assert_eq!(parse_units("1.1234567", 6).unwrap(), 1_123_456);
        assert_eq!(parse_units("0.0000009", 6).unwrap(), 0);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "   ", ".", "1.2.3", "abc", "-1", "+1", "1,5", "1 000", "1.2x", "1e6"] {
            let err = parse_units(bad, 6).unwrap_err();
            assert!(
                matches!(err, WalletError::InvalidAmountFormat { .. }),
                "{bad:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        // Integer form overflows once scaled.
        assert!(parse_units("18446744074", 9).is_err());
        // Fractional form overflows on concatenation.
        assert!(parse_units("18446744073.709551616", 9).is_err());
        assert_eq!(
            parse_units("18446744073.709551615", 9).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn compare_ignores_trailing_zeros() {
        assert_eq!(compare_units("10.50", "10.5", 6).unwrap(), Ordering::Equal);
        assert_eq!(
            compare_units("0.000001", "0.000002", 6).unwrap(),
            Ordering::Less
        );
        assert_eq!(compare_units("2", "1.999999", 6).unwrap(), Ordering::Greater);
    }

    #[test]
    fn compare_propagates_parse_errors() {
        assert!(compare_units("1..0", "1", 6).is_err());
    }

    #[test]
    fn currency_scales_and_names() {
        assert_eq!(Currency::Sol.decimals(), 9);
        assert_eq!(Currency::Usdc.decimals(), 6);
        assert_eq!("usdc".parse::<Currency>().unwrap(), Currency::Usdc);
        assert_eq!(" SOL ".parse::<Currency>().unwrap(), Currency::Sol);
        assert!("BTC".parse::<Currency>().is_err());
        assert_eq!(serde_json::to_string(&Currency::Usdc).unwrap(), "\"USDC\"");
    }

    #[test]
    fn amount_display() {
        let amt = Amount::parse("10.5", Currency::Usdc).unwrap();
        assert_eq!(amt.value, 10_500_000);
        assert_eq!(amt.to_string(), "10.500000 USDC");
        assert!(Amount::new(0, Currency::Sol).is_zero());
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(v in any::<u64>(), native in any::<bool>()) {
            let decimals = if native { SOL_DECIMALS } else { USDC_DECIMALS };
            prop_assert_eq!(parse_units(&format_units(v, decimals), decimals).unwrap(), v);
        }
    }
}

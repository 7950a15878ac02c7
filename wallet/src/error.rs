//! # Wallet Errors
//!
//! One closed error type for the whole library. Callers are expected to
//! branch on the variant (or on [`WalletError::kind`]) and turn it into a
//! user-facing message one level up; nothing in here is retried internally.
//!
//! Cryptographic failures are deliberately flat: a wrong password, a flipped
//! ciphertext bit, a truncated nonce and a swapped salt all surface as
//! [`WalletError::InvalidPassword`]. Which check failed is nobody's business.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::amount::{format_units, Currency};
use crate::config::SOL_DECIMALS;

/// Boxed error returned by external collaborators (RPC, price feed).
pub type UpstreamSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong inside the wallet core.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Vault generation target already holds data. Pick another path.
    #[error("destination already exists and is not empty: {}", path.display())]
    DestinationExists { path: PathBuf },

    /// Decryption failed. Wrong password and tampered file are the same thing
    /// from the outside.
    #[error("invalid password")]
    InvalidPassword,

    /// No password has been supplied (or the supplied one is empty).
    #[error("password required: unlock the wallet before using it")]
    PasswordRequired,

    /// The vault file does not exist or has zero length.
    #[error("vault file is missing or empty: {}", path.display())]
    MissingOrEmptyFile { path: PathBuf },

    /// The vault path does not carry the `.cwt` extension.
    #[error("vault file must have the .cwt extension: {}", path.display())]
    InvalidExtension { path: PathBuf },

    /// The vault envelope or the decrypted payload is structurally broken.
    #[error("invalid vault file: {reason}")]
    InvalidVaultFile { reason: String },

    /// The decrypted key does not belong to the address in the envelope.
    #[error("private key does not match the vault address")]
    KeyMismatch,

    /// A decimal amount string could not be converted to base units.
    #[error("invalid amount format '{input}': {reason}")]
    InvalidAmountFormat { input: String, reason: &'static str },

    /// Not a base58-encoded 32-byte public key.
    #[error("invalid address: '{input}'")]
    InvalidAddress { input: String },

    /// Not enough of `currency` to cover the request. Amounts are base units.
    #[error(
        "insufficient {currency} balance: required {}, available {}",
        format_units(*required, currency.decimals()),
        format_units(*available, currency.decimals())
    )]
    InsufficientBalance {
        currency: Currency,
        required: u64,
        available: u64,
    },

    /// The shared pay cooldown has not elapsed yet.
    #[error("cooldown active, please wait {}s", remaining.as_secs())]
    CooldownActive { remaining: Duration },

    /// The owner has never held the tracked token. Someone has to send it
    /// some first, and the sender pays `minimum_funding_lamports` of rent.
    #[error(
        "token account not found for address {owner}: deposit any amount of the token to create it \
         (requires rent exempt: {} SOL from the sender)",
        format_units(*minimum_funding_lamports, SOL_DECIMALS)
    )]
    TokenAccountNotProvisioned {
        owner: String,
        minimum_funding_lamports: u64,
    },

    /// Ledger request parameters are inconsistent.
    #[error("invalid filter: {reason}")]
    InvalidFilter { reason: String },

    /// A chain or price collaborator failed.
    #[error("upstream unavailable: {context}")]
    UpstreamUnavailable {
        context: String,
        #[source]
        source: UpstreamSource,
    },

    /// RNG or KDF setup failure. No detail on purpose.
    #[error("cryptographic operation failed")]
    Crypto,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalletError {
    /// Wraps a collaborator failure with a short description of what was
    /// being attempted.
    pub fn upstream(context: impl Into<String>, source: impl Into<UpstreamSource>) -> Self {
        Self::UpstreamUnavailable {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DestinationExists { .. } => "DESTINATION_EXISTS",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::PasswordRequired => "PASSWORD_REQUIRED",
            Self::MissingOrEmptyFile { .. } => "MISSING_OR_EMPTY_FILE",
            Self::InvalidExtension { .. } => "INVALID_EXTENSION",
            Self::InvalidVaultFile { .. } => "INVALID_VAULT_FILE",
            Self::KeyMismatch => "KEY_MISMATCH",
            Self::InvalidAmountFormat { .. } => "INVALID_AMOUNT_FORMAT",
            Self::InvalidAddress { .. } => "INVALID_ADDRESS",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            Self::TokenAccountNotProvisioned { .. } => "TOKEN_ACCOUNT_NOT_PROVISIONED",
            Self::InvalidFilter { .. } => "INVALID_FILTER",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Crypto => "CRYPTO_FAILURE",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

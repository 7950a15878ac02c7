// Copyright (c) 2026 Alex Zink. MIT License.
// See LICENSE for details.

//! # CWT Wallet: Core Library
//!
//! A single-user custodial wallet for Solana: one keypair, encrypted on
//! disk, holding SOL and USDC. This crate is everything except the network
//! plumbing. The chain and the price feed are traits; the binary supplies
//! the real thing.
//!
//! ## Architecture
//!
//! - **amount**: decimal strings to integer base units and back, at 9 or 6
//!   decimals. No floats, ever.
//! - **crypto**: scrypt, AES-256-GCM and Ed25519, each behind a small typed
//!   wrapper.
//! - **vault**: the `.cwt` file: generate, encrypt, decrypt, read the
//!   address without a password.
//! - **ledger**: raw balance snapshots in, classified history out.
//! - **guard**: one transfer at a time, with a cooldown between them.
//! - **chain**: the collaborator traits.
//! - **service**: generate, balance, transactions and pay, composed.
//! - **config**: constants. Some of them are part of the vault format.
//!
//! ## Ground Rules
//!
//! 1. Amounts are `u64` base units. Strings only at the edges.
//! 2. Key material lives in zeroizing buffers and dies with its scope.
//! 3. Every error is a [`WalletError`] variant with structured fields.
//! 4. The only shared mutable state is the [`PayGuard`], and it is passed
//!    in, not global.

pub mod amount;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod service;
pub mod vault;

pub use amount::{Amount, Currency};
pub use chain::{ChainClient, PriceSource};
pub use error::WalletError;
pub use guard::{PayGuard, PayPermit};
pub use service::{BalanceReport, WalletService};

//! # CLI Interface
//!
//! Command-line structure for `cwt-node`, built with `clap` derive. Every
//! runtime knob has an environment fallback so the service can be started
//! from a plain `.env` file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cwt_wallet::config::{DEFAULT_RPC_URL, DEFAULT_SIGNATURE_LIMIT, USDC_MINT_MAINNET};

use crate::logging::LogFormat;
use crate::price::COINGECKO_API;

/// CWT custodial wallet service.
///
/// Keeps one encrypted Solana keypair on disk and serves balance, history
/// and payment endpoints over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "cwt-node",
    about = "CWT custodial wallet service for Solana",
    version,
    propagate_version = true
)]
pub struct CwtNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prompt for the wallet password, then serve the HTTP API.
    Run(RunArgs),
    /// Print the wallet address. Needs no password.
    Address(AddressArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the HTTP API and `/metrics`.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Minimum minutes between two successful payments. 0 disables the
    /// cooldown.
    #[arg(long, env = "PAY_COOLDOWN_MINUTES", default_value_t = 4)]
    pub pay_cooldown_minutes: u64,

    /// Path of the `.cwt` vault file.
    #[arg(long, env = "SOLANA_FILE_PATH")]
    pub solana_file_path: PathBuf,

    /// Solana JSON-RPC endpoint.
    #[arg(long, env = "SOLANA_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub solana_rpc_url: String,

    /// Mint of the tracked token.
    #[arg(long, env = "CWT_TOKEN_MINT", default_value = USDC_MINT_MAINNET)]
    pub token_mint: String,

    /// Signatures fetched per address when rebuilding history.
    #[arg(long, env = "CWT_SIGNATURE_LIMIT", default_value_t = DEFAULT_SIGNATURE_LIMIT)]
    pub signature_limit: usize,

    /// Base URL of the CoinGecko-compatible price API.
    #[arg(long, env = "CWT_PRICE_URL", default_value = COINGECKO_API)]
    pub price_url: String,

    /// Fiat currency the token balance is valued in.
    #[arg(long, env = "CWT_FIAT", default_value = "rub")]
    pub fiat: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "CWT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl RunArgs {
    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }
}

/// Arguments for the `address` subcommand.
#[derive(Parser, Debug)]
pub struct AddressArgs {
    /// Path of the `.cwt` vault file.
    #[arg(long, env = "SOLANA_FILE_PATH")]
    pub solana_file_path: PathBuf,
}

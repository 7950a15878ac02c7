// Copyright (c) 2026 Alex Zink. MIT License.
// See LICENSE for details.

//! # CWT Wallet Node
//!
//! Entry point for the `cwt-node` binary. Parses CLI arguments, initializes
//! logging and metrics, wires the wallet service to the Solana RPC node and
//! the price feed, and serves the HTTP API.
//!
//! Subcommands:
//!
//! - `run`: prompt for the wallet password, then serve
//! - `address`: print the vault address, no password needed
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod password;
mod price;
mod rpc;
mod solana;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use cwt_wallet::vault::read_address_only;
use cwt_wallet::{PayGuard, WalletService};

use cli::{Commands, CwtNodeCli};
use metrics::NodeMetrics;
use password::PasswordStore;
use price::CoinGeckoPriceSource;
use rpc::SolanaRpcClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CwtNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Address(args) => print_address(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Prompts for the password, builds the service and serves until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format());

    let pay_cooldown = Duration::from_secs(args.pay_cooldown_minutes.saturating_mul(60));
    tracing::info!(
        port = args.port,
        vault = %args.solana_file_path.display(),
        rpc_url = %args.solana_rpc_url,
        token_mint = %args.token_mint,
        pay_cooldown_secs = pay_cooldown.as_secs(),
        "starting cwt-node"
    );

    // --- Password ---
    // Read before anything binds, so a refused prompt leaves nothing behind.
    let password = Arc::new(PasswordStore::prompt()?);

    // --- Collaborators ---
    let chain = Arc::new(
        SolanaRpcClient::new(&args.solana_rpc_url, &args.token_mint)
            .context("failed to build Solana RPC client")?,
    );
    let prices = Arc::new(
        CoinGeckoPriceSource::new(&args.price_url, &args.fiat)
            .context("failed to build price client")?,
    );

    // --- Wallet service ---
    let service = WalletService::new(
        &args.solana_file_path,
        chain,
        prices,
        Arc::new(PayGuard::new()),
    )
    .with_pay_cooldown(pay_cooldown)
    .with_signature_limit(args.signature_limit)
    .with_token_mint(&args.token_mint);

    match service.address() {
        Ok(address) => tracing::info!(address = %address, "wallet loaded"),
        Err(e) => tracing::warn!(error = %e, "no wallet yet, POST /solana/generate to create one"),
    }

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- API server ---
    let app_state = api::AppState {
        service: Arc::new(service),
        password,
        metrics: node_metrics,
    };
    let router = api::create_router(app_state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    tracing::info!("API server listening on {}", addr);

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "API server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("cwt-node stopped");
    Ok(())
}

/// Prints the wallet address read from the vault envelope.
fn print_address(args: cli::AddressArgs) -> Result<()> {
    let address = read_address_only(&args.solana_file_path).with_context(|| {
        format!(
            "failed to read address from {}",
            args.solana_file_path.display()
        )
    })?;
    println!("{address}");
    Ok(())
}

fn print_version() {
    println!("cwt-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", rustc_version());
}

fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first. If a
/// handler cannot be installed, that branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

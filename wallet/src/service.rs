//! # Wallet Service
//!
//! The four things a user can do with the wallet, wired together from the
//! pieces in this crate:
//!
//! - **generate**: create a keypair and write the encrypted vault;
//! - **balance**: both balances plus the fiat value of the token balance;
//! - **transactions**: the reconciled, filtered ledger;
//! - **pay**: send SOL or USDC, one transfer at a time, with a cooldown.
//!
//! Only `generate` and `pay` need the password. Balance and history read
//! the public address from the vault envelope and never touch key
//! material.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::amount::{format_units, parse_units, Amount, Currency};
use crate::chain::{ChainClient, PriceSource};
use crate::config::{
    DEFAULT_PAY_COOLDOWN, DEFAULT_SIGNATURE_LIMIT, FIAT_DECIMALS, NATIVE_FEE_LAMPORTS,
    RATE_DECIMALS, USDC_DECIMALS, USDC_MINT_MAINNET,
};
use crate::crypto::{parse_address, WalletKeypair};
use crate::error::WalletError;
use crate::guard::PayGuard;
use crate::ledger::{dedup_signatures, LedgerFilter, LedgerReport, Reconciler};
use crate::vault::{read_address_only, VaultCipher};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Balance view of the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub address: String,
    /// Token balance, 6 decimals.
    pub usdc: String,
    /// Native balance, 9 decimals.
    pub sol: String,
    /// Token to fiat spot rate as quoted by the price source.
    pub rate: String,
    /// Lowercase fiat code of `rate`.
    pub fiat: String,
    /// `usdc * rate`, truncated to 2 decimals.
    #[serde(rename = "usdc_amount_in_fiat")]
    pub fiat_value: String,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Everything needed to serve one wallet.
pub struct WalletService {
    vault_path: PathBuf,
    cipher: VaultCipher,
    chain: Arc<dyn ChainClient>,
    prices: Arc<dyn PriceSource>,
    guard: Arc<PayGuard>,
    pay_cooldown: Duration,
    signature_limit: usize,
    token_mint: String,
}

impl WalletService {
    /// Service with production defaults: interactive scrypt cost, 4 minute
    /// cooldown, 100 signatures per address, mainnet USDC.
    pub fn new(
        vault_path: impl Into<PathBuf>,
        chain: Arc<dyn ChainClient>,
        prices: Arc<dyn PriceSource>,
        guard: Arc<PayGuard>,
    ) -> Self {
        Self {
            vault_path: vault_path.into(),
            cipher: VaultCipher::default(),
            chain,
            prices,
            guard,
            pay_cooldown: DEFAULT_PAY_COOLDOWN,
            signature_limit: DEFAULT_SIGNATURE_LIMIT,
            token_mint: USDC_MINT_MAINNET.to_string(),
        }
    }

    pub fn with_cipher(mut self, cipher: VaultCipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_pay_cooldown(mut self, cooldown: Duration) -> Self {
        self.pay_cooldown = cooldown;
        self
    }

    pub fn with_signature_limit(mut self, limit: usize) -> Self {
        self.signature_limit = limit;
        self
    }

    pub fn with_token_mint(mut self, mint: impl Into<String>) -> Self {
        self.token_mint = mint.into();
        self
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    pub fn pay_cooldown(&self) -> Duration {
        self.pay_cooldown
    }

    /// Wallet address from the vault envelope. No password involved.
    pub fn address(&self) -> Result<String, WalletError> {
        read_address_only(&self.vault_path)
    }

    // -----------------------------------------------------------------------
    // Generate
    // -----------------------------------------------------------------------

    /// Creates a new wallet at the configured vault path. Returns its
    /// address.
    #[instrument(skip_all, fields(path = %self.vault_path.display()))]
    pub async fn generate(&self, password: &[u8]) -> Result<String, WalletError> {
        let cipher = self.cipher;
        let path = self.vault_path.clone();
        let password = Zeroizing::new(password.to_vec());

        run_blocking(move || cipher.generate(&path, &password)).await
    }

    // -----------------------------------------------------------------------
    // Balance
    // -----------------------------------------------------------------------

    #[instrument(skip_all)]
    pub async fn balance(&self) -> Result<BalanceReport, WalletError> {
        let address = self.address()?;

        let (token, native) = tokio::try_join!(
            self.chain.token_balance(&address),
            self.chain.native_balance(&address),
        )?;
        let Some(token) = token else {
            return Err(self.not_provisioned(&address).await);
        };

        let rate = self.prices.spot_rate().await?;
        let fiat_value = fiat_value(token, &rate)?;

        debug!(address = %address, usdc = token, sol = native, "balance fetched");
        Ok(BalanceReport {
            address,
            usdc: format_units(token, Currency::Usdc.decimals()),
            sol: format_units(native, Currency::Sol.decimals()),
            rate,
            fiat: self.prices.fiat().to_string(),
            fiat_value,
        })
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Rebuilds the ledger from chain history and applies `filter`.
    ///
    /// History is read for both the wallet address and its token account,
    /// since token transfers often do not list the owner among the
    /// transaction's accounts.
    #[instrument(skip_all)]
    pub async fn transactions(&self, filter: &LedgerFilter) -> Result<LedgerReport, WalletError> {
        filter.validate()?;
        let address = self.address()?;

        if self.chain.token_balance(&address).await?.is_none() {
            debug!(address = %address, "no token account yet, empty ledger");
            return Ok(LedgerReport::empty(address));
        }

        let token_account = self.chain.token_account_of(&address)?;
        let (owner_sigs, token_sigs) = tokio::try_join!(
            self.chain
                .signatures_for_address(&address, self.signature_limit),
            self.chain
                .signatures_for_address(&token_account, self.signature_limit),
        )?;
        let signatures = dedup_signatures([owner_sigs, token_sigs]);

        let mut raw = Vec::with_capacity(signatures.len());
        for signature in &signatures {
            raw.push(self.chain.transaction(signature).await?);
        }

        let entries = Reconciler::new(address.as_str(), self.token_mint.as_str()).reconcile(raw);
        debug!(
            signatures = signatures.len(),
            entries = entries.len(),
            "ledger reconciled"
        );

        LedgerReport::build(address, entries, filter)
    }

    // -----------------------------------------------------------------------
    // Pay
    // -----------------------------------------------------------------------

    /// Sends `amount` of `currency` to `to`. Returns the transaction
    /// signature.
    ///
    /// Holds the pay lock from the cooldown check until the submission
    /// result is known. The cooldown starts only if the chain accepted the
    /// transfer.
    #[instrument(skip(self, password))]
    pub async fn pay(
        &self,
        currency: Currency,
        to: &str,
        amount: &str,
        password: &[u8],
    ) -> Result<String, WalletError> {
        let to = to.trim();
        parse_address(to)?;

        let amount = Amount::parse(amount, currency)?;
        if amount.is_zero() {
            return Err(WalletError::InvalidAmountFormat {
                input: amount.to_decimal_string(),
                reason: "amount must be greater than zero",
            });
        }

        let permit = self.guard.try_acquire(self.pay_cooldown).await?;

        let address = self.address()?;
        let keypair = self.unlock(password).await?;

        self.ensure_funds(&address, amount).await?;

        let submitted = match currency {
            Currency::Sol => {
                self.chain
                    .submit_native_transfer(&keypair, to, amount.value)
                    .await
            }
            Currency::Usdc => {
                self.chain
                    .submit_token_transfer(&keypair, to, amount.value)
                    .await
            }
        };

        let signature = match submitted {
            Ok(signature) => signature,
            Err(e) => {
                warn!(error = %e, "transfer submission failed");
                return Err(e);
            }
        };

        permit.record_submission();
        info!(signature = %signature, amount = %amount, to = %to, "transfer submitted");
        Ok(signature)
    }

    async fn unlock(&self, password: &[u8]) -> Result<WalletKeypair, WalletError> {
        if password.is_empty() {
            return Err(WalletError::PasswordRequired);
        }
        let cipher = self.cipher;
        let path = self.vault_path.clone();
        let password = Zeroizing::new(password.to_vec());

        run_blocking(move || cipher.unlock(&path, &password)).await
    }

    async fn ensure_funds(&self, address: &str, amount: Amount) -> Result<(), WalletError> {
        let native = self.chain.native_balance(address).await?;

        match amount.currency {
            Currency::Sol => {
                let required = amount.value.saturating_add(NATIVE_FEE_LAMPORTS);
                if native < required {
                    return Err(WalletError::InsufficientBalance {
                        currency: Currency::Sol,
                        required,
                        available: native,
                    });
                }
            }
            Currency::Usdc => {
                let Some(token) = self.chain.token_balance(address).await? else {
                    return Err(self.not_provisioned(address).await);
                };
                if token < amount.value {
                    return Err(WalletError::InsufficientBalance {
                        currency: Currency::Usdc,
                        required: amount.value,
                        available: token,
                    });
                }
                if native < NATIVE_FEE_LAMPORTS {
                    return Err(WalletError::InsufficientBalance {
                        currency: Currency::Sol,
                        required: NATIVE_FEE_LAMPORTS,
                        available: native,
                    });
                }
            }
        }

        Ok(())
    }

    /// Builds the "no token account" error, quoting the rent a sender has
    /// to put up to create it.
    async fn not_provisioned(&self, owner: &str) -> WalletError {
        match self.chain.token_account_rent_exempt_minimum().await {
            Ok(minimum_funding_lamports) => WalletError::TokenAccountNotProvisioned {
                owner: owner.to_string(),
                minimum_funding_lamports,
            },
            Err(e) => e,
        }
    }
}

/// Fiat value of `token_units` at `rate`, with integer arithmetic only.
///
/// The rate is read at 6 decimals; the product is truncated to 2.
pub fn fiat_value(token_units: u64, rate: &str) -> Result<String, WalletError> {
    let rate_units =
        parse_units(rate, RATE_DECIMALS).map_err(|e| WalletError::upstream("malformed spot rate", e))?;

    let shift = USDC_DECIMALS + RATE_DECIMALS - FIAT_DECIMALS;
    let product = u128::from(token_units) * u128::from(rate_units) / 10u128.pow(shift);
    let cents = u64::try_from(product).unwrap_or(u64::MAX);
    Ok(format_units(cents, FIAT_DECIMALS))
}

/// Runs CPU-heavy vault work (scrypt) off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, WalletError>
where
    F: FnOnce() -> Result<T, WalletError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WalletError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

//! # External Collaborators
//!
//! The wallet core never speaks JSON-RPC or HTTP itself. It talks to the
//! chain and to the price feed through these two traits, and the binary
//! plugs in real implementations. Tests plug in fakes.
//!
//! Implementations own their timeouts and retries. Any failure comes back
//! as [`WalletError::UpstreamUnavailable`] with enough context to tell
//! which call failed.
//!
//! [`WalletError::UpstreamUnavailable`]: crate::error::WalletError::UpstreamUnavailable

use async_trait::async_trait;

use crate::crypto::WalletKeypair;
use crate::error::WalletError;
use crate::ledger::RawTransaction;

/// Read and write access to the chain for one token mint.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance of `address`, lamports.
    async fn native_balance(&self, address: &str) -> Result<u64, WalletError>;

    /// Token balance of `owner`'s associated token account, base units.
    /// `None` if that account does not exist.
    async fn token_balance(&self, owner: &str) -> Result<Option<u64>, WalletError>;

    /// Address of `owner`'s associated token account (whether or not it
    /// exists yet).
    fn token_account_of(&self, owner: &str) -> Result<String, WalletError>;

    /// Up to `limit` signatures touching `address`, most recent first.
    async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, WalletError>;

    /// Full balance snapshot of one confirmed transaction.
    async fn transaction(&self, signature: &str) -> Result<RawTransaction, WalletError>;

    /// Lamports a token account must hold to be rent exempt.
    async fn token_account_rent_exempt_minimum(&self) -> Result<u64, WalletError>;

    /// Signs and submits a native transfer. Returns the signature.
    async fn submit_native_transfer(
        &self,
        from: &WalletKeypair,
        to: &str,
        lamports: u64,
    ) -> Result<String, WalletError>;

    /// Signs and submits a token transfer from `from`'s associated token
    /// account to `to`'s, creating the destination account first if it is
    /// missing. Returns the signature.
    async fn submit_token_transfer(
        &self,
        from: &WalletKeypair,
        to: &str,
        amount: u64,
    ) -> Result<String, WalletError>;
}

/// Spot rate of the token against the display fiat currency.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Rate as a decimal string, e.g. `"95.12"`.
    async fn spot_rate(&self) -> Result<String, WalletError>;

    /// Lowercase fiat code the rate is quoted in.
    fn fiat(&self) -> &str;
}

//! # Wallet Configuration & Constants
//!
//! Every magic number in CWT lives here. The vault parameters in particular
//! are part of the at-rest format: a wallet written with one set of values
//! can only be opened with the same values, so treat them as frozen.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Network tag written into every vault envelope.
pub const NETWORK_SOLANA: &str = "solana";

/// USDC mint on Solana mainnet-beta. Does not exist on devnet/testnet.
pub const USDC_MINT_MAINNET: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Default JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

// ---------------------------------------------------------------------------
// Amount Scales
// ---------------------------------------------------------------------------

/// SOL has 9 decimal places (1 SOL = 1_000_000_000 lamports).
pub const SOL_DECIMALS: u32 = 9;

/// USDC has 6 decimal places (1 USDC = 1_000_000 micro-units).
pub const USDC_DECIMALS: u32 = 6;

/// Scale used for fiat spot rates before they are multiplied into a balance.
pub const RATE_DECIMALS: u32 = 6;

/// Scale of the rendered fiat value (kopecks, cents).
pub const FIAT_DECIMALS: u32 = 2;

// ---------------------------------------------------------------------------
// Vault Format
// ---------------------------------------------------------------------------

/// Required extension of a vault file.
pub const VAULT_EXTENSION: &str = "cwt";

/// UTF-8 byte-order marker written ahead of the JSON envelope.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// scrypt cost parameter as log2(N). N = 2^18 is ~256 MiB of working set and
/// 0.5-2 s of derivation: expensive for an attacker holding a stolen file,
/// still tolerable once per request on a phone-class device.
pub const SCRYPT_LOG_N: u8 = 18;

/// scrypt block size.
pub const SCRYPT_R: u32 = 8;

/// scrypt parallelism.
pub const SCRYPT_P: u32 = 1;

/// Length of the per-file random salt.
pub const SALT_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits, the only size GCM is happy with.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Ed25519 seed length.
pub const SEED_LENGTH: usize = 32;

/// Solana-style keypair bytes: 32-byte seed followed by the 32-byte public key.
pub const KEYPAIR_LENGTH: usize = 64;

/// Raw public key length. Every valid address decodes to exactly this many bytes.
pub const PUBKEY_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// Base network fee for a single-signature transaction, in lamports.
pub const NATIVE_FEE_LAMPORTS: u64 = 5_000;

/// Size of an SPL token account, used to quote its rent-exempt minimum.
pub const TOKEN_ACCOUNT_SIZE: u64 = 165;

/// Default minimum wait between two successful outgoing transfers.
pub const DEFAULT_PAY_COOLDOWN: Duration = Duration::from_secs(4 * 60);

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Default number of signatures fetched per address when rebuilding history.
pub const DEFAULT_SIGNATURE_LIMIT: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_is_seed_plus_pubkey() {
        assert_eq!(KEYPAIR_LENGTH, SEED_LENGTH + PUBKEY_LENGTH);
    }

    #[test]
    fn native_scale_is_finer_than_token_scale() {
        // Ledger filters fall back to the native scale when no currency is
        // given; that is only lossless if it is the finer of the two.
        assert!(SOL_DECIMALS > USDC_DECIMALS);
    }
}

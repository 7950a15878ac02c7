//! # Key Management
//!
//! Ed25519 keypairs in the layout Solana tooling expects: a 64-byte blob
//! made of the 32-byte seed followed by the 32-byte public key. The address
//! is the base58 encoding of the public key.
//!
//! ## Security considerations
//!
//! - The signing key is zeroized on drop (ed25519-dalek's `zeroize` feature).
//! - Exported key bytes come back in a [`Zeroizing`] buffer.
//! - Key bytes are never logged, and `Debug` only shows the address.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::config::{KEYPAIR_LENGTH, PUBKEY_LENGTH, SEED_LENGTH};
use crate::error::WalletError;

/// The wallet's one and only signing identity.
///
/// Deliberately not `Clone` and not `Serialize`: the only way key material
/// leaves this type is [`WalletKeypair::to_keypair_bytes`], and that is
/// meant to go straight into the vault encryptor.
pub struct WalletKeypair {
    signing_key: SigningKey,
}

impl WalletKeypair {
    /// Fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuilds a keypair from stored secret bytes.
    ///
    /// Accepts the 64-byte seed+pubkey layout (the embedded public key must
    /// match the seed) and, for vaults written by older builds, a bare
    /// 32-byte seed.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let signing_key = match bytes.len() {
            KEYPAIR_LENGTH => {
                let mut buf = Zeroizing::new([0u8; KEYPAIR_LENGTH]);
                buf.copy_from_slice(bytes);
                SigningKey::from_keypair_bytes(&buf).map_err(|_| {
                    WalletError::InvalidVaultFile {
                        reason: "private key halves do not match".into(),
                    }
                })?
            }
            SEED_LENGTH => {
                let mut seed = Zeroizing::new([0u8; SEED_LENGTH]);
                seed.copy_from_slice(bytes);
                SigningKey::from_bytes(&seed)
            }
            _ => {
                return Err(WalletError::InvalidVaultFile {
                    reason: "invalid private key length".into(),
                })
            }
        };
        Ok(Self { signing_key })
    }

    /// Exports the 64-byte seed+pubkey blob. Handle with care.
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_LENGTH]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }

    /// Raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; PUBKEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Base58 address. Safe to share, log, print on a QR code.
    pub fn address(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    /// `true` if `address` is this keypair's address.
    pub fn matches_address(&self, address: &str) -> bool {
        parse_address(address)
            .map(|pk| pk == self.public_key_bytes())
            .unwrap_or(false)
    }

    /// Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for WalletKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Decodes a base58 address into its 32 public key bytes.
///
/// # Errors
///
/// [`WalletError::InvalidAddress`] if the string is not base58 or does not
/// decode to exactly 32 bytes.
pub fn parse_address(address: &str) -> Result<[u8; PUBKEY_LENGTH], WalletError> {
    let invalid = || WalletError::InvalidAddress {
        input: address.to_string(),
    };

    let bytes = bs58::decode(address.trim()).into_vec().map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    #[test]
    fn keypair_bytes_roundtrip() {
        let kp = WalletKeypair::generate();
        let bytes = kp.to_keypair_bytes();
        assert_eq!(&bytes[SEED_LENGTH..], &kp.public_key_bytes());

        let restored = WalletKeypair::from_secret_bytes(bytes.as_slice()).unwrap();
        assert_eq!(restored.address(), kp.address());
    }

    #[test]
    fn seed_only_secret_is_accepted() {
        let kp = WalletKeypair::generate();
        let bytes = kp.to_keypair_bytes();
        let restored = WalletKeypair::from_secret_bytes(&bytes[..SEED_LENGTH]).unwrap();
        assert_eq!(restored.public_key_bytes(), kp.public_key_bytes());
    }

    #[test]
    fn mismatched_halves_are_rejected() {
        let a = WalletKeypair::generate().to_keypair_bytes();
        let b = WalletKeypair::generate().to_keypair_bytes();
        let mut spliced = [0u8; KEYPAIR_LENGTH];
        spliced[..SEED_LENGTH].copy_from_slice(&a[..SEED_LENGTH]);
        spliced[SEED_LENGTH..].copy_from_slice(&b[SEED_LENGTH..]);
        assert!(WalletKeypair::from_secret_bytes(&spliced).is_err());
        assert!(WalletKeypair::from_secret_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn address_is_base58_pubkey() {
        let kp = WalletKeypair::generate();
        let addr = kp.address();
        assert_eq!(parse_address(&addr).unwrap(), kp.public_key_bytes());
        assert!(kp.matches_address(&addr));
        assert!(!kp.matches_address(&WalletKeypair::generate().address()));
        assert!(!kp.matches_address("not-an-address"));
    }

    #[test]
    fn parse_address_rejects_bad_input() {
        assert!(parse_address("").is_err());
        assert!(parse_address("0OIl").is_err()); // not in the base58 alphabet
        assert!(parse_address("3yZe7d").is_err()); // valid base58, wrong length
        assert!(parse_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").is_ok());
    }

    #[test]
    fn signatures_verify() {
        let kp = WalletKeypair::generate();
        let sig = kp.sign(b"transfer 1 SOL");
        let vk = VerifyingKey::from_bytes(&kp.public_key_bytes()).unwrap();
        assert!(vk
            .verify(b"transfer 1 SOL", &Signature::from_bytes(&sig))
            .is_ok());
    }

    #[test]
    fn debug_hides_secret() {
        let kp = WalletKeypair::generate();
        let dbg = format!("{:?}", kp);
        assert!(dbg.contains(&kp.address()));
        assert!(!dbg.contains("signing_key"));
    }
}

//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for the vault payload.
//!
//! ## Nonce management
//!
//! GCM does not forgive nonce reuse: two messages under the same key and
//! nonce leak the XOR of the plaintexts and let an attacker forge tags.
//! Every seal here uses a fresh 96-bit nonce from the OS RNG, and since each
//! vault also gets a fresh salt (hence a fresh key), collisions are not a
//! realistic concern.
//!
//! Unlike a self-framing `nonce || ciphertext` blob, the vault stores nonce
//! and ciphertext as separate envelope fields, so both halves are passed
//! explicitly.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};
use crate::error::WalletError;

/// Fresh random 96-bit nonce.
pub fn generate_nonce() -> [u8; AES_NONCE_LENGTH] {
    let mut nonce = [0u8; AES_NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext` under `key` and `nonce`. The returned ciphertext
/// carries the 16-byte tag at its end.
pub fn seal(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    plaintext: &[u8],
) -> Result<Vec<u8>, WalletError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| WalletError::Crypto)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| WalletError::Crypto)
}

/// Decrypts and authenticates `ciphertext`.
///
/// A nonce of the wrong length, a wrong key, and a modified ciphertext all
/// end in [`WalletError::InvalidPassword`]. We don't distinguish between
/// them on purpose.
pub fn open(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, WalletError> {
    if nonce.len() != AES_NONCE_LENGTH {
        return Err(WalletError::InvalidPassword);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| WalletError::InvalidPassword)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| WalletError::InvalidPassword)
}

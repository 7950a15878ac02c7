//! # Password Key Derivation
//!
//! scrypt with interactive-use parameters. The derived key only ever exists
//! inside a [`Zeroizing`] buffer owned by the caller.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::{AES_KEY_LENGTH, SALT_LENGTH, SCRYPT_LOG_N, SCRYPT_P, SCRYPT_R};
use crate::error::WalletError;

/// scrypt cost parameters.
///
/// These are not stored in the vault file, so every vault in circulation was
/// written with [`KdfParams::interactive`]. Anything else is for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// log2 of the CPU/memory cost `N`.
    pub log_n: u8,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
}

impl KdfParams {
    /// N = 2^18, r = 8, p = 1: ~256 MiB and well under a few seconds.
    pub const fn interactive() -> Self {
        Self {
            log_n: SCRYPT_LOG_N,
            r: SCRYPT_R,
            p: SCRYPT_P,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derives the 32-byte AES key for `password` under `salt`.
///
/// Any failure here is a parameter problem, never a password problem, and
/// is reported as [`WalletError::Crypto`].
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, WalletError> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, AES_KEY_LENGTH)
        .map_err(|_| WalletError::Crypto)?;

    let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    scrypt::scrypt(password, salt, &scrypt_params, &mut *key).map_err(|_| WalletError::Crypto)?;
    Ok(key)
}

/// Fresh random salt from the OS RNG. One per vault file, never reused.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams {
        log_n: 4,
        r: 8,
        p: 1,
    };

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = [42u8; SALT_LENGTH];
        let k1 = derive_key(b"correct-horse", &salt, &FAST).unwrap();
        let k2 = derive_key(b"correct-horse", &salt, &FAST).unwrap();
        assert_eq!(*k1, *k2);
    }

    #[test]
    fn password_and_salt_both_matter() {
        let salt = [1u8; SALT_LENGTH];
        let base = derive_key(b"password1", &salt, &FAST).unwrap();
        let other_pw = derive_key(b"password2", &salt, &FAST).unwrap();
        let other_salt = derive_key(b"password1", &[2u8; SALT_LENGTH], &FAST).unwrap();
        assert_ne!(*base, *other_pw);
        assert_ne!(*base, *other_salt);
    }

    #[test]
    fn rejects_nonsense_params() {
        let bad = KdfParams {
            log_n: 0,
            r: 0,
            p: 0,
        };
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_LENGTH], &bad),
            Err(WalletError::Crypto)
        ));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn production_params_are_the_vault_params() {
        assert_eq!(KdfParams::default(), KdfParams::interactive());
        assert_eq!(KdfParams::interactive().log_n, 18);
    }
}

//! # Vault Crypto Engine
//!
//! Password in, sealed envelope out, and back again.
//!
//! ```text
//! password ──scrypt(salt)──▶ key ──AES-256-GCM(nonce)──▶ cipherText
//!                                    ▲
//!             WalletSecret JSON ─────┘
//! ```
//!
//! Salt and nonce are drawn fresh for every encryption and embedded in the
//! envelope, so decryption needs nothing but the file and the password.
//! The derived key, the serialized plaintext and the decrypted secret all
//! live in zeroizing buffers owned by the function that created them.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use super::file::{ensure_vault_extension, VaultFile};
use super::qr::render_address_qr;
use super::secret::WalletSecret;
use crate::config::NETWORK_SOLANA;
use crate::crypto::{self, derive_key, generate_nonce, generate_salt, KdfParams, WalletKeypair};
use crate::error::WalletError;

/// Encrypts and decrypts vault payloads under one set of KDF parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultCipher {
    kdf: KdfParams,
}

impl VaultCipher {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    /// Seals `secret` into a new envelope for `address` on `network`.
    ///
    /// # Errors
    ///
    /// [`WalletError::PasswordRequired`] for an empty password.
    pub fn encrypt(
        &self,
        secret: &WalletSecret,
        password: &[u8],
        network: &str,
        address: &str,
        qr_image: String,
    ) -> Result<VaultFile, WalletError> {
        if password.is_empty() {
            return Err(WalletError::PasswordRequired);
        }

        let salt = generate_salt();
        let nonce = generate_nonce();
        let key = derive_key(password, &salt, &self.kdf)?;
        let plaintext = secret.to_plaintext()?;
        let cipher_text = crypto::seal(&key, &nonce, &plaintext)?;

        Ok(VaultFile {
            network: network.to_string(),
            address: address.to_string(),
            qr_image,
            salt: STANDARD.encode(salt),
            nonce: STANDARD.encode(nonce),
            cipher_text: STANDARD.encode(cipher_text),
        })
    }

    /// Opens an envelope.
    ///
    /// A wrong password and a tampered salt, nonce or ciphertext all come
    /// back as [`WalletError::InvalidPassword`].
    pub fn decrypt(&self, vault: &VaultFile, password: &[u8]) -> Result<WalletSecret, WalletError> {
        if password.is_empty() {
            return Err(WalletError::PasswordRequired);
        }

        let salt = vault.salt_bytes()?;
        let nonce = vault.nonce_bytes()?;
        let cipher_text = vault.cipher_text_bytes()?;

        let key = derive_key(password, &salt, &self.kdf)?;
        let plaintext = Zeroizing::new(crypto::open(&key, &nonce, &cipher_text)?);
        WalletSecret::from_plaintext(&plaintext)
    }

    /// Loads the vault at `path`, decrypts it and rebuilds the keypair,
    /// checking it against the envelope's address.
    #[instrument(skip(self, password), fields(path = %path.display()))]
    pub fn unlock(&self, path: &Path, password: &[u8]) -> Result<WalletKeypair, WalletError> {
        let vault = VaultFile::load(path)?;
        let secret = self.decrypt(&vault, password)?;
        let keypair = secret.keypair()?;
        if !keypair.matches_address(&vault.address) {
            return Err(WalletError::KeyMismatch);
        }
        debug!(address = %vault.address, "vault unlocked");
        Ok(keypair)
    }

    /// Creates a fresh wallet and writes its vault to `path`.
    ///
    /// The destination checks run before key generation so a bad path never
    /// pays for a KDF round. Returns the new address.
    #[instrument(skip(self, password), fields(path = %path.display()))]
    pub fn generate(&self, path: &Path, password: &[u8]) -> Result<String, WalletError> {
        if password.is_empty() {
            return Err(WalletError::PasswordRequired);
        }
        ensure_vault_extension(path)?;
        ensure_destination_free(path)?;

        let keypair = WalletKeypair::generate();
        let address = keypair.address();
        let qr_image = render_address_qr(&address)?;
        let secret = WalletSecret::from_keypair(&keypair);

        let vault = self.encrypt(&secret, password, NETWORK_SOLANA, &address, qr_image)?;
        vault.save(path)?;

        info!(address = %address, "wallet generated");
        Ok(address)
    }
}

fn ensure_destination_free(path: &Path) -> Result<(), WalletError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Err(WalletError::DestinationExists {
            path: path.to_path_buf(),
        }),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::read_address_only;

    const FAST: KdfParams = KdfParams {
        log_n: 4,
        r: 8,
        p: 1,
    };

    fn cipher() -> VaultCipher {
        VaultCipher::new(FAST)
    }

    fn secret() -> (WalletKeypair, WalletSecret) {
        let kp = WalletKeypair::generate();
        let secret = WalletSecret::from_keypair(&kp);
        (kp, secret)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let (kp, secret) = secret();
        let vault = cipher()
            .encrypt(&secret, b"hunter2", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap();

        assert_eq!(vault.network, "solana");
        assert_eq!(vault.address, kp.address());
        assert_eq!(cipher().decrypt(&vault, b"hunter2").unwrap(), secret);
    }

    #[test]
    fn wrong_password_is_invalid_password() {
        let (kp, secret) = secret();
        let vault = cipher()
            .encrypt(&secret, b"hunter2", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap();
        let wrong_passwords: [&[u8]; 3] = [b"hunter3", b"Hunter2", b"hunter2 "];
        for wrong in wrong_passwords {
            assert!(matches!(
                cipher().decrypt(&vault, wrong),
                Err(WalletError::InvalidPassword)
            ));
        }
    }

    #[test]
    fn tampered_envelope_is_invalid_password() {
        let (kp, secret) = secret();
        let vault = cipher()
            .encrypt(&secret, b"pw", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap();

        let mut other_salt = vault.clone();
        other_salt.salt = STANDARD.encode([9u8; 32]);
        let mut other_nonce = vault.clone();
        other_nonce.nonce = STANDARD.encode([9u8; 12]);
        let mut short_nonce = vault.clone();
        short_nonce.nonce = STANDARD.encode([9u8; 4]);
        let mut flipped = vault.clone();
        let mut ct = STANDARD.decode(&vault.cipher_text).unwrap();
        ct[0] ^= 1;
        flipped.cipher_text = STANDARD.encode(ct);

        for tampered in [other_salt, other_nonce, short_nonce, flipped] {
            assert!(matches!(
                cipher().decrypt(&tampered, b"pw"),
                Err(WalletError::InvalidPassword)
            ));
        }
    }

    #[test]
    fn empty_password_is_password_required() {
        let (kp, secret) = secret();
        assert!(matches!(
            cipher().encrypt(&secret, b"", NETWORK_SOLANA, &kp.address(), String::new()),
            Err(WalletError::PasswordRequired)
        ));

        let vault = cipher()
            .encrypt(&secret, b"pw", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap();
        assert!(matches!(
            cipher().decrypt(&vault, b""),
            Err(WalletError::PasswordRequired)
        ));
    }

    #[test]
    fn salt_and_nonce_are_fresh_per_encryption() {
        let (kp, secret) = secret();
        let a = cipher()
            .encrypt(&secret, b"pw", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap();
        let b = cipher()
            .encrypt(&secret, b"pw", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.cipher_text, b.cipher_text);
    }

    #[test]
    fn generate_then_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.cwt");

        let address = cipher().generate(&path, b"pw").unwrap();
        assert_eq!(read_address_only(&path).unwrap(), address);
        assert!(!VaultFile::load(&path).unwrap().qr_image.is_empty());

        let kp = cipher().unlock(&path, b"pw").unwrap();
        assert_eq!(kp.address(), address);
    }

    #[test]
    fn generate_refuses_populated_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.cwt");
        let first = cipher().generate(&path, b"pw").unwrap();

        assert!(matches!(
            cipher().generate(&path, b"pw"),
            Err(WalletError::DestinationExists { .. })
        ));
        assert_eq!(read_address_only(&path).unwrap(), first);
    }

    #[test]
    fn concurrent_generate_leaves_one_usable_wallet() {
        use std::sync::{Arc, Barrier};

        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let path = Arc::new(dir.path().join("wallet.cwt"));
            let callers = 4;
            let barrier = Arc::new(Barrier::new(callers));

            let handles: Vec<_> = (0..callers)
                .map(|_| {
                    let path = Arc::clone(&path);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        cipher().generate(&path, b"pw")
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let created: Vec<&String> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
            assert_eq!(created.len(), 1);
            assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
                e,
                WalletError::DestinationExists { .. }
            )));

            let kp = cipher().unlock(&path, b"pw").unwrap();
            assert_eq!(&kp.address(), created[0]);
        }
    }

    #[test]
    fn generate_checks_extension_and_password_first() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            cipher().generate(&dir.path().join("wallet.txt"), b"pw"),
            Err(WalletError::InvalidExtension { .. })
        ));
        assert!(matches!(
            cipher().generate(&dir.path().join("wallet.cwt"), b""),
            Err(WalletError::PasswordRequired)
        ));
    }

    #[test]
    fn unlock_detects_foreign_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.cwt");

        let (_, secret) = secret();
        let someone_else = WalletKeypair::generate().address();
        cipher()
            .encrypt(&secret, b"pw", NETWORK_SOLANA, &someone_else, String::new())
            .unwrap()
            .save(&path)
            .unwrap();

        assert!(matches!(
            cipher().unlock(&path, b"pw"),
            Err(WalletError::KeyMismatch)
        ));
    }

    #[test]
    fn legacy_seed_vault_unlocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.cwt");

        let kp = WalletKeypair::generate();
        let legacy = WalletSecret {
            private_key: kp.to_keypair_bytes()[..32].to_vec(),
            created_at: "2025-06-01T12:00:00Z".into(),
        };
        cipher()
            .encrypt(&legacy, b"dev", NETWORK_SOLANA, &kp.address(), String::new())
            .unwrap()
            .save(&path)
            .unwrap();

        assert_eq!(cipher().unlock(&path, b"dev").unwrap().address(), kp.address());
    }
}

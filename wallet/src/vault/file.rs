//! # Vault File Envelope
//!
//! The at-rest layout of a `.cwt` file: a UTF-8 BOM followed by
//! pretty-printed JSON.
//!
//! ```json
//! {
//!   "network": "solana",
//!   "address": "<base58>",
//!   "QR": "<base64 PNG>",
//!   "salt": "<base64, 32 bytes>",
//!   "nonce": "<base64, 12 bytes>",
//!   "cipherText": "<base64>"
//! }
//! ```
//!
//! Only `cipherText` is secret. Everything else can be read without a
//! password, which is what [`read_address_only`] relies on.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{UTF8_BOM, VAULT_EXTENSION};
use crate::error::WalletError;

/// The JSON envelope stored in a vault file. Binary fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFile {
    pub network: String,
    pub address: String,
    /// QR code PNG of the address, base64.
    #[serde(rename = "QR", alias = "qrImage", default)]
    pub qr_image: String,
    pub salt: String,
    pub nonce: String,
    #[serde(rename = "cipherText")]
    pub cipher_text: String,
}

impl VaultFile {
    /// Reads and parses a vault file. A leading BOM is tolerated.
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let bytes = read_non_empty(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parses envelope bytes, with or without a leading BOM.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let json = bytes.strip_prefix(&UTF8_BOM[..]).unwrap_or(bytes);
        serde_json::from_slice(json).map_err(|e| WalletError::InvalidVaultFile {
            reason: format!("failed to parse vault envelope: {e}"),
        })
    }

    /// BOM + 2-space indented JSON, the exact bytes [`VaultFile::save`] writes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WalletError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| WalletError::InvalidVaultFile {
            reason: format!("failed to serialize vault envelope: {e}"),
        })?;
        let mut out = Vec::with_capacity(UTF8_BOM.len() + json.len());
        out.extend_from_slice(&UTF8_BOM);
        out.extend_from_slice(&json);
        Ok(out)
    }

    /// Writes the envelope to `path` with owner-only permissions.
    ///
    /// Refuses paths without the `.cwt` extension and never overwrites a
    /// file that already holds data. An existing empty file is reused.
    ///
    /// A missing destination is created with `create_new`, and saves within
    /// the process are serialized, so of several concurrent writers to one
    /// path exactly one succeeds and the rest get
    /// [`WalletError::DestinationExists`].
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        ensure_vault_extension(path)?;
        let bytes = self.to_bytes()?;

        let _serialized = SAVE_LOCK.lock();
        let mut file = open_destination(path)?;

        if let Err(e) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
            // Leave an empty, reusable file rather than a torn envelope.
            let _ = file.set_len(0);
            return Err(e.into());
        }

        debug!(path = %path.display(), address = %self.address, "vault file written");
        Ok(())
    }

    pub fn salt_bytes(&self) -> Result<Vec<u8>, WalletError> {
        decode_field("salt", &self.salt)
    }

    pub fn nonce_bytes(&self) -> Result<Vec<u8>, WalletError> {
        decode_field("nonce", &self.nonce)
    }

    pub fn cipher_text_bytes(&self) -> Result<Vec<u8>, WalletError> {
        decode_field("cipherText", &self.cipher_text)
    }
}

/// Reads the public address from a vault without touching the ciphertext.
///
/// No password is involved and no secret material is ever in scope.
pub fn read_address_only(path: &Path) -> Result<String, WalletError> {
    let vault = VaultFile::load(path)?;
    if vault.address.trim().is_empty() {
        return Err(WalletError::InvalidVaultFile {
            reason: "address field is empty".into(),
        });
    }
    Ok(vault.address)
}

/// Fails with [`WalletError::InvalidExtension`] unless `path` ends in `.cwt`.
pub fn ensure_vault_extension(path: &Path) -> Result<(), WalletError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext == VAULT_EXTENSION => Ok(()),
        _ => Err(WalletError::InvalidExtension {
            path: path.to_path_buf(),
        }),
    }
}

static SAVE_LOCK: Mutex<()> = parking_lot::const_mutex(());

fn destination_exists(path: &Path) -> WalletError {
    WalletError::DestinationExists {
        path: path.to_path_buf(),
    }
}

/// Opens `path` for a fresh envelope: created exclusively when missing,
/// reopened when it exists but is empty. Emptiness is checked again on the
/// opened handle.
fn open_destination(path: &Path) -> Result<File, WalletError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Err(destination_exists(path)),
        Ok(_) => {
            let file = OpenOptions::new().write(true).open(path)?;
            if file.metadata()?.len() > 0 {
                return Err(destination_exists(path));
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            Ok(file)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            match options.open(path) {
                Ok(file) => Ok(file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(destination_exists(path)),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

fn read_non_empty(path: &Path) -> Result<Vec<u8>, WalletError> {
    let missing = || WalletError::MissingOrEmptyFile {
        path: path.to_path_buf(),
    };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(missing()),
        Err(e) => return Err(e.into()),
    };
    if bytes.is_empty() {
        return Err(missing());
    }
    Ok(bytes)
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, WalletError> {
    STANDARD
        .decode(value.trim())
        .map_err(|_| WalletError::InvalidVaultFile {
            reason: format!("field '{name}' is not valid base64"),
        })
}

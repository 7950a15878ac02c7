//! # Wallet Secret
//!
//! The plaintext that lives inside a vault's ciphertext:
//!
//! ```json
//! {"privateKey":"<base64 of 64 bytes>","createdAt":"2026-01-01T00:00:00Z"}
//! ```
//!
//! A [`WalletSecret`] is a scoped resource. Its key bytes are overwritten
//! with zeros when it drops, on every exit path, so holders never have to
//! remember to clean up.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::WalletKeypair;
use crate::error::WalletError;

/// Decrypted vault payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct WalletSecret {
    /// 64-byte seed+pubkey blob (32-byte seed in legacy vaults).
    #[serde(with = "base64_secret")]
    pub private_key: Vec<u8>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl WalletSecret {
    /// Captures a keypair's secret bytes, stamped with the current time.
    pub fn from_keypair(keypair: &WalletKeypair) -> Self {
        Self {
            private_key: keypair.to_keypair_bytes().to_vec(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Rebuilds the signing keypair.
    pub fn keypair(&self) -> Result<WalletKeypair, WalletError> {
        WalletKeypair::from_secret_bytes(&self.private_key)
    }

    /// Serializes to the JSON payload that gets encrypted.
    pub fn to_plaintext(&self) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| WalletError::InvalidVaultFile {
                reason: format!("failed to serialize wallet secret: {e}"),
            })
    }

    /// Parses a decrypted JSON payload.
    pub fn from_plaintext(plaintext: &[u8]) -> Result<Self, WalletError> {
        serde_json::from_slice(plaintext).map_err(|e| WalletError::InvalidVaultFile {
            reason: format!("failed to parse wallet secret: {e}"),
        })
    }
}

impl fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecret")
            .field("private_key", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Base64 (standard alphabet, padded) for key bytes. Intermediate strings
/// are zeroized as well.
mod base64_secret {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = Zeroizing::new(STANDARD.encode(bytes));
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Zeroizing::new(String::deserialize(deserializer)?);
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_camel_case_and_base64() {
        let secret = WalletSecret {
            private_key: vec![0xAB; 64],
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let json: serde_json::Value =
            serde_json::from_slice(&secret.to_plaintext().unwrap()).unwrap();
        assert_eq!(json["createdAt"], "2026-01-01T00:00:00Z");
        assert_eq!(
            STANDARD.decode(json["privateKey"].as_str().unwrap()).unwrap(),
            vec![0xAB; 64]
        );
    }

    #[test]
    fn plaintext_roundtrip_rebuilds_keypair() {
        let kp = WalletKeypair::generate();
        let secret = WalletSecret::from_keypair(&kp);
        assert_eq!(secret.private_key.len(), 64);

        let parsed = WalletSecret::from_plaintext(&secret.to_plaintext().unwrap()).unwrap();
        assert_eq!(parsed, secret);
        assert_eq!(parsed.keypair().unwrap().address(), kp.address());
    }

    #[test]
    fn malformed_payload_is_invalid_vault_file() {
        let payloads: [&[u8]; 2] = [b"not json", br#"{"privateKey":"!!","createdAt":"x"}"#];
        for bad in payloads {
            assert!(matches!(
                WalletSecret::from_plaintext(bad),
                Err(WalletError::InvalidVaultFile { .. })
            ));
        }
    }

    #[test]
    fn wrong_key_length_does_not_build_a_keypair() {
        let secret = WalletSecret {
            private_key: vec![1; 48],
            created_at: String::new(),
        };
        assert!(secret.keypair().is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let secret = WalletSecret {
            private_key: vec![0x42; 64],
            created_at: "now".into(),
        };
        let dbg = format!("{:?}", secret);
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("66")); // 0x42
    }
}

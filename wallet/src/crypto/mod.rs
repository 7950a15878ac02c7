//! # Cryptographic Primitives for CWT
//!
//! Thin, typed wrappers around audited implementations. Nothing in here is
//! clever, and it should stay that way.
//!
//! - **scrypt** turns a password into a 256-bit key. Memory-hard, so a
//!   stolen vault is expensive to brute force.
//! - **AES-256-GCM** seals the secret payload. AEAD: one operation gives
//!   confidentiality and tamper detection.
//! - **Ed25519** is the wallet keypair, in the 64-byte Solana layout.
//!
//! Key material lives in `Zeroizing` buffers and is wiped when it goes out
//! of scope, on every exit path including unwinding.

pub mod encryption;
pub mod kdf;
pub mod keys;

pub use encryption::{generate_nonce, open, seal};
pub use kdf::{derive_key, generate_salt, KdfParams};
pub use keys::{parse_address, WalletKeypair};

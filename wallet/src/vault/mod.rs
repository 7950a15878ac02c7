//! # Vault: Encrypted Key Storage
//!
//! One wallet, one file, one password. The vault is the only place the
//! private key is ever written down, and it is never written down in the
//! clear.
//!
//! ## Architecture
//!
//! ```text
//! secret.rs  WalletSecret: the plaintext payload, zeroized on drop
//! file.rs    VaultFile: the JSON envelope, BOM handling, safe writes
//! qr.rs      QR code of the address for the envelope
//! engine.rs  VaultCipher: scrypt + AES-256-GCM, generate, unlock
//! ```
//!
//! ## Rules
//!
//! 1. **Never overwrite a vault.** A non-empty destination is an error, not
//!    a prompt to truncate.
//! 2. **The address is public.** It sits next to the ciphertext in plain
//!    JSON, so balance and history lookups never need the password.
//! 3. **Failures are opaque.** Whatever breaks during decryption, the
//!    caller sees `InvalidPassword`.

pub mod engine;
pub mod file;
pub mod qr;
pub mod secret;

pub use engine::VaultCipher;
pub use file::{read_address_only, VaultFile};
pub use qr::render_address_qr;
pub use secret::WalletSecret;

//! Wallet password, read once at startup.
//!
//! The password never comes from a flag or an environment variable. It is
//! typed into the terminal with echo off and kept in a zeroizing buffer for
//! the life of the process. Handlers get short-lived copies.

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use rpassword::prompt_password;
use zeroize::Zeroizing;

use cwt_wallet::WalletError;

pub struct PasswordStore {
    secret: Zeroizing<Vec<u8>>,
}

impl PasswordStore {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Reads the password from the terminal with echo off.
    ///
    /// Refuses to run when stdin is not a terminal, and refuses an empty
    /// answer.
    pub fn prompt() -> Result<Self> {
        if !std::io::stdin().is_terminal() {
            bail!("stdin is not a terminal: run the service interactively to enter the password");
        }

        let typed = Zeroizing::new(
            prompt_password("Enter wallet password: ").context("failed to read password")?,
        );
        if typed.is_empty() {
            bail!("password cannot be empty");
        }

        Ok(Self::new(typed.as_bytes()))
    }

    /// A private copy of the password for one request.
    pub fn get(&self) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        if self.secret.is_empty() {
            return Err(WalletError::PasswordRequired);
        }
        Ok(Zeroizing::new(self.secret.to_vec()))
    }
}

impl std::fmt::Debug for PasswordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordStore")
            .field("set", &!self.secret.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_requires_a_password() {
        assert!(matches!(
            PasswordStore::empty().get(),
            Err(WalletError::PasswordRequired)
        ));
    }

    #[test]
    fn copies_are_independent() {
        let store = PasswordStore::new("hunter2");
        let copy = store.get().unwrap();
        assert_eq!(copy.as_slice(), b"hunter2");
        drop(copy);
        assert_eq!(store.get().unwrap().as_slice(), b"hunter2");
    }

    #[test]
    fn debug_does_not_leak() {
        let rendered = format!("{:?}", PasswordStore::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}

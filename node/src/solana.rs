//! # Solana Transaction Encoding
//!
//! The minimum of the Solana wire format needed to move SOL and one SPL
//! token: public keys, associated token account derivation, legacy message
//! compilation and single-signer transactions.
//!
//! ```text
//! Transaction = compact(sig count) ‖ signatures ‖ Message
//! Message     = header(3) ‖ compact(n) ‖ keys ‖ blockhash(32)
//!               ‖ compact(m) ‖ instructions
//! Instruction = program idx ‖ compact(k) ‖ account idxs ‖ compact(len) ‖ data
//! ```

use std::fmt;

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use cwt_wallet::config::PUBKEY_LENGTH;
use cwt_wallet::crypto::{parse_address, WalletKeypair};
use cwt_wallet::WalletError;

// ---------------------------------------------------------------------------
// Program Ids
// ---------------------------------------------------------------------------

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

/// Domain separator appended to every program-derived address preimage.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

const SYSTEM_TRANSFER: u32 = 2;
const TOKEN_TRANSFER_CHECKED: u8 = 12;
const ATA_CREATE: u8 = 0;

// ---------------------------------------------------------------------------
// Pubkey
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; PUBKEY_LENGTH]);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_base58(address: &str) -> Result<Self, WalletError> {
        parse_address(address).map(Self)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_LENGTH] {
        &self.0
    }

    /// `true` if the bytes decompress to a point on the ed25519 curve.
    /// Program-derived addresses are exactly the ones that do not.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }

    /// Hashes `seeds` under `program_id`. `None` when the result lands on
    /// the curve and so cannot be a program-derived address.
    pub fn create_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<Pubkey> {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update(program_id.as_bytes());
        hasher.update(PDA_MARKER);

        let candidate = Pubkey(hasher.finalize().into());
        (!candidate.is_on_curve()).then_some(candidate)
    }

    /// Searches bumps from 255 down for the first off-curve address.
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<(Pubkey, u8)> {
        (0..=u8::MAX).rev().find_map(|bump| {
            let bump_seed = [bump];
            let mut with_bump: Vec<&[u8]> = seeds.to_vec();
            with_bump.push(&bump_seed);
            Self::create_program_address(&with_bump, program_id).map(|address| (address, bump))
        })
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_base58())
    }
}

/// Well-known program id. The constants above are valid base58, so a
/// parse failure here is unreachable in practice and still reported.
fn program(id: &str) -> Result<Pubkey, WalletError> {
    Pubkey::from_base58(id)
}

/// Associated token account of `owner` for `mint`.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, WalletError> {
    let token_program = program(TOKEN_PROGRAM_ID)?;
    let ata_program = program(ASSOCIATED_TOKEN_PROGRAM_ID)?;

    Pubkey::find_program_address(
        &[owner.as_bytes(), token_program.as_bytes(), mint.as_bytes()],
        &ata_program,
    )
    .map(|(address, _)| address)
    .ok_or_else(|| WalletError::InvalidAddress {
        input: format!("no associated token account for {owner}"),
    })
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// System program `Transfer`.
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Result<Instruction, WalletError> {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Ok(Instruction {
        program_id: program(SYSTEM_PROGRAM_ID)?,
        accounts: vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        data,
    })
}

/// SPL Token `TransferChecked` between two token accounts.
pub fn token_transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, WalletError> {
    let mut data = Vec::with_capacity(10);
    data.push(TOKEN_TRANSFER_CHECKED);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Ok(Instruction {
        program_id: program(TOKEN_PROGRAM_ID)?,
        accounts: vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*authority, true),
        ],
        data,
    })
}

/// Associated Token Account program `Create`, funded by `payer`.
pub fn create_associated_token_account(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<Instruction, WalletError> {
    let address = associated_token_address(owner, mint)?;

    Ok(Instruction {
        program_id: program(ASSOCIATED_TOKEN_PROGRAM_ID)?,
        accounts: vec![
            AccountMeta::writable(*payer, true),
            AccountMeta::writable(address, false),
            AccountMeta::readonly(*owner, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::readonly(program(SYSTEM_PROGRAM_ID)?, false),
            AccountMeta::readonly(program(TOKEN_PROGRAM_ID)?, false),
        ],
        data: vec![ATA_CREATE],
    })
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// Legacy (pre-versioned) transaction message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compiles `instructions` into a message paid for by `payer`.
    ///
    /// Keys are deduplicated with their flags merged, then ordered writable
    /// signers, readonly signers, writable others, readonly others. The
    /// payer is always key 0.
    pub fn compile(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, WalletError> {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::writable(*payer, true)];
        for ix in instructions {
            let program_meta = AccountMeta::readonly(ix.program_id, false);
            for meta in ix.accounts.iter().chain(std::iter::once(&program_meta)) {
                match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                    Some(existing) => {
                        existing.is_signer |= meta.is_signer;
                        existing.is_writable |= meta.is_writable;
                    }
                    None => metas.push(*meta),
                }
            }
        }

        // Stable: the payer stays first among writable signers.
        metas.sort_by_key(|m| match (m.is_signer, m.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });

        let count = |pred: fn(&AccountMeta) -> bool| -> Result<u8, WalletError> {
            u8::try_from(metas.iter().filter(|m| pred(m)).count()).map_err(|_| too_many_accounts())
        };
        let header = MessageHeader {
            num_required_signatures: count(|m| m.is_signer)?,
            num_readonly_signed_accounts: count(|m| m.is_signer && !m.is_writable)?,
            num_readonly_unsigned_accounts: count(|m| !m.is_signer && !m.is_writable)?,
        };

        let account_keys: Vec<Pubkey> = metas.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Pubkey| -> Result<u8, WalletError> {
            account_keys
                .iter()
                .position(|k| k == key)
                .and_then(|i| u8::try_from(i).ok())
                .ok_or_else(too_many_accounts)
        };

        let instructions = instructions
            .iter()
            .map(|ix| -> Result<CompiledInstruction, WalletError> {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<Result<_, WalletError>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_compact_u16(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash);

        encode_compact_u16(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_compact_u16(&mut out, ix.accounts.len());
            out.extend_from_slice(&ix.accounts);
            encode_compact_u16(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }
        out
    }
}

fn too_many_accounts() -> WalletError {
    WalletError::InvalidAddress {
        input: "transaction references more than 256 accounts".into(),
    }
}

/// Solana "shortvec": 7 bits per byte, high bit set on all but the last.
pub fn encode_compact_u16(out: &mut Vec<u8>, len: usize) {
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

// ---------------------------------------------------------------------------
// Signed Transaction
// ---------------------------------------------------------------------------

/// A transaction signed by its only signer, ready for `sendTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub signature: [u8; 64],
    pub message: Message,
}

impl SignedTransaction {
    /// Signs `message` with `signer`, which must be its fee payer and only
    /// required signer.
    pub fn sign(message: Message, signer: &WalletKeypair) -> Result<Self, WalletError> {
        let payer = message.account_keys.first().copied();
        if message.header.num_required_signatures != 1
            || payer != Some(Pubkey(signer.public_key_bytes()))
        {
            return Err(WalletError::KeyMismatch);
        }

        let signature = signer.sign(&message.serialize());
        Ok(Self { signature, message })
    }

    /// Base58 signature, which is also the transaction id.
    pub fn id(&self) -> String {
        bs58::encode(self.signature).into_string()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 64 + 256);
        encode_compact_u16(&mut out, 1);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.message.serialize());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    fn key(byte: u8) -> Pubkey {
        Pubkey::new([byte; 32])
    }

    #[test]
    fn program_ids_parse() {
        assert_eq!(program(SYSTEM_PROGRAM_ID).unwrap(), Pubkey::new([0; 32]));
        assert!(program(TOKEN_PROGRAM_ID).is_ok());
        assert!(program(ASSOCIATED_TOKEN_PROGRAM_ID).is_ok());
    }

    #[test]
    fn compact_u16_boundaries() {
        let encode = |n| {
            let mut out = Vec::new();
            encode_compact_u16(&mut out, n);
            out
        };
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(0x7f), vec![0x7f]);
        assert_eq!(encode(0x80), vec![0x80, 0x01]);
        assert_eq!(encode(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encode(0x4000), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn associated_token_address_is_off_curve_and_stable() {
        let owner = Pubkey::new(WalletKeypair::generate().public_key_bytes());
        let mint = Pubkey::from_base58(cwt_wallet::config::USDC_MINT_MAINNET).unwrap();

        let a = associated_token_address(&owner, &mint).unwrap();
        let b = associated_token_address(&owner, &mint).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_on_curve());
        assert_ne!(a, owner);
    }

    #[test]
    fn program_address_matches_known_vectors() {
        let program_id = Pubkey::from_base58("BPFLoaderUpgradeab1e11111111111111111111111").unwrap();
        let seed_key = Pubkey::from_base58("SeedPubey1111111111111111111111111111111111").unwrap();

        let cases: [(&[&[u8]], &str); 4] = [
            (&[&b""[..], &[1]], "BwqrghZA2htAcqq8dzP1WDAhTXYTYWj7CHxF5j7TDBAe"),
            (&["\u{2609}".as_bytes(), &[0]], "13yWmRpaTR4r5nAktwLqMpRNr28tnVUZw26rTvPSSB19"),
            (&[&b"Talking"[..], &b"Squirrels"[..]], "2fnQrngrQT4SeLcdToJAD96phoEjNL2man2kfRLCASVk"),
            (&[&seed_key.as_bytes()[..], &[1]], "976ymqVnfE32QFe6NfGDctSvVa36LWnvYxhU6G2232YL"),
        ];
        for (seeds, expected) in cases {
            let address = Pubkey::create_program_address(seeds, &program_id).unwrap();
            assert_eq!(address.to_base58(), expected);
        }
    }

    #[test]
    fn usdc_associated_token_address_for_known_owner() {
        let owner = Pubkey::from_base58("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM").unwrap();
        let mint = Pubkey::from_base58(cwt_wallet::config::USDC_MINT_MAINNET).unwrap();

        let ata = associated_token_address(&owner, &mint).unwrap();
        assert_eq!(ata.to_base58(), "FGETo8T8wMcN2wCjav8VK6eh3dLk63evNDPxzLSJra8B");

        // Swapping owner and mint must land elsewhere.
        assert_ne!(associated_token_address(&mint, &owner).unwrap(), ata);
    }

    #[test]
    fn real_public_keys_are_on_curve() {
        let owner = Pubkey::new(WalletKeypair::generate().public_key_bytes());
        assert!(owner.is_on_curve());
    }

    #[test]
    fn system_transfer_layout() {
        let ix = system_transfer(&key(1), &key(2), 1_500_000_000).unwrap();
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(&ix.data[4..], &1_500_000_000u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
    }

    #[test]
    fn transfer_checked_layout() {
        let ix = token_transfer_checked(&key(1), &key(2), &key(3), &key(4), 10_500_000, 6).unwrap();
        assert_eq!(ix.data.len(), 10);
        assert_eq!(ix.data[0], 12);
        assert_eq!(&ix.data[1..9], &10_500_000u64.to_le_bytes());
        assert_eq!(ix.data[9], 6);
        assert!(ix.accounts[3].is_signer && !ix.accounts[3].is_writable);
    }

    #[test]
    fn compile_orders_and_dedups_keys() {
        let payer = key(9);
        let mint = key(7);
        let owner = key(5);
        let instructions = [
            create_associated_token_account(&payer, &owner, &mint).unwrap(),
            token_transfer_checked(&key(1), &mint, &key(3), &payer, 1, 6).unwrap(),
        ];

        let message = Message::compile(&instructions, &payer, [0xab; 32]).unwrap();

        assert_eq!(message.account_keys[0], payer);
        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.header.num_readonly_signed_accounts, 0);

        // Every key appears once.
        let mut sorted = message.account_keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), message.account_keys.len());

        // Readonly unsigned tail: owner, mint, system, token, ata programs.
        assert_eq!(message.header.num_readonly_unsigned_accounts, 5);
        let tail = &message.account_keys[message.account_keys.len() - 5..];
        assert!(tail.contains(&mint));
        assert!(tail.contains(&owner));
    }

    #[test]
    fn signed_transaction_verifies_and_serializes() {
        let keypair = WalletKeypair::generate();
        let payer = Pubkey::new(keypair.public_key_bytes());
        let ix = system_transfer(&payer, &key(2), 42).unwrap();
        let message = Message::compile(&[ix], &payer, [1; 32]).unwrap();

        let tx = SignedTransaction::sign(message.clone(), &keypair).unwrap();
        let wire = tx.serialize();

        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], &tx.signature);
        assert_eq!(&wire[65..], message.serialize().as_slice());

        let verifying = VerifyingKey::from_bytes(payer.as_bytes()).unwrap();
        let signature = Signature::from_bytes(&tx.signature);
        assert!(verifying.verify(&message.serialize(), &signature).is_ok());
        assert_eq!(bs58::decode(tx.id()).into_vec().unwrap(), tx.signature.to_vec());
    }

    #[test]
    fn signing_with_a_foreign_key_is_refused() {
        let payer = key(9);
        let ix = system_transfer(&payer, &key(2), 42).unwrap();
        let message = Message::compile(&[ix], &payer, [1; 32]).unwrap();

        assert!(matches!(
            SignedTransaction::sign(message, &WalletKeypair::generate()),
            Err(WalletError::KeyMismatch)
        ));
    }
}

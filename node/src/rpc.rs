//! # Solana JSON-RPC Client
//!
//! [`ChainClient`] over plain HTTP JSON-RPC. Reads use `confirmed`
//! commitment; blockhashes and preflight use `finalized`.
//!
//! Responses are decoded into small private structs and converted to the
//! wallet's [`RawTransaction`] here, so the reconciler never sees RPC
//! shapes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use cwt_wallet::config::{TOKEN_ACCOUNT_SIZE, USDC_DECIMALS};
use cwt_wallet::crypto::WalletKeypair;
use cwt_wallet::ledger::{RawTransaction, TokenBalance};
use cwt_wallet::{ChainClient, WalletError};

use crate::solana::{
    associated_token_address, create_associated_token_account, system_transfer,
    token_transfer_checked, Message, Pubkey, SignedTransaction,
};

const RPC_TIMEOUT: Duration = Duration::from_secs(30);
const COMMITMENT_READ: &str = "confirmed";
const COMMITMENT_FINAL: &str = "finalized";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// The node's way of saying the account has never been created.
    pub fn is_account_missing(&self) -> bool {
        match self {
            Self::Node { message, .. } => {
                message.contains("could not find account") || message.contains("not found")
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiTokenAmount {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct SignatureInfo {
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResult {
    slot: u64,
    block_time: Option<i64>,
    meta: Option<TransactionMeta>,
    transaction: EncodedTransaction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    err: Option<Value>,
    fee: u64,
    pre_balances: Vec<u64>,
    post_balances: Vec<u64>,
    #[serde(default)]
    pre_token_balances: Option<Vec<RpcTokenBalance>>,
    #[serde(default)]
    post_token_balances: Option<Vec<RpcTokenBalance>>,
    #[serde(default)]
    loaded_addresses: Option<LoadedAddresses>,
}

#[derive(Debug, Default, Deserialize)]
struct LoadedAddresses {
    #[serde(default)]
    writable: Vec<String>,
    #[serde(default)]
    readonly: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenBalance {
    mint: String,
    owner: Option<String>,
    ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
struct EncodedTransaction {
    message: EncodedMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedMessage {
    account_keys: Vec<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// JSON-RPC client bound to one token mint.
pub struct SolanaRpcClient {
    http: reqwest::Client,
    url: String,
    mint: Pubkey,
    decimals: u8,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    pub fn new(url: impl Into<String>, mint: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(RPC_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
            mint: Pubkey::from_base58(mint)?,
            decimals: USDC_DECIMALS as u8,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        debug!(method, id, "rpc call");
        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_response(response)
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<Option<u64>, RpcError> {
        let result: Result<WithContext<UiTokenAmount>, _> = self
            .call(
                "getTokenAccountBalance",
                json!([account.to_base58(), { "commitment": COMMITMENT_READ }]),
            )
            .await;

        match result {
            Ok(balance) => parse_amount(&balance.value.amount).map(Some),
            Err(e) if e.is_account_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn account_exists(&self, account: &Pubkey) -> Result<bool, RpcError> {
        let result: Result<WithContext<Option<Value>>, _> = self
            .call(
                "getAccountInfo",
                json!([account.to_base58(), { "encoding": "base64", "commitment": COMMITMENT_READ }]),
            )
            .await;

        match result {
            Ok(info) => Ok(info.value.is_some()),
            Err(e) if e.is_account_missing() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        let latest: WithContext<LatestBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": COMMITMENT_FINAL }]),
            )
            .await?;

        let bytes = bs58::decode(&latest.value.blockhash)
            .into_vec()
            .map_err(|e| RpcError::Malformed(format!("blockhash: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| RpcError::Malformed("blockhash is not 32 bytes".into()))
    }

    async fn send(&self, tx: &SignedTransaction) -> Result<String, RpcError> {
        let encoded = BASE64.encode(tx.serialize());
        let signature: String = self
            .call(
                "sendTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": COMMITMENT_FINAL,
                }]),
            )
            .await?;

        if signature != tx.id() {
            warn!(returned = %signature, computed = %tx.id(), "node returned an unexpected signature");
        }
        Ok(signature)
    }

    async fn sign_and_send(
        &self,
        keypair: &WalletKeypair,
        instructions: &[crate::solana::Instruction],
    ) -> Result<String, WalletError> {
        let payer = Pubkey::new(keypair.public_key_bytes());
        let blockhash = self
            .latest_blockhash()
            .await
            .map_err(|e| WalletError::upstream("failed to get recent blockhash", e))?;

        let message = Message::compile(instructions, &payer, blockhash)?;
        let tx = SignedTransaction::sign(message, keypair)?;

        self.send(&tx)
            .await
            .map_err(|e| WalletError::upstream("failed to send transaction", e))
    }
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
    async fn native_balance(&self, address: &str) -> Result<u64, WalletError> {
        let balance: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address, { "commitment": COMMITMENT_READ }]),
            )
            .await
            .map_err(|e| WalletError::upstream("failed to get SOL balance", e))?;
        Ok(balance.value)
    }

    async fn token_balance(&self, owner: &str) -> Result<Option<u64>, WalletError> {
        let account = associated_token_address(&Pubkey::from_base58(owner)?, &self.mint)?;
        self.token_account_balance(&account)
            .await
            .map_err(|e| WalletError::upstream("failed to get token account balance", e))
    }

    fn token_account_of(&self, owner: &str) -> Result<String, WalletError> {
        associated_token_address(&Pubkey::from_base58(owner)?, &self.mint).map(|a| a.to_base58())
    }

    async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, WalletError> {
        let infos: Vec<SignatureInfo> = self
            .call(
                "getSignaturesForAddress",
                json!([address, { "limit": limit, "commitment": COMMITMENT_READ }]),
            )
            .await
            .map_err(|e| WalletError::upstream("failed to get signatures", e))?;
        Ok(infos.into_iter().map(|i| i.signature).collect())
    }

    async fn transaction(&self, signature: &str) -> Result<RawTransaction, WalletError> {
        // A `null` result (unknown or pruned signature) surfaces as Malformed.
        let result: TransactionResult = self
            .call(
                "getTransaction",
                json!([signature, {
                    "encoding": "json",
                    "commitment": COMMITMENT_READ,
                    "maxSupportedTransactionVersion": 0,
                }]),
            )
            .await
            .map_err(|e| WalletError::upstream("failed to get transaction", e))?;

        to_raw_transaction(signature, result)
            .map_err(|e| WalletError::upstream("failed to decode transaction", e))
    }

    async fn token_account_rent_exempt_minimum(&self) -> Result<u64, WalletError> {
        self.call(
            "getMinimumBalanceForRentExemption",
            json!([TOKEN_ACCOUNT_SIZE, { "commitment": COMMITMENT_FINAL }]),
        )
        .await
        .map_err(|e| WalletError::upstream("failed to get rent exempt minimum", e))
    }

    async fn submit_native_transfer(
        &self,
        from: &WalletKeypair,
        to: &str,
        lamports: u64,
    ) -> Result<String, WalletError> {
        let payer = Pubkey::new(from.public_key_bytes());
        let ix = system_transfer(&payer, &Pubkey::from_base58(to)?, lamports)?;
        self.sign_and_send(from, &[ix]).await
    }

    async fn submit_token_transfer(
        &self,
        from: &WalletKeypair,
        to: &str,
        amount: u64,
    ) -> Result<String, WalletError> {
        let owner = Pubkey::new(from.public_key_bytes());
        let recipient = Pubkey::from_base58(to)?;
        let source = associated_token_address(&owner, &self.mint)?;
        let destination = associated_token_address(&recipient, &self.mint)?;

        let mut instructions = Vec::with_capacity(2);
        let exists = self
            .account_exists(&destination)
            .await
            .map_err(|e| WalletError::upstream("failed to get destination account info", e))?;
        if !exists {
            debug!(destination = %destination, "creating destination token account");
            instructions.push(create_associated_token_account(&owner, &recipient, &self.mint)?);
        }
        instructions.push(token_transfer_checked(
            &source,
            &self.mint,
            &destination,
            &owner,
            amount,
            self.decimals,
        )?);

        self.sign_and_send(from, &instructions).await
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode_response<T>(response: RpcResponse<T>) -> Result<T, RpcError> {
    match (response.result, response.error) {
        (_, Some(err)) => Err(RpcError::Node {
            code: err.code,
            message: err.message,
        }),
        (Some(result), None) => Ok(result),
        (None, None) => Err(RpcError::Malformed("neither result nor error".into())),
    }
}

fn parse_amount(amount: &str) -> Result<u64, RpcError> {
    amount
        .parse()
        .map_err(|_| RpcError::Malformed(format!("token amount '{amount}'")))
}

fn to_raw_transaction(signature: &str, result: TransactionResult) -> Result<RawTransaction, RpcError> {
    let meta = result
        .meta
        .ok_or_else(|| RpcError::Malformed("transaction has no meta".into()))?;

    // v0 transactions list lookup-table accounts after the static keys.
    let mut account_keys = result.transaction.message.account_keys;
    if let Some(loaded) = meta.loaded_addresses {
        account_keys.extend(loaded.writable);
        account_keys.extend(loaded.readonly);
    }

    let convert = |rows: Option<Vec<RpcTokenBalance>>| -> Result<Vec<TokenBalance>, RpcError> {
        rows.unwrap_or_default()
            .into_iter()
            .map(|row| {
                Ok(TokenBalance {
                    owner: row.owner,
                    mint: row.mint,
                    amount: parse_amount(&row.ui_token_amount.amount)?,
                })
            })
            .collect()
    };

    Ok(RawTransaction {
        signature: signature.to_string(),
        account_keys,
        pre_balances: meta.pre_balances,
        post_balances: meta.post_balances,
        pre_token_balances: convert(meta.pre_token_balances)?,
        post_token_balances: convert(meta.post_token_balances)?,
        fee: meta.fee,
        block_time: result.block_time,
        slot: result.slot,
        succeeded: meta.err.is_none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: DeserializeOwned>(body: Value) -> Result<T, RpcError> {
        decode_response(serde_json::from_value::<RpcResponse<T>>(body).unwrap())
    }

    #[test]
    fn missing_account_is_recognized() {
        let err = decode::<WithContext<UiTokenAmount>>(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid param: could not find account" }
        }))
        .unwrap_err();
        assert!(err.is_account_missing());

        let other = RpcError::Node {
            code: -32005,
            message: "Node is behind by 42 slots".into(),
        };
        assert!(!other.is_account_missing());
    }

    #[test]
    fn balance_with_context_decodes() {
        let balance: WithContext<u64> = decode(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "context": { "slot": 1 }, "value": 1_500_000_000u64 }
        }))
        .unwrap();
        assert_eq!(balance.value, 1_500_000_000);
    }

    #[test]
    fn transaction_converts_to_raw_snapshot() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "slot": 250_000_000u64,
                "blockTime": 1_700_000_000i64,
                "meta": {
                    "err": null,
                    "fee": 5000,
                    "preBalances": [1_000_000_000u64, 2_039_280, 2_039_280, 1],
                    "postBalances": [999_995_000u64, 2_039_280, 2_039_280, 1],
                    "preTokenBalances": [
                        { "accountIndex": 1, "mint": "MINT", "owner": "OWNER",
                          "uiTokenAmount": { "amount": "10000000", "decimals": 6 } },
                        { "accountIndex": 2, "mint": "MINT", "owner": "PEER",
                          "uiTokenAmount": { "amount": "0", "decimals": 6 } }
                    ],
                    "postTokenBalances": [
                        { "accountIndex": 1, "mint": "MINT", "owner": "OWNER",
                          "uiTokenAmount": { "amount": "7500000", "decimals": 6 } },
                        { "accountIndex": 2, "mint": "MINT", "owner": "PEER",
                          "uiTokenAmount": { "amount": "2500000", "decimals": 6 } }
                    ],
                    "loadedAddresses": { "writable": ["LUT_W"], "readonly": [] }
                },
                "transaction": {
                    "signatures": ["SIG"],
                    "message": { "accountKeys": ["OWNER", "ATA_OWNER", "ATA_PEER", "TOKEN"] }
                }
            }
        });

        let result: TransactionResult = decode(body).unwrap();
        let raw = to_raw_transaction("SIG", result).unwrap();

        assert_eq!(raw.account_keys.last().map(String::as_str), Some("LUT_W"));
        assert_eq!(raw.fee, 5000);
        assert_eq!(raw.block_time, Some(1_700_000_000));
        assert!(raw.succeeded);
        assert_eq!(raw.pre_token_balances[0].amount, 10_000_000);
        assert_eq!(raw.post_token_balances[1].owner.as_deref(), Some("PEER"));
    }

    #[test]
    fn failed_transaction_is_flagged() {
        let result: TransactionResult = decode(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "slot": 1,
                "blockTime": null,
                "meta": {
                    "err": { "InstructionError": [0, "Custom"] },
                    "fee": 5000,
                    "preBalances": [10_000u64],
                    "postBalances": [5_000u64]
                },
                "transaction": { "message": { "accountKeys": ["OWNER"] } }
            }
        }))
        .unwrap();

        let raw = to_raw_transaction("SIG", result).unwrap();
        assert!(!raw.succeeded);
        assert!(raw.block_time.is_none());
        assert!(raw.pre_token_balances.is_empty());
    }

    #[test]
    fn null_transaction_result_is_malformed() {
        let err = decode::<TransactionResult>(json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
        assert!(matches!(err, Err(RpcError::Malformed(_))));
    }

    #[test]
    fn token_account_is_derived_locally() {
        let client = SolanaRpcClient::new(
            "http://127.0.0.1:1",
            cwt_wallet::config::USDC_MINT_MAINNET,
        )
        .unwrap();
        let owner = WalletKeypair::generate().address();

        let ata = client.token_account_of(&owner).unwrap();
        assert_ne!(ata, owner);
        assert!(matches!(
            client.token_account_of("not-base58!"),
            Err(WalletError::InvalidAddress { .. })
        ));
    }
}

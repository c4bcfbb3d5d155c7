//! Signing orchestration: unlock, sign, submit, and optionally wait.
//!
//! The lifecycle is carried by types rather than flags:
//!
//! * [`UnsignedTransaction`] is a built transaction,
//! * [`UnlockSession`] proves a node-side unlock succeeded,
//! * [`SignedTransaction`] is the immutable signed payload,
//! * [`PendingTransaction`] is a submitted one,
//! * [`TxOutcome`] is the receipt verdict.
//!
//! Signing consumes the `UnsignedTransaction`, so re-signing means building a
//! new one. Submission borrows the `SignedTransaction`, so a failed broadcast
//! can be retried with the exact same bytes.
//!
//! Local signatures are deterministic: nonces follow RFC 6979 (HMAC-SHA256)
//! and `s` is normalized to the lower half of the curve order.

use crate::{
    codec::encode_hex,
    error::{ClientError, Result},
    models::transaction::{NodeSignedTransaction, TransactionReceipt, UnsignedTransaction},
    personal::PersonalApi,
    rpc::RpcClient,
};
use alloy_consensus::{SignableTransaction, TxEnvelope};
use alloy_eips::eip2718::{Decodable2718, Encodable2718};
use alloy_primitives::{keccak256, Address, Bytes, PrimitiveSignature as Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Where signatures come from, fixed when the orchestrator is built
#[derive(Debug, Clone)]
pub enum SigningMode {
    /// The node's keystore holds the key for this account
    NodeManaged(Address),
    /// The key is held in process
    LocalKey(PrivateKeySigner),
}

impl SigningMode {
    /// Account this mode signs for
    pub fn account(&self) -> Address {
        match self {
            SigningMode::NodeManaged(account) => *account,
            SigningMode::LocalKey(signer) => signer.address(),
        }
    }
}

/// Proof that an account was unlocked, valid until `expires_at`
#[derive(Debug, Clone)]
pub struct UnlockSession {
    account: Address,
    /// `None` when the duration runs past what the clock can represent
    expires_at: Option<Instant>,
}

impl UnlockSession {
    pub fn account(&self) -> Address {
        self.account
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.expires_at.map_or(true, |expires_at| Instant::now() < expires_at)
    }
}

/// How a node-managed account authorizes a signature
#[derive(Debug, Clone, Copy)]
pub enum Authorization<'a> {
    /// Decrypt the key for this one operation
    Passphrase(&'a str),
    /// Use the account as unlocked by an earlier [`SigningOrchestrator::unlock`]
    Session(&'a UnlockSession),
}

/// Signed EIP-2718 transaction envelope
///
/// Immutable once created: the bytes, the hash and the recovered signer are
/// fixed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    raw: Bytes,
    hash: B256,
    signer: Address,
}

impl SignedTransaction {
    /// Decode a node-signed envelope and check it was signed by `expected`
    pub fn from_node(raw: Vec<u8>, expected: Address) -> Result<Self> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_slice()).map_err(|e| {
            ClientError::signing(expected, format!("node returned an undecodable transaction: {e}"))
        })?;
        let signer = envelope.recover_signer().map_err(|e| {
            ClientError::signing(expected, format!("node signature does not recover: {e}"))
        })?;
        if signer != expected {
            return Err(ClientError::signing(
                expected,
                format!("node signed with {signer}"),
            ));
        }
        Ok(Self {
            hash: keccak256(&raw),
            raw: raw.into(),
            signer,
        })
    }

    fn from_envelope(envelope: &TxEnvelope, signer: Address) -> Self {
        let raw = envelope.encoded_2718();
        Self {
            hash: keccak256(&raw),
            raw: raw.into(),
            signer,
        }
    }

    /// EIP-2718 bytes as broadcast
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Transaction hash (keccak256 of the raw envelope)
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Address that signed the transaction
    pub fn signer(&self) -> Address {
        self.signer
    }

    /// `0x`-prefixed hex of the raw envelope
    pub fn to_hex(&self) -> String {
        encode_hex(&self.raw)
    }
}

/// A transaction the node accepted into its pool
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    hash: B256,
    signed: SignedTransaction,
}

impl PendingTransaction {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Payload that was submitted, for resubmission
    pub fn signed(&self) -> &SignedTransaction {
        &self.signed
    }
}

/// Final state of a mined transaction
#[derive(Debug, Clone)]
pub enum TxOutcome {
    Confirmed(TransactionReceipt),
    Failed(TransactionReceipt),
}

/// Drives a transaction from built to signed to submitted
pub struct SigningOrchestrator {
    client: RpcClient,
    personal: PersonalApi,
    mode: SigningMode,
}

impl SigningOrchestrator {
    pub fn new(client: RpcClient, mode: SigningMode) -> Self {
        Self {
            personal: PersonalApi::new(client.clone()),
            client,
            mode,
        }
    }

    /// Account every signature is produced for
    pub fn account(&self) -> Address {
        self.mode.account()
    }

    pub fn mode(&self) -> &SigningMode {
        &self.mode
    }

    /// Unlock the account for `duration`
    ///
    /// A local key is always usable, so the session is granted without a
    /// round trip. A node refusal or RPC failure becomes
    /// [`ClientError::Unlock`]; the caller's transaction is untouched.
    #[instrument(skip(self, passphrase), fields(account = %self.account()), err)]
    pub async fn unlock(&self, passphrase: &str, duration: Duration) -> Result<UnlockSession> {
        let account = self.account();
        if let SigningMode::NodeManaged(_) = self.mode {
            let unlocked = self
                .personal
                .unlock_account(account, passphrase, duration)
                .await
                .map_err(|e| ClientError::Unlock {
                    account,
                    source: Box::new(e),
                })?;
            if !unlocked {
                return Err(ClientError::Unlock {
                    account,
                    source: Box::new(ClientError::unexpected(
                        "personal_unlockAccount",
                        "node refused to unlock",
                    )),
                });
            }
        }
        info!(secs = duration.as_secs(), "account unlocked");
        Ok(UnlockSession {
            account,
            expires_at: Instant::now().checked_add(duration),
        })
    }

    /// Lock the account again; a no-op for local keys
    pub async fn lock(&self) -> Result<bool> {
        match self.mode {
            SigningMode::NodeManaged(account) => self.personal.lock_account(account).await,
            SigningMode::LocalKey(_) => Ok(true),
        }
    }

    /// Sign `message` with the EIP-191 personal-message prefix
    #[instrument(skip(self, message, auth), fields(account = %self.account()), err)]
    pub async fn sign_message(&self, message: &[u8], auth: Authorization<'_>) -> Result<Signature> {
        let account = self.account();
        match &self.mode {
            SigningMode::LocalKey(signer) => signer
                .sign_message_sync(message)
                .map_err(|e| ClientError::signing(account, e.to_string())),
            SigningMode::NodeManaged(_) => match auth {
                Authorization::Passphrase(passphrase) => self
                    .personal
                    .sign(message, account, passphrase)
                    .await
                    .map_err(|e| node_signing_error(account, e)),
                Authorization::Session(session) => {
                    self.check_session(session)?;
                    let method = "eth_sign";
                    let signature: String = self
                        .client
                        .call(method, json!([account.to_checksum(None), encode_hex(message)]))
                        .await
                        .map_err(|e| node_signing_error(account, e))?;
                    crate::codec::decode_signature(&signature)
                        .map_err(|e| node_signing_error(account, e))
                }
            },
        }
    }

    /// Sign `tx`, consuming it
    ///
    /// `tx.from` must be the orchestrator's account. Local keys ignore `auth`;
    /// node-managed accounts use the passphrase or an active session.
    #[instrument(skip(self, tx, auth), fields(from = %tx.from, nonce = tx.nonce), err)]
    pub async fn sign_transaction(
        &self,
        tx: UnsignedTransaction,
        auth: Authorization<'_>,
    ) -> Result<SignedTransaction> {
        let account = self.account();
        if tx.from != account {
            return Err(ClientError::signing(
                account,
                format!("transaction is from {}", tx.from),
            ));
        }

        let signed = match &self.mode {
            SigningMode::LocalKey(signer) => sign_locally(signer, &tx)?,
            SigningMode::NodeManaged(_) => match auth {
                Authorization::Passphrase(passphrase) => self
                    .personal
                    .sign_transaction(&tx, passphrase)
                    .await
                    .map_err(|e| node_signing_error(account, e))?,
                Authorization::Session(session) => {
                    self.check_session(session)?;
                    let method = "eth_signTransaction";
                    let signed: NodeSignedTransaction = self
                        .client
                        .call(method, json!([tx.to_rpc()]))
                        .await
                        .map_err(|e| node_signing_error(account, e))?;
                    let raw = crate::codec::decode_hex(signed.raw())
                        .map_err(|e| node_signing_error(account, e))?;
                    SignedTransaction::from_node(raw, account)?
                }
            },
        };
        debug!(hash = %signed.hash(), "transaction signed");
        Ok(signed)
    }

    /// Broadcast `signed`
    ///
    /// On failure the same payload can be submitted again; it is never
    /// re-signed here.
    #[instrument(skip(self, signed), fields(hash = %signed.hash()), err)]
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<PendingTransaction> {
        let hash = signed.hash();
        let node_hash: B256 = self
            .client
            .call("eth_sendRawTransaction", json!([signed.to_hex()]))
            .await
            .map_err(|e| {
                error!(error = %e, "submission failed");
                ClientError::Submission {
                    hash,
                    source: Box::new(e),
                }
            })?;
        if node_hash != hash {
            warn!(%node_hash, "node reported a different transaction hash");
        }
        info!(hash = %node_hash, "transaction submitted");
        Ok(PendingTransaction {
            hash: node_hash,
            signed: signed.clone(),
        })
    }

    /// Sign `tx` and broadcast it
    pub async fn sign_and_submit(
        &self,
        tx: UnsignedTransaction,
        auth: Authorization<'_>,
    ) -> Result<PendingTransaction> {
        let signed = self.sign_transaction(tx, auth).await?;
        self.submit(&signed).await
    }

    /// Poll for the receipt of `pending` every `interval` until `deadline`
    #[instrument(skip(self, pending), fields(hash = %pending.hash()), err)]
    pub async fn wait_for_receipt(
        &self,
        pending: &PendingTransaction,
        interval: Duration,
        deadline: Duration,
    ) -> Result<TxOutcome> {
        let started = Instant::now();
        loop {
            let receipt: Option<TransactionReceipt> = self
                .client
                .call("eth_getTransactionReceipt", json!([pending.hash()]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(if receipt.succeeded() {
                    info!("transaction confirmed");
                    TxOutcome::Confirmed(receipt)
                } else {
                    warn!("transaction reverted");
                    TxOutcome::Failed(receipt)
                });
            }
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(ClientError::Unconfirmed {
                    hash: pending.hash(),
                    elapsed,
                });
            }
            tokio::time::sleep(interval.min(deadline - elapsed)).await;
        }
    }

    fn check_session(&self, session: &UnlockSession) -> Result<()> {
        let account = self.account();
        if session.account() != account {
            return Err(ClientError::signing(
                account,
                format!("unlock session belongs to {}", session.account()),
            ));
        }
        if !session.is_active() {
            return Err(ClientError::signing(account, "unlock session expired"));
        }
        Ok(())
    }
}

/// Sign an EIP-1559 transaction with an in-process key
pub fn sign_locally(
    signer: &PrivateKeySigner,
    tx: &UnsignedTransaction,
) -> Result<SignedTransaction> {
    let account = signer.address();
    let tx = tx.to_eip1559();
    let signature = signer
        .sign_hash_sync(&tx.signature_hash())
        .map_err(|e| ClientError::signing(account, e.to_string()))?;
    let envelope = TxEnvelope::from(tx.into_signed(signature));
    Ok(SignedTransaction::from_envelope(&envelope, account))
}

fn node_signing_error(account: Address, source: ClientError) -> ClientError {
    ClientError::Signing {
        account,
        reason: "node rejected the signing request".to_string(),
        source: Some(Box::new(source)),
    }
}

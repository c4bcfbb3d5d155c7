use crate::{
    codec::{
        decode_address, decode_hex, decode_signature, encode_hex, encode_signature,
        normalize_private_key,
    },
    error::{ClientError, Result},
    models::transaction::{NodeSignedTransaction, UnsignedTransaction},
    rpc::RpcClient,
    signer::SignedTransaction,
};
use alloy_primitives::{hex, Address, PrimitiveSignature as Signature, B256};
use alloy_signer_local::PrivateKeySigner;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Typed access to the node's `personal_*` namespace
///
/// Every key these methods touch lives in the node's keystore; passphrases
/// travel to the node and are redacted from error context.
#[derive(Clone)]
pub struct PersonalApi {
    client: RpcClient,
}

impl PersonalApi {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Generate a new key in the node's keystore, encrypted with `passphrase`
    #[instrument(skip_all, err)]
    pub async fn new_account(&self, passphrase: &str) -> Result<Address> {
        let method = "personal_newAccount";
        let address: String = self.client.call(method, json!([passphrase])).await?;
        let address = address_result(method, &address)?;
        info!(%address, "account created");
        Ok(address)
    }

    /// Addresses of every key in the node's keystore
    #[instrument(skip(self), err)]
    pub async fn get_accounts(&self) -> Result<Vec<Address>> {
        let method = "personal_listAccounts";
        let accounts: Vec<String> = self.client.call(method, json!([])).await?;
        accounts
            .iter()
            .map(|account| address_result(method, account))
            .collect()
    }

    /// Lock `address`, dropping its decrypted key from node memory
    #[instrument(skip(self), err)]
    pub async fn lock_account(&self, address: Address) -> Result<bool> {
        self.client
            .call("personal_lockAccount", json!([address.to_checksum(None)]))
            .await
    }

    /// Unlock `address` for `duration`
    ///
    /// Returns the node's verdict. A wrong passphrase is reported by the node
    /// as an RPC error rather than `false`.
    #[instrument(skip(self, passphrase), err)]
    pub async fn unlock_account(
        &self,
        address: Address,
        passphrase: &str,
        duration: Duration,
    ) -> Result<bool> {
        self.client
            .call(
                "personal_unlockAccount",
                json!([address.to_checksum(None), passphrase, duration.as_secs()]),
            )
            .await
    }

    /// Sign `message` with the EIP-191 personal-message prefix
    #[instrument(skip(self, message, passphrase), err)]
    pub async fn sign(
        &self,
        message: &[u8],
        address: Address,
        passphrase: &str,
    ) -> Result<Signature> {
        let method = "personal_sign";
        let signature: String = self
            .client
            .call(
                method,
                json!([encode_hex(message), address.to_checksum(None), passphrase]),
            )
            .await?;
        decode_signature(&signature).map_err(|e| ClientError::unexpected(method, e.to_string()))
    }

    /// Ask the node which address produced `signature` over `message`
    ///
    /// geth answers in lower case; compare addresses, not strings.
    #[instrument(skip(self, message, signature), err)]
    pub async fn ec_recover(&self, message: &[u8], signature: &Signature) -> Result<Address> {
        let method = "personal_ecRecover";
        let address: String = self
            .client
            .call(method, json!([encode_hex(message), encode_signature(signature)]))
            .await?;
        address_result(method, &address)
    }

    /// Import a raw secp256k1 key into the node's keystore
    ///
    /// The key may carry a `0x` prefix or not; it is sent in the unprefixed
    /// form geth expects. The address the node reports must match the one
    /// derived locally from the key.
    #[instrument(skip_all, err)]
    pub async fn import_raw_key(&self, key: &str, passphrase: &str) -> Result<Address> {
        let method = "personal_importRawKey";
        let key = normalize_private_key(key)?;
        let expected = derive_address(&key)?;

        let address: String = self
            .client
            .call(method, json!([hex::encode(key), passphrase]))
            .await?;
        let address = address_result(method, &address)?;
        if address != expected {
            return Err(ClientError::unexpected(
                method,
                format!("node imported {address}, key derives {expected}"),
            ));
        }
        info!(%address, "raw key imported");
        Ok(address)
    }

    /// Have the node sign `tx` with the keystore key of `tx.from`
    #[instrument(skip(self, tx, passphrase), fields(from = %tx.from, nonce = tx.nonce), err)]
    pub async fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
        passphrase: &str,
    ) -> Result<SignedTransaction> {
        let method = "personal_signTransaction";
        let signed: NodeSignedTransaction = self
            .client
            .call(method, json!([tx.to_rpc(), passphrase]))
            .await?;
        let raw = decode_hex(signed.raw())
            .map_err(|e| ClientError::unexpected(method, e.to_string()))?;
        SignedTransaction::from_node(raw, tx.from)
    }

    /// Have the node sign and broadcast `tx` in one step
    ///
    /// The node assigns the nonce when the caller left it to the builder's
    /// lookup; either way the node's hash is returned.
    #[instrument(skip(self, tx, passphrase), fields(from = %tx.from), err)]
    pub async fn send_transaction(
        &self,
        tx: &UnsignedTransaction,
        passphrase: &str,
    ) -> Result<B256> {
        let method = "personal_sendTransaction";
        let hash: B256 = self
            .client
            .call(method, json!([tx.to_rpc(), passphrase]))
            .await?;
        debug!(%hash, "transaction sent by node");
        Ok(hash)
    }
}

/// Address a raw private key controls
pub fn derive_address(key: &B256) -> Result<Address> {
    PrivateKeySigner::from_bytes(key)
        .map(|signer| signer.address())
        .map_err(|e| ClientError::invalid_field("privateKey", e.to_string()))
}

fn address_result(method: &str, address: &str) -> Result<Address> {
    decode_address(address).map_err(|e| ClientError::unexpected(method, e.to_string()))
}

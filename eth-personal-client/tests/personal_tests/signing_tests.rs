//! Message and transaction signing, node-side and in process

use crate::{helpers::*, init_logger};
use alloy_primitives::{hex, Address, Bytes, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use eth_personal_client::{
    codec::{decode_signature, encode_signature},
    models::transaction::UnsignedTransaction,
    Authorization, ClientError, PersonalApi, SigningMode, SigningOrchestrator,
};
use std::time::Duration;

const DEADBEAF_SIGNATURE: &str = "0x791703250f789557b30c2ed9066cdc9bfcfba4504583d417b61f07891c\
    4c9ace5fa84cb97062712e6e614c29ad59c610e310123efdb40bd7a9c516ace2084cd01c";
const SIGNED_TRANSFER: &str = "0x02f86e82053980841dcd65008459682f00825208\
    9470997970c51812dc3a010c7d01b50e0d17dc79c882271080c080\
    a05b9e25130d38eb27bf155cf3bc7649055ae42c066e5d6a572cc1c2163466b07a\
    a03e3d6146d031e57e08885fc7e9a7ffcdfc3885048441f3aba888827c47bd3ef0";
const TRANSFER_HASH: &str = "0xc0e1ec3a95268e18f9fa5c1ad3f2a8b99ee472927f0166593b76353d921b4043";

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

fn transfer() -> UnsignedTransaction {
    UnsignedTransaction {
        chain_id: CHAIN_ID,
        nonce: 0,
        from: addr(DEV_ACCOUNTS[0]),
        to: Some(addr(DEV_ACCOUNTS[1])),
        value: U256::from(10_000u64),
        gas: 21_000,
        max_fee_per_gas: 0x59682F00,
        max_priority_fee_per_gas: 0x1DCD6500,
        input: Bytes::new(),
    }
}

#[tokio::test]
async fn test_personal_sign_and_recover() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);
    let message = hex::decode("deadbeaf").unwrap();

    let signature = personal
        .sign(&message, addr(DEV_ACCOUNTS[0]), "")
        .await
        .unwrap();
    assert_eq!(encode_signature(&signature), DEADBEAF_SIGNATURE);

    let recovered = personal.ec_recover(&message, &signature).await.unwrap();
    assert_eq!(recovered, addr(DEV_ACCOUNTS[0]));
}

#[tokio::test]
async fn test_local_key_signature_matches_node() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let signer: PrivateKeySigner = DEV_KEYS[0].parse().unwrap();
    let orchestrator = SigningOrchestrator::new(client, SigningMode::LocalKey(signer));

    let signature = orchestrator
        .sign_message(&hex::decode("deadbeaf").unwrap(), Authorization::Passphrase(""))
        .await
        .unwrap();
    assert_eq!(signature, decode_signature(DEADBEAF_SIGNATURE).unwrap());
}

#[tokio::test]
async fn test_unlock_then_sign_without_passphrase() {
    init_logger();
    let (node, client) = DevNode::spawn();
    let orchestrator =
        SigningOrchestrator::new(client, SigningMode::NodeManaged(addr(DEV_ACCOUNTS[0])));

    let session = orchestrator
        .unlock("", Duration::from_secs(10_000))
        .await
        .unwrap();
    assert!(session.is_active());

    let message = hex::decode("deadbeaf").unwrap();
    let first = orchestrator
        .sign_message(&message, Authorization::Session(&session))
        .await
        .unwrap();
    let second = orchestrator
        .sign_message(&message, Authorization::Session(&session))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(encode_signature(&first), DEADBEAF_SIGNATURE);

    assert_eq!(
        node.methods(),
        vec!["personal_unlockAccount", "eth_sign", "eth_sign"]
    );
}

#[tokio::test]
async fn test_unlock_with_wrong_passphrase_fails() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let orchestrator =
        SigningOrchestrator::new(client, SigningMode::NodeManaged(addr(DEV_ACCOUNTS[2])));

    let err = orchestrator
        .unlock("not it", Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Unlock { .. }));
    assert_eq!(err.rpc_code(), Some(-32000));
}

#[tokio::test]
async fn test_expired_session_is_refused_locally() {
    init_logger();
    let (node, client) = DevNode::spawn();
    let orchestrator =
        SigningOrchestrator::new(client, SigningMode::NodeManaged(addr(DEV_ACCOUNTS[0])));

    let session = orchestrator.unlock("", Duration::ZERO).await.unwrap();
    let err = orchestrator
        .sign_transaction(transfer(), Authorization::Session(&session))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Signing { .. }));
    assert!(!node.methods().contains(&"eth_signTransaction".to_string()));
}

#[tokio::test]
async fn test_node_signed_transaction_is_bit_exact() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let signed = personal.sign_transaction(&transfer(), "").await.unwrap();
    assert_eq!(signed.to_hex(), SIGNED_TRANSFER);
    assert_eq!(signed.hash(), TRANSFER_HASH.parse::<B256>().unwrap());
    assert_eq!(signed.signer(), addr(DEV_ACCOUNTS[0]));
}

#[tokio::test]
async fn test_node_and_local_signing_agree() {
    init_logger();
    let (_node, client) = DevNode::spawn();

    let node_managed =
        SigningOrchestrator::new(client.clone(), SigningMode::NodeManaged(addr(DEV_ACCOUNTS[0])));
    let session = node_managed
        .unlock("", Duration::from_secs(10_000))
        .await
        .unwrap();
    let by_node = node_managed
        .sign_transaction(transfer(), Authorization::Session(&session))
        .await
        .unwrap();

    let local = SigningOrchestrator::new(
        client,
        SigningMode::LocalKey(DEV_KEYS[0].parse().unwrap()),
    );
    let by_key = local
        .sign_transaction(transfer(), Authorization::Passphrase(""))
        .await
        .unwrap();

    assert_eq!(by_node.raw(), by_key.raw());
    assert_eq!(by_key.to_hex(), SIGNED_TRANSFER);
}

#[tokio::test]
async fn test_personal_send_transaction_returns_hash() {
    init_logger();
    let (node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let hash = personal.send_transaction(&transfer(), "").await.unwrap();
    assert_eq!(hash, TRANSFER_HASH.parse::<B256>().unwrap());
    assert_eq!(node.nonce_of(addr(DEV_ACCOUNTS[0])), 1);
}

#[tokio::test]
async fn test_signing_for_another_account_is_refused() {
    init_logger();
    let (node, client) = DevNode::spawn();
    let orchestrator =
        SigningOrchestrator::new(client, SigningMode::NodeManaged(addr(DEV_ACCOUNTS[3])));

    let err = orchestrator
        .sign_transaction(transfer(), Authorization::Passphrase(""))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Signing { .. }));
    assert!(node.methods().is_empty());
}

//! Keystore management through the personal namespace

use crate::{helpers::*, init_logger};
use alloy_primitives::Address;
use eth_personal_client::{ClientError, PersonalApi};
use std::time::Duration;

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_list_accounts_returns_preloaded_keystore() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let accounts = personal.get_accounts().await.unwrap();
    let expected: Vec<Address> = DEV_ACCOUNTS.iter().map(|a| addr(a)).collect();
    assert_eq!(accounts, expected);
}

#[tokio::test]
async fn test_new_account_is_listed() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let created = personal.new_account("hunter2").await.unwrap();
    let accounts = personal.get_accounts().await.unwrap();
    assert_eq!(accounts.len(), DEV_ACCOUNTS.len() + 1);
    assert_eq!(accounts.last(), Some(&created));
}

#[tokio::test]
async fn test_import_raw_key_with_and_without_prefix() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    // The node only accepts the unprefixed form
    let imported = personal.import_raw_key(IMPORT_KEY, "pw").await.unwrap();
    assert_eq!(imported, addr(IMPORT_ACCOUNT));

    let bare = IMPORT_KEY.trim_start_matches("0x");
    let again = personal.import_raw_key(bare, "pw").await.unwrap();
    assert_eq!(again, addr(IMPORT_ACCOUNT));
    assert_eq!(again.to_checksum(None), IMPORT_ACCOUNT);
}

#[tokio::test]
async fn test_import_rejects_short_key_before_calling_node() {
    init_logger();
    let (node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let err = personal.import_raw_key("0xabcd", "pw").await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(node.methods().is_empty());
}

#[tokio::test]
async fn test_unlock_with_correct_passphrase() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let unlocked = personal
        .unlock_account(addr(DEV_ACCOUNTS[0]), "", Duration::from_secs(10_000))
        .await
        .unwrap();
    assert!(unlocked);
    assert!(personal.lock_account(addr(DEV_ACCOUNTS[0])).await.unwrap());
}

#[tokio::test]
async fn test_unlock_with_wrong_passphrase_reports_node_error() {
    init_logger();
    let (_node, client) = DevNode::spawn();
    let personal = PersonalApi::new(client);

    let err = personal
        .unlock_account(addr(DEV_ACCOUNTS[1]), "wrong", Duration::from_secs(60))
        .await
        .unwrap_err();
    match err {
        ClientError::Rpc { code, message, params, .. } => {
            assert_eq!(code, -32000);
            assert_eq!(message, "could not decrypt key with given password");
            // the passphrase never ends up in the error
            assert!(!params.to_string().contains("wrong"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_method_is_reported_with_code() {
    init_logger();
    let (_node, client) = DevNode::spawn();

    let err = client
        .call_raw("personal_deriveAccount", serde_json::json!([]))
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(-32601));
    assert!(!err.is_retryable());
}

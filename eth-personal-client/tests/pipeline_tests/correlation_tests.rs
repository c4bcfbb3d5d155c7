//! Out-of-order responses, concurrency, cancellation and timeouts

use crate::{helpers::*, init_logger};
use eth_personal_client::{ClientConfig, ClientError};
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_responses_resolve_their_own_callers_out_of_order() {
    init_logger();
    let (node, client) = DevNode::spawn();
    node.hold_responses();

    let a = tokio::spawn({
        let client = client.clone();
        async move { client.call_raw("eth_chainId", json!([])).await }
    });
    node.wait_for_held(1).await;
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.call_raw("eth_maxPriorityFeePerGas", json!([])).await }
    });
    node.wait_for_held(2).await;

    // B's response arrives before A's
    node.release_newest_first();

    assert_eq!(a.await.unwrap().unwrap(), json!("0x539"));
    assert_eq!(b.await.unwrap().unwrap(), json!("0x3b9aca00"));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_many_concurrent_calls_are_not_cross_delivered() {
    init_logger();
    let (node, client) = DevNode::spawn();
    node.hold_responses();

    let methods = ["eth_chainId", "eth_maxPriorityFeePerGas", "personal_listAccounts"];
    let mut handles = Vec::new();
    for i in 0..48 {
        let client = client.clone();
        let method = methods[i % methods.len()];
        handles.push((
            method,
            tokio::spawn(async move { client.call_raw(method, json!([])).await }),
        ));
    }
    node.wait_for_held(48).await;
    assert_eq!(client.pending_calls(), 48);
    node.release_newest_first();

    for (method, handle) in handles {
        let result = handle.await.unwrap().unwrap();
        match method {
            "eth_chainId" => assert_eq!(result, json!("0x539")),
            "eth_maxPriorityFeePerGas" => assert_eq!(result, json!("0x3b9aca00")),
            _ => assert_eq!(result.as_array().map(Vec::len), Some(DEV_ACCOUNTS.len())),
        }
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_cancelled_call_discards_late_response() {
    init_logger();
    let (node, client) = DevNode::spawn();
    node.hold_responses();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call_raw("eth_chainId", json!([])).await }
    });
    node.wait_for_held(1).await;
    assert_eq!(client.pending_calls(), 1);

    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());
    assert_eq!(client.pending_calls(), 0);

    // The orphaned response is dropped and later calls still work
    node.release_newest_first();
    let result: Value = client.call("eth_maxPriorityFeePerGas", json!([])).await.unwrap();
    assert_eq!(result, json!("0x3b9aca00"));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_timed_out_call_frees_its_slot() {
    init_logger();
    let (node, client) = DevNode::spawn_with(ClientConfig {
        timeout: Duration::from_millis(50),
    });
    node.hold_responses();

    let err = client.call_raw("eth_chainId", json!([])).await.unwrap_err();
    match &err {
        ClientError::Timeout { method, elapsed, .. } => {
            assert_eq!(method, "eth_chainId");
            assert!(*elapsed >= Duration::from_millis(50));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(client.pending_calls(), 0);

    node.release_newest_first();
    assert_eq!(client.chain_id().await.unwrap(), CHAIN_ID);
    assert_eq!(client.pending_calls(), 0);
}

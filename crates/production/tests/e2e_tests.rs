//! End-to-end tests for the proxy.
//!
//! Each test runs a counter application, the proxy in front of it and the
//! control plane on fixed localhost ports, then drives blocks through the
//! proxy like a consensus engine would. All tests use `#[serial]` to avoid
//! port conflicts.

mod fixtures;

use abci_proxy_production::rpc::{error_code, JsonRpcRequest, JsonRpcResponse};
use abci_proxy_production::Application;
use abci_proxy_types::abci::{
    code, RequestCheckTx, RequestDeliverTx, RequestInfo, RequestQuery, RequestSetOption,
};
use abci_proxy_types::{BlockHeight, PublicKey, Validator};
use futures::{SinkExt, StreamExt};
use fixtures::{current_height, rpc_call, CounterApplication, PortKind, TestNode, WAIT_TIMEOUT};
use serde_json::{json, Value};
use serial_test::serial;
use std::collections::HashSet;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::info;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn validator_key(seed: u8) -> PublicKey {
    PublicKey::Ed25519([seed; 32])
}

fn change_params(key: &PublicKey, power: u64, height: u64) -> Value {
    json!({
        "validators": [{"pub_key": key, "power": power}],
        "scheduled_height": height,
    })
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
#[serial]
async fn test_validator_change_applied_at_scheduled_height() {
    init_logging();

    let mut node = TestNode::new(1).unwrap();
    node.start(&[]).await.unwrap();
    let mut engine = node.engine().await.unwrap();

    assert_eq!(current_height(&node).await.unwrap(), 0);

    let v1 = validator_key(1);
    let response = rpc_call(&node, "change_validators", change_params(&v1, 20, 5))
        .await
        .unwrap();
    assert_eq!(response.error, None);
    assert_eq!(response.result, Some(json!({})));

    for height in 1..=4u64 {
        let end_block = engine.run_block(&[]).await.unwrap();
        assert!(
            end_block.diffs.is_empty(),
            "no diffs expected at height {}",
            height
        );
        assert_eq!(current_height(&node).await.unwrap(), height);
    }

    let end_block = engine.run_block(&[]).await.unwrap();
    assert_eq!(end_block.diffs, vec![Validator::new(&v1, 20)]);
    assert_eq!(current_height(&node).await.unwrap(), 5);
    assert_eq!(node.last_height(), Some(BlockHeight(5)));

    // Nothing is reported twice.
    let end_block = engine.run_block(&[]).await.unwrap();
    assert!(end_block.diffs.is_empty());

    // The application saw every end-block, in order.
    node.app()
        .end_block_calls
        .wait_for(6, WAIT_TIMEOUT)
        .await
        .unwrap();
    let heights: Vec<u64> = node
        .app()
        .end_block_calls
        .calls()
        .into_iter()
        .map(|h| h.0)
        .collect();
    assert_eq!(heights, vec![1, 2, 3, 4, 5, 6]);

    node.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_scheduling_in_the_past_is_rejected() {
    init_logging();

    let mut node = TestNode::new(2).unwrap();
    node.start(&[]).await.unwrap();
    let mut engine = node.engine().await.unwrap();

    for _ in 0..5 {
        engine.run_block(&[]).await.unwrap();
    }
    assert_eq!(current_height(&node).await.unwrap(), 5);

    let response = rpc_call(&node, "change_validators", change_params(&validator_key(1), 10, 3))
        .await
        .unwrap();
    let error = response.error.expect("past height must fail");
    assert_eq!(error.code, error_code::INTERNAL_ERROR);
    assert_eq!(
        error.message,
        "Could not schedule for a block height back in time (wanted:3, current:5)"
    );

    // The rejected change never shows up.
    let end_block = engine.run_block(&[]).await.unwrap();
    assert!(end_block.diffs.is_empty());

    node.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_diffs_follow_application_order() {
    init_logging();

    let mut node = TestNode::new(3).unwrap();
    node.start(&[]).await.unwrap();
    let mut engine = node.engine().await.unwrap();

    let (v1, v2, v3) = (validator_key(1), validator_key(2), validator_key(3));
    let first = json!({
        "validators": [
            {"pub_key": v1, "power": 10},
            {"pub_key": v2, "power": 0},
        ],
        "scheduled_height": 2,
    });
    rpc_call(&node, "change_validators", first).await.unwrap();
    rpc_call(&node, "change_validators", change_params(&v3, 7, 2))
        .await
        .unwrap();

    engine.run_block(&[]).await.unwrap();
    let end_block = engine.run_block(&[]).await.unwrap();
    assert_eq!(
        end_block.diffs,
        vec![
            Validator::new(&v1, 10),
            Validator::new(&v2, 0),
            Validator::new(&v3, 7),
        ]
    );

    node.stop().await.unwrap();
}

// ============================================================================
// Control plane
// ============================================================================

#[tokio::test]
#[serial]
async fn test_malformed_requests_are_rejected() {
    init_logging();

    let mut node = TestNode::new(4).unwrap();
    node.start(&[]).await.unwrap();

    let bad_key = json!({
        "validators": [{"pub_key": {"type": "ed25519", "data": "ABCD"}, "power": 1}],
        "scheduled_height": 10,
    });
    let response = rpc_call(&node, "change_validators", bad_key).await.unwrap();
    assert_eq!(
        response.error.map(|e| e.code),
        Some(error_code::INVALID_PARAMS)
    );

    let response = rpc_call(&node, "dump_state", Value::Null).await.unwrap();
    assert_eq!(
        response.error.map(|e| e.code),
        Some(error_code::METHOD_NOT_FOUND)
    );

    let raw = reqwest::Client::new()
        .post(node.rpc_url())
        .body("{not json")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(response["error"]["code"], error_code::PARSE_ERROR);

    node.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_uri_transport() {
    init_logging();

    let mut node = TestNode::new(5).unwrap();
    node.start(&[]).await.unwrap();
    let mut engine = node.engine().await.unwrap();

    let http = reqwest::Client::new();
    let v1 = validator_key(9);
    let validators = json!([{"pub_key": v1, "power": 3}]).to_string();
    let response: Value = http
        .get(format!("{}/change_validators", node.rpc_url()))
        .query(&[
            ("validators", validators.as_str()),
            ("scheduled_height", "\"2\""),
        ])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["result"], json!({}));

    engine.run_block(&[]).await.unwrap();
    let end_block = engine.run_block(&[]).await.unwrap();
    assert_eq!(end_block.diffs, vec![Validator::new(&v1, 3)]);

    let response: Value = http
        .get(format!("{}/current_height", node.rpc_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["result"]["height"], 2);

    let health: Value = http
        .get(format!("{}/health", node.rpc_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    node.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_websocket_replies_in_order() {
    init_logging();

    let mut node = TestNode::new(8).unwrap();
    node.start(&[]).await.unwrap();
    let mut engine = node.engine().await.unwrap();
    engine.run_block(&[]).await.unwrap();

    let url = format!(
        "ws://127.0.0.1:{}/websocket/endpoint",
        node.port(PortKind::Rpc)
    );
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();

    let key = validator_key(5);
    let schedule = JsonRpcRequest::new(1, "change_validators", change_params(&key, 4, 3));
    let height = JsonRpcRequest::new(2, "current_height", Value::Null);
    ws.send(Message::text(serde_json::to_string(&schedule).unwrap()))
        .await
        .unwrap();
    // Binary frames are ignored.
    ws.send(Message::binary(vec![0xde, 0xad])).await.unwrap();
    ws.send(Message::text(serde_json::to_string(&height).unwrap()))
        .await
        .unwrap();

    let mut replies: Vec<JsonRpcResponse> = Vec::new();
    while replies.len() < 2 {
        let frame = tokio::time::timeout(WAIT_TIMEOUT, ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame {
            Message::Text(text) => replies.push(serde_json::from_str(text.as_str()).unwrap()),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
    assert_eq!(replies[0].id, json!(1));
    assert_eq!(replies[0].result, Some(json!({})));
    assert_eq!(replies[1].id, json!(2));
    assert_eq!(replies[1].result, Some(json!({"height": 1})));

    ws.close(None).await.unwrap();
    tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("server should end the websocket session after close");

    // The change submitted over the socket is applied.
    engine.run_block(&[]).await.unwrap();
    let end_block = engine.run_block(&[]).await.unwrap();
    assert_eq!(end_block.diffs, vec![Validator::new(&key, 4)]);

    node.stop().await.unwrap();
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
#[serial]
async fn test_forwarding_matches_direct_calls() {
    init_logging();

    let mut node = TestNode::new(6).unwrap();
    node.start(&[]).await.unwrap();
    let engine = node.engine().await.unwrap();
    let proxied = engine.client();
    let direct = CounterApplication::new(false);

    let serial = RequestSetOption {
        key: "serial".to_string(),
        value: "on".to_string(),
    };
    assert_eq!(
        proxied.set_option(serial.clone()).await.unwrap(),
        direct.set_option(serial).await.unwrap()
    );

    let txs: Vec<Vec<u8>> = vec![
        vec![0x00],
        vec![0x00],
        vec![0x01],
        vec![0x00, 0x00, 0x02],
        vec![0x01; 9],
        vec![0x07],
    ];
    for tx in &txs {
        let check = RequestCheckTx { tx: tx.clone() };
        assert_eq!(
            proxied.check_tx(check.clone()).await.unwrap(),
            direct.check_tx(check).await.unwrap(),
            "check_tx {:?}",
            tx
        );
        let deliver = RequestDeliverTx { tx: tx.clone() };
        assert_eq!(
            proxied.deliver_tx(deliver.clone()).await.unwrap(),
            direct.deliver_tx(deliver).await.unwrap(),
            "deliver_tx {:?}",
            tx
        );
    }
    assert_eq!(node.app().tx_count(), 3);

    let rejected = proxied
        .deliver_tx(RequestDeliverTx { tx: vec![0x01; 9] })
        .await
        .unwrap();
    assert_eq!(rejected.code, code::ENCODING_ERROR);
    assert_eq!(rejected.log, "Max tx size is 8 bytes, got 9");
    direct
        .deliver_tx(RequestDeliverTx { tx: vec![0x01; 9] })
        .await
        .unwrap();

    let commit = proxied.commit().await.unwrap();
    assert_eq!(commit, direct.commit().await.unwrap());
    assert_eq!(commit.data, 3u64.to_be_bytes().to_vec());

    for path in ["hash", "tx", "bogus"] {
        let query = RequestQuery {
            path: path.to_string(),
            ..Default::default()
        };
        assert_eq!(
            proxied.query(query.clone()).await.unwrap(),
            direct.query(query).await.unwrap(),
            "query {}",
            path
        );
    }

    let info = proxied.info(RequestInfo::default()).await.unwrap();
    assert_eq!(info, direct.info(RequestInfo::default()).await.unwrap());
    assert_eq!(info.data, r#"{"hashes":1,"txs":3}"#);

    // Every call reached the application exactly once.
    assert_eq!(node.app().deliver_tx_calls.count(), direct.deliver_tx_calls.count());
    assert_eq!(node.app().check_tx_calls.calls(), direct.check_tx_calls.calls());
    assert_eq!(node.app().query_calls.calls(), vec!["hash", "tx", "bogus"]);

    node.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_transactions_delivered_in_blocks() {
    init_logging();

    let mut node = TestNode::new(7).unwrap();
    node.start(&[]).await.unwrap();
    let mut engine = node.engine().await.unwrap();

    for block in 0..3u8 {
        let txs: Vec<Vec<u8>> = (0..4u8).map(|i| vec![block, i]).collect();
        engine.run_block(&txs).await.unwrap();
    }

    node.app()
        .deliver_tx_calls
        .wait_for(12, WAIT_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(node.app().tx_count(), 12);
    assert_eq!(node.app().commit_calls.count(), 3);
    assert_eq!(engine.height(), BlockHeight(3));

    node.stop().await.unwrap();
}

// ============================================================================
// Nodes
// ============================================================================

#[tokio::test]
#[serial]
async fn test_nodes_run_independently() {
    init_logging();

    let mut nodes: Vec<TestNode> = (10..14).map(|id| TestNode::new(id).unwrap()).collect();

    let ports: HashSet<u16> = nodes
        .iter()
        .flat_map(|n| {
            [PortKind::ProxyApp, PortKind::Rpc, PortKind::P2p, PortKind::App]
                .into_iter()
                .map(|kind| n.port(kind))
        })
        .collect();
    assert_eq!(ports.len(), nodes.len() * 4);
    assert_eq!(nodes[0].port(PortKind::ProxyApp), 50010);
    assert_eq!(nodes[0].port(PortKind::App), 50310);

    for i in 0..nodes.len() {
        let (before, rest) = nodes.split_at_mut(i);
        let (node, after) = rest.split_first_mut().unwrap();
        let peers: Vec<&TestNode> = before.iter().chain(after.iter()).collect();
        node.start(&peers).await.unwrap();
        assert_eq!(node.peers().len(), 3);
        info!(id = node.id(), peers = ?node.peers(), "Node started");
    }

    // Only the second node gets a change.
    let key = validator_key(42);
    rpc_call(&nodes[1], "change_validators", change_params(&key, 1, 2))
        .await
        .unwrap();

    for (i, node) in nodes.iter().enumerate() {
        let mut engine = node.engine().await.unwrap();
        engine.run_block(&[]).await.unwrap();
        let end_block = engine.run_block(&[]).await.unwrap();
        if i == 1 {
            assert_eq!(end_block.diffs, vec![Validator::new(&key, 1)]);
        } else {
            assert!(end_block.diffs.is_empty());
        }
        node.app().end_block_calls.wait_for(2, WAIT_TIMEOUT).await.unwrap();
    }

    for node in nodes.iter_mut() {
        node.stop().await.unwrap();
        assert!(!node.is_running());
    }
}

#[tokio::test]
#[serial]
async fn test_node_lifecycle_errors() {
    init_logging();

    assert!(TestNode::new(100).is_err());

    let mut node = TestNode::new(20).unwrap();
    assert!(node.stop().await.is_err());

    node.start(&[]).await.unwrap();
    assert!(node.start(&[]).await.is_err());
    node.stop().await.unwrap();

    // Ports are released on stop.
    node.start(&[]).await.unwrap();
    node.stop().await.unwrap();
}

//! Integration tests for the purchase flow: validation, the busy
//! guard, submission over both wallet paths, and receipt outcomes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::TxHash;
use presale_client::config::{AppConfig, WalletMode};
use presale_client::contract::parse_native;
use presale_client::purchase::types::{PurchaseError, PurchaseState, TxStatus};
use presale_client::session::SessionStore;
use presale_client::wallet::relay::{RelayCommand, RelayConnection};
use presale_client::wallet::protocol::{SessionMessage, SessionRequest};
use presale_client::wallet::{InjectedSigner, WalletError};
use presale_client::{ChainClient, PresaleContract, PurchaseController, Shutdown, WalletBridge};

use common::{receipt_json, MockRpcNode, MockWallet, TxAnswer, TEST_CHAIN_ID, TEST_PRIVATE_KEY};

struct Harness {
    node: MockRpcNode,
    store: Arc<SessionStore>,
    bridge: Arc<WalletBridge>,
    controller: Arc<PurchaseController>,
}

async fn build_harness(configure: impl FnOnce(&mut AppConfig)) -> Harness {
    let node = MockRpcNode::start().await;
    let mut config = common::test_config(&node.url);
    configure(&mut config);
    let config = Arc::new(config);

    let store = Arc::new(SessionStore::new());
    let chain = Arc::new(ChainClient::new(&config.chain).unwrap());
    let bridge = Arc::new(WalletBridge::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&chain),
        Shutdown::new(),
    ));
    let contract = Arc::new(
        PresaleContract::new(
            &config.contract.address,
            chain,
            config.contract.receipt_timeout_secs,
        )
        .unwrap(),
    );
    let controller = Arc::new(PurchaseController::new(
        Arc::clone(&store),
        contract,
        Arc::clone(&bridge),
        parse_native(&config.contract.min_purchase).unwrap(),
    ));

    Harness {
        node,
        store,
        bridge,
        controller,
    }
}

/// Connect the bridge over the injected path with the test key.
async fn connect_injected(harness: &Harness) {
    harness
        .node
        .stub("eth_chainId", serde_json::json!(format!("0x{:x}", TEST_CHAIN_ID)));
    let signer = InjectedSigner::from_key(TEST_PRIVATE_KEY, TEST_CHAIN_ID).unwrap();
    harness.bridge.set_injected_signer(signer).await;
    harness.bridge.connect().await.unwrap();
}

#[tokio::test]
async fn test_purchase_requires_session() {
    let harness = build_harness(|_| {}).await;

    let result = harness.controller.purchase("0.5").await;
    match result {
        Err(PurchaseError::Validation(message)) => {
            assert!(message.contains("connect a wallet"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(harness.controller.state(), PurchaseState::Idle);
}

#[tokio::test]
async fn test_purchase_rejects_malformed_amount() {
    let harness = build_harness(|config| config.wallet.mode = WalletMode::Injected).await;
    connect_injected(&harness).await;

    for bad in ["", "abc", "1.2.3", "-1"] {
        let result = harness.controller.purchase(bad).await;
        assert!(
            matches!(result, Err(PurchaseError::Validation(_))),
            "amount {:?} was not rejected",
            bad
        );
    }
    // Rejected input returns the flow to idle with nothing recorded.
    assert_eq!(harness.controller.state(), PurchaseState::Idle);
    assert_eq!(*harness.controller.watch().borrow(), PurchaseState::Idle);
    assert!(harness.controller.records().is_empty());
}

#[tokio::test]
async fn test_purchase_rejects_below_minimum() {
    let harness = build_harness(|config| {
        config.wallet.mode = WalletMode::Injected;
        config.contract.min_purchase = "0.01".to_string();
    })
    .await;
    connect_injected(&harness).await;

    let result = harness.controller.purchase("0.009").await;
    match result {
        Err(PurchaseError::Validation(message)) => {
            assert!(message.contains("minimum"), "message: {}", message);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(harness.controller.state(), PurchaseState::Idle);
}

#[tokio::test]
async fn test_injected_purchase_confirms() {
    let harness = build_harness(|config| config.wallet.mode = WalletMode::Injected).await;
    connect_injected(&harness).await;

    let hash = TxHash::repeat_byte(0x22);
    harness.node.stub_chain_basics();
    harness
        .node
        .stub("eth_sendRawTransaction", serde_json::json!(hash));
    harness
        .node
        .stub("eth_getTransactionReceipt", receipt_json(hash, 0x10, true));

    let record = harness.controller.purchase("0.5").await.unwrap();
    assert_eq!(record.hash, hash);
    assert_eq!(record.status, TxStatus::Confirmed { block_number: 0x10 });
    assert_eq!(harness.controller.state(), PurchaseState::Idle);
    assert_eq!(*harness.controller.watch().borrow(), PurchaseState::Confirmed);
    assert_eq!(
        harness.controller.record(hash).unwrap().status,
        TxStatus::Confirmed { block_number: 0x10 }
    );
}

#[tokio::test]
async fn test_reverted_purchase_keeps_session() {
    let harness = build_harness(|config| config.wallet.mode = WalletMode::Injected).await;
    connect_injected(&harness).await;

    let hash = TxHash::repeat_byte(0x33);
    harness.node.stub_chain_basics();
    harness
        .node
        .stub("eth_sendRawTransaction", serde_json::json!(hash));
    harness
        .node
        .stub("eth_getTransactionReceipt", receipt_json(hash, 0x10, false));

    let result = harness.controller.purchase("0.5").await;
    match result {
        Err(PurchaseError::ChainRejected { hash: rejected }) => assert_eq!(rejected, hash),
        other => panic!("expected ChainRejected, got {:?}", other),
    }
    assert_eq!(harness.controller.record(hash).unwrap().status, TxStatus::Failed);
    // A failed purchase ends the flow, not the session.
    assert!(harness.store.is_connected());
    assert_eq!(harness.controller.state(), PurchaseState::Idle);
}

#[tokio::test]
async fn test_receipt_timeout_leaves_record_pending() {
    let harness = build_harness(|config| {
        config.wallet.mode = WalletMode::Injected;
        config.contract.receipt_timeout_secs = 3;
    })
    .await;
    connect_injected(&harness).await;

    let hash = TxHash::repeat_byte(0x44);
    harness.node.stub_chain_basics();
    harness
        .node
        .stub("eth_sendRawTransaction", serde_json::json!(hash));
    harness
        .node
        .stub("eth_getTransactionReceipt", serde_json::Value::Null);

    let result = harness.controller.purchase("0.5").await;
    match result {
        Err(PurchaseError::ReceiptTimeout { hash: pending, secs }) => {
            assert_eq!(pending, hash);
            assert_eq!(secs, 3);
        }
        other => panic!("expected ReceiptTimeout, got {:?}", other),
    }
    // Only the chain can settle the outcome; the record stays pending.
    assert_eq!(harness.controller.record(hash).unwrap().status, TxStatus::Pending);
}

#[tokio::test]
async fn test_receipt_waits_for_confirmation_depth() {
    let harness = build_harness(|config| {
        config.wallet.mode = WalletMode::Injected;
        config.chain.confirmation_blocks = 2;
    })
    .await;
    connect_injected(&harness).await;

    let hash = TxHash::repeat_byte(0x77);
    harness.node.stub_chain_basics();
    harness
        .node
        .stub("eth_sendRawTransaction", serde_json::json!(hash));
    harness
        .node
        .stub("eth_getTransactionReceipt", receipt_json(hash, 0x10, true));
    // First poll sees only one confirmation; the chain then advances.
    harness
        .node
        .stub_once("eth_blockNumber", serde_json::json!("0x10"));
    harness.node.stub("eth_blockNumber", serde_json::json!("0x11"));

    let record = harness.controller.purchase("0.5").await.unwrap();
    assert_eq!(record.status, TxStatus::Confirmed { block_number: 0x10 });
}

#[tokio::test]
async fn test_second_purchase_refused_while_busy() {
    let harness = build_harness(|config| {
        config.wallet.mode = WalletMode::Injected;
        config.contract.receipt_timeout_secs = 30;
    })
    .await;
    connect_injected(&harness).await;

    let hash = TxHash::repeat_byte(0x55);
    harness.node.stub_chain_basics();
    harness
        .node
        .stub("eth_sendRawTransaction", serde_json::json!(hash));
    // The receipt never arrives, so the first flow stays in flight.
    harness
        .node
        .stub("eth_getTransactionReceipt", serde_json::Value::Null);

    let controller = Arc::clone(&harness.controller);
    let first = tokio::spawn(async move { controller.purchase("0.5").await });

    // Wait until the first flow is past validation.
    let mut watch = harness.controller.watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        while *watch.borrow() != PurchaseState::Submitted {
            watch.changed().await.unwrap();
        }
    })
    .await
    .expect("first purchase never reached Submitted");

    let second = harness.controller.purchase("0.5").await;
    assert!(matches!(second, Err(PurchaseError::Busy)));

    // The refusal must not have disturbed the running flow.
    assert_eq!(harness.controller.state(), PurchaseState::Submitted);
    first.abort();
}

#[tokio::test]
async fn test_relay_purchase_confirms_via_remote_wallet() {
    let harness = build_harness(|config| config.wallet.mode = WalletMode::Relay).await;

    let hash = TxHash::repeat_byte(0x66);
    let (connection, peer) = RelayConnection::in_memory();
    harness.bridge.set_relay_connection(connection).await;
    let wallet = MockWallet {
        tx_answer: TxAnswer::Hash(hash),
        ..MockWallet::approving()
    };
    let (mut log, _task) = wallet.spawn(peer);
    harness.bridge.connect().await.unwrap();

    harness.node.stub("eth_blockNumber", serde_json::json!("0x10"));
    harness
        .node
        .stub("eth_getTransactionReceipt", receipt_json(hash, 0x10, true));

    let record = harness.controller.purchase("0.5").await.unwrap();
    assert_eq!(record.hash, hash);
    assert_eq!(record.status, TxStatus::Confirmed { block_number: 0x10 });

    // The remote wallet must have been asked to sign and broadcast.
    let mut send_request: Option<SessionRequest> = None;
    while let Ok(command) = log.try_recv() {
        if let RelayCommand::Publish(envelope) = command {
            if let SessionMessage::Request(request) = envelope.message {
                if request.method == "eth_sendTransaction" {
                    send_request = Some(request);
                }
            }
        }
    }
    let request = send_request.expect("wallet never saw eth_sendTransaction");
    let value = request.params[0]["value"].as_str().unwrap().to_string();
    assert_eq!(value, format!("0x{:x}", parse_native("0.5").unwrap()));
}

#[tokio::test]
async fn test_relay_purchase_user_rejects_transaction() {
    let harness = build_harness(|config| config.wallet.mode = WalletMode::Relay).await;

    let (connection, peer) = RelayConnection::in_memory();
    harness.bridge.set_relay_connection(connection).await;
    let wallet = MockWallet {
        tx_answer: TxAnswer::Reject,
        ..MockWallet::approving()
    };
    let (_log, _task) = wallet.spawn(peer);
    harness.bridge.connect().await.unwrap();

    let result = harness.controller.purchase("0.5").await;
    assert!(matches!(
        result,
        Err(PurchaseError::Wallet(WalletError::UserRejected))
    ));
    // Rejecting one transaction does not end the session.
    assert!(harness.store.is_connected());
    assert_eq!(harness.controller.state(), PurchaseState::Idle);
    assert!(harness.controller.records().is_empty());
}

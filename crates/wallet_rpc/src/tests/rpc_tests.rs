use super::*;
use alloy_primitives::hex;
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use shared::{
    contract::{ContractMethod, CounterIncreased, COUNTER_CONTRACT_ADDRESS},
    domain::{BlockNumber, B256, U256},
};
use tokio::{net::TcpListener, sync::Mutex};
use url::Url;

const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

fn account() -> Address {
    Address::repeat_byte(0xab)
}

fn word(value: u64) -> String {
    hex::encode_prefixed(U256::from(value).to_be_bytes::<32>())
}

fn address_word(address: Address) -> String {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_slice());
    hex::encode_prefixed(bytes)
}

#[derive(Default)]
struct MockNodeState {
    accounts: Vec<Address>,
    chain_id: u64,
    count: u64,
    owner: Address,
    reject_authorization: bool,
    revert: bool,
    malformed_log: bool,
    pending_receipt_polls: usize,
    received: Vec<(String, Value)>,
}

#[derive(Clone)]
struct MockNode {
    state: Arc<Mutex<MockNodeState>>,
}

impl MockNode {
    async fn methods(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .received
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }
}

fn selector_of(data: &str) -> Option<[u8; 4]> {
    let bytes = hex::decode(data).ok()?;
    bytes.get(..4)?.try_into().ok()
}

async fn handle_rpc(State(node): State<MockNode>, Json(request): Json<Value>) -> Json<Value> {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    let mut state = node.state.lock().await;
    state.received.push((method.clone(), params.clone()));

    let error = |code: i64, message: &str| {
        Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}))
    };

    let result = match method.as_str() {
        "eth_chainId" => json!(format!("0x{:x}", state.chain_id)),
        "eth_accounts" => json!(state.accounts),
        "eth_requestAccounts" => {
            if state.reject_authorization {
                return error(4001, "User rejected the request.");
            }
            json!(state.accounts)
        }
        "eth_sendTransaction" => {
            let data = params[0]["data"].as_str().unwrap_or_default();
            match selector_of(data) {
                Some(selector) if selector == ContractMethod::Increment.selector() => {
                    state.count += 1
                }
                Some(selector) if selector == ContractMethod::Decrement.selector() => {
                    state.count = state.count.saturating_sub(1)
                }
                Some(selector) if selector == ContractMethod::ResetCounter.selector() => {
                    state.count = 0
                }
                _ => return error(-32000, "unknown selector"),
            }
            json!(TX_HASH)
        }
        "eth_getTransactionReceipt" => {
            if state.pending_receipt_polls > 0 {
                state.pending_receipt_polls -= 1;
                Value::Null
            } else {
                let event_data = format!(
                    "{}{}",
                    word(state.count),
                    address_word(account()).trim_start_matches("0x")
                );
                let mut logs = Vec::new();
                if state.malformed_log {
                    logs.push(json!({
                        "address": COUNTER_CONTRACT_ADDRESS,
                        "topics": [CounterIncreased::topic()],
                        "data": "0xnothex",
                    }));
                }
                logs.push(json!({
                    "address": COUNTER_CONTRACT_ADDRESS,
                    "topics": [CounterIncreased::topic()],
                    "data": event_data,
                }));
                json!({
                    "transactionHash": TX_HASH,
                    "status": if state.revert { "0x0" } else { "0x1" },
                    "blockNumber": "0x10",
                    "logs": logs,
                })
            }
        }
        "eth_call" => {
            let data = params[0]["data"].as_str().unwrap_or_default();
            match selector_of(data) {
                Some(selector) if selector == ContractMethod::GetCount.selector() => {
                    json!(word(state.count))
                }
                Some(selector) if selector == ContractMethod::Owner.selector() => {
                    json!(address_word(state.owner))
                }
                _ => return error(-32000, "execution reverted"),
            }
        }
        _ => return error(-32601, "method not found"),
    };

    Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

async fn spawn_mock_node(state: MockNodeState) -> (Url, MockNode) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let node = MockNode {
        state: Arc::new(Mutex::new(state)),
    };
    let app = Router::new()
        .route("/", post(handle_rpc))
        .with_state(node.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("http://{addr}/")).expect("url");
    (url, node)
}

fn fast_settings(url: Url) -> RpcSettings {
    let mut settings = RpcSettings::new(url);
    settings.receipt_poll_interval = Duration::from_millis(5);
    settings.receipt_timeout = Duration::from_secs(2);
    settings
}

async fn bound_contract(node_state: MockNodeState) -> (Arc<dyn ContractBinding>, MockNode) {
    let (url, node) = spawn_mock_node(node_state).await;
    let wallet = JsonRpcWallet::new(fast_settings(url));
    let signer = wallet.signer().await.expect("signer");
    let binding = wallet
        .bind(ContractInterface::counter(), signer)
        .await
        .expect("bind");
    (binding, node)
}

#[tokio::test]
async fn detect_returns_wallet_when_endpoint_answers() {
    let (url, _node) = spawn_mock_node(MockNodeState {
        chain_id: 11155111,
        ..MockNodeState::default()
    })
    .await;

    let wallet = JsonRpcWallet::detect(fast_settings(url))
        .await
        .expect("wallet detected");
    assert_eq!(wallet.chain_id().await.expect("chain id"), ChainId(11155111));
}

#[tokio::test]
async fn detect_returns_none_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let url = Url::parse(&format!("http://{addr}/")).expect("url");

    assert!(JsonRpcWallet::detect(fast_settings(url)).await.is_none());
}

#[tokio::test]
async fn authorization_rejection_maps_to_user_rejected() {
    let (url, _node) = spawn_mock_node(MockNodeState {
        accounts: vec![account()],
        reject_authorization: true,
        ..MockNodeState::default()
    })
    .await;
    let wallet = JsonRpcWallet::new(fast_settings(url));

    let err = wallet.request_accounts().await.expect_err("rejected");
    assert!(matches!(
        err.downcast_ref::<WalletError>(),
        Some(WalletError::UserRejected)
    ));
}

#[tokio::test]
async fn accounts_and_signer_come_from_the_endpoint() {
    let (url, _node) = spawn_mock_node(MockNodeState {
        accounts: vec![account()],
        ..MockNodeState::default()
    })
    .await;
    let wallet = JsonRpcWallet::new(fast_settings(url));

    assert_eq!(wallet.request_accounts().await.expect("accounts"), vec![account()]);
    assert_eq!(wallet.get_accounts().await.expect("accounts"), vec![account()]);
    assert_eq!(wallet.signer().await.expect("signer"), Signer::new(account()));
}

#[tokio::test]
async fn signer_without_accounts_fails() {
    let (url, _node) = spawn_mock_node(MockNodeState::default()).await;
    let wallet = JsonRpcWallet::new(fast_settings(url));

    let err = wallet.signer().await.expect_err("no account");
    assert!(matches!(
        err.downcast_ref::<WalletError>(),
        Some(WalletError::NoAccount)
    ));
}

#[tokio::test]
async fn increment_sends_selector_and_waits_for_receipt() {
    let (binding, node) = bound_contract(MockNodeState {
        accounts: vec![account()],
        count: 4,
        pending_receipt_polls: 2,
        ..MockNodeState::default()
    })
    .await;

    let pending = binding.increment().await.expect("submit");
    assert_eq!(pending.tx_hash(), TX_HASH.parse::<B256>().expect("hash"));
    let receipt = pending.wait().await.expect("receipt");

    assert_eq!(receipt.block_number, Some(BlockNumber(16)));
    assert_eq!(receipt.counter_increased.len(), 1);
    assert_eq!(receipt.counter_increased[0].new_value, U256::from(5u64));
    assert_eq!(receipt.counter_increased[0].incrementor, account());

    let state = node.state.lock().await;
    let (_, params) = state
        .received
        .iter()
        .find(|(method, _)| method == "eth_sendTransaction")
        .expect("transaction sent");
    assert_eq!(params[0]["data"], json!("0xd09de08a"));
    assert_eq!(
        params[0]["to"].as_str().map(str::to_ascii_lowercase),
        Some("0xc187c62d3119a61432e7758d32716fbe62dda9c8".to_string())
    );
    let receipt_polls = state
        .received
        .iter()
        .filter(|(method, _)| method == "eth_getTransactionReceipt")
        .count();
    assert_eq!(receipt_polls, 3);
}

#[tokio::test]
async fn reverted_receipt_fails_the_wait() {
    let (binding, _node) = bound_contract(MockNodeState {
        accounts: vec![account()],
        revert: true,
        ..MockNodeState::default()
    })
    .await;

    let pending = binding.reset_counter().await.expect("submit");
    let err = pending.wait().await.expect_err("reverted");
    assert!(matches!(
        err.downcast_ref::<WalletError>(),
        Some(WalletError::Reverted(_))
    ));
}

#[tokio::test]
async fn malformed_log_is_skipped_not_fatal() {
    let (binding, _node) = bound_contract(MockNodeState {
        accounts: vec![account()],
        count: 1,
        malformed_log: true,
        ..MockNodeState::default()
    })
    .await;

    let receipt = binding
        .increment()
        .await
        .expect("submit")
        .wait()
        .await
        .expect("mined transaction still confirms");
    assert_eq!(receipt.counter_increased.len(), 1);
    assert_eq!(receipt.counter_increased[0].new_value, U256::from(2u64));
}

#[tokio::test]
async fn bind_rejects_interface_missing_a_method() {
    let (url, _node) = spawn_mock_node(MockNodeState::default()).await;
    let wallet = JsonRpcWallet::new(fast_settings(url));
    let partial = ContractInterface {
        address: COUNTER_CONTRACT_ADDRESS,
        abi: &["function increment()", "function getCount() view returns (uint256)"],
    };

    let err = match wallet.bind(partial, Signer::new(account())).await {
        Ok(_) => panic!("partial interface should not bind"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("decrement"));
}

#[tokio::test]
async fn view_and_transaction_paths_reject_the_wrong_method_kind() {
    let (url, node) = spawn_mock_node(MockNodeState::default()).await;
    let contract = RpcCounterContract::new(
        Arc::new(JsonRpcClient::new(url)),
        COUNTER_CONTRACT_ADDRESS,
        Signer::new(account()),
        Duration::from_millis(5),
        Duration::from_secs(1),
    );

    assert!(contract.call(ContractMethod::Increment).await.is_err());
    assert!(contract.send(ContractMethod::GetCount).await.is_err());
    assert!(node.methods().await.is_empty());
}

#[tokio::test]
async fn wait_gives_up_after_receipt_timeout() {
    let (url, _node) = spawn_mock_node(MockNodeState {
        accounts: vec![account()],
        pending_receipt_polls: usize::MAX,
        ..MockNodeState::default()
    })
    .await;
    let mut settings = fast_settings(url);
    settings.receipt_timeout = Duration::from_millis(30);
    let wallet = JsonRpcWallet::new(settings);
    let binding = wallet
        .bind(ContractInterface::counter(), Signer::new(account()))
        .await
        .expect("bind");

    let pending = binding.decrement().await.expect("submit");
    let err = pending.wait().await.expect_err("timeout");
    assert!(err.to_string().contains("no receipt"));
}

#[tokio::test]
async fn view_calls_decode_count_and_owner() {
    let owner = Address::repeat_byte(0x77);
    let (binding, node) = bound_contract(MockNodeState {
        accounts: vec![account()],
        count: 42,
        owner,
        ..MockNodeState::default()
    })
    .await;

    assert_eq!(binding.get_count().await.expect("count"), 42);
    assert_eq!(binding.owner().await.expect("owner"), owner);

    let methods = node.methods().await;
    assert_eq!(methods.iter().filter(|m| *m == "eth_call").count(), 2);
    assert!(!methods.iter().any(|m| m == "eth_sendTransaction"));
}

#[tokio::test]
async fn watcher_publishes_account_and_chain_changes() {
    let (url, node) = spawn_mock_node(MockNodeState {
        accounts: vec![account()],
        chain_id: 1,
        ..MockNodeState::default()
    })
    .await;
    let wallet = JsonRpcWallet::new(fast_settings(url));
    let mut events = wallet.subscribe_events();
    let watcher = wallet.spawn_event_watcher(Duration::from_millis(5));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let other = Address::repeat_byte(0xcd);
    node.state.lock().await.accounts = vec![other];
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("account event in time")
        .expect("event");
    assert_eq!(event, WalletEvent::AccountsChanged(vec![other]));

    node.state.lock().await.chain_id = 5;
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("chain event in time")
        .expect("event");
    assert_eq!(event, WalletEvent::ChainChanged(ChainId(5)));

    watcher.abort();
}

//! End-to-end provider flows against a mock chain node, relay and
//! registration service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use alloy::primitives::{address, eip191_hash_message, Address, Bytes, U256};
use alloy::sol_types::SolCall;
use serde_json::{json, Value};
use wallet_relay::blockchain::ChainClient;
use wallet_relay::config::ProviderConfig;
use wallet_relay::provider::error::{INTERNAL_ERROR, UNAUTHORIZED};
use wallet_relay::provider::{ProviderEvent, RequestArguments, WalletRelayProvider, ONBOARDING_MESSAGE};
use wallet_relay::session::StaticSession;
use wallet_relay::wallet::abi::IWallet;
use wallet_relay::wallet::{
    BehaviorOnError, Call, CallsPayload, EncodedNonce, LocalSigner, SignatureShare, WalletSignature,
};

mod common;

const WALLET: Address = address!("0x7777777777777777777777777777777777777777");
const SIGNER: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
const TARGET: Address = address!("0x2222222222222222222222222222222222222222");
const RELAY_PATH: &str = "/relayer-mr/v1/transactions";

fn config(server: &common::MockServer) -> ProviderConfig {
    let mut config = ProviderConfig::default();
    config.chain.rpc_url = server.url("/rpc");
    config.relay.base_url = server.url("/relayer-mr");
    config.registration.base_url = server.url("/passport-mr");
    config.confirmation.poll_interval_ms = 10;
    config.confirmation.max_attempts = 5;
    config
}

fn provider(server: &common::MockServer, session: Arc<StaticSession>) -> WalletRelayProvider {
    let config = config(server);
    let chain = Arc::new(ChainClient::new(config.chain.clone()).unwrap());
    let signer = Arc::new(LocalSigner::from_private_key(common::TEST_PRIVATE_KEY).unwrap());
    WalletRelayProvider::new(&config, session, chain, signer).unwrap()
}

fn relayed(status: &str, hash: &str, message: Option<&str>) -> Value {
    json!({
        "status": status,
        "chainId": "eip155:31337",
        "relayerId": "relay-1",
        "hash": hash,
        "statusMessage": message,
    })
}

async fn connect(provider: &WalletRelayProvider) -> Value {
    provider
        .request(RequestArguments::new("eth_requestAccounts", None))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_send_transaction_end_to_end() {
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let server = common::start_mock_server(move |path, body| {
        match (path, body["method"].as_str()) {
            ("/rpc", Some("eth_getCode")) => common::rpc_ok(body, json!("0x")),
            (RELAY_PATH, Some("eth_sendTransaction")) => common::rpc_ok(body, json!("relay-1")),
            (RELAY_PATH, Some("im_getTransactionByHash")) => {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    common::rpc_ok(body, relayed("PENDING", "", None))
                } else {
                    common::rpc_ok(body, relayed("SUCCESSFUL", "0xdead", None))
                }
            }
            _ => common::not_found(),
        }
    })
    .await;

    let session = Arc::new(StaticSession::new(common::test_user(Some(WALLET))));
    let provider = provider(&server, session);
    connect(&provider).await;

    let hash = provider
        .request(RequestArguments::new(
            "eth_sendTransaction",
            Some(json!([{ "to": TARGET, "data": "0xabcdef", "value": "0x5" }])),
        ))
        .await
        .unwrap();
    assert_eq!(hash, json!("0xdead"));
    assert_eq!(polls.load(Ordering::SeqCst), 3);

    let sends = server.calls("eth_sendTransaction");
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].authorization.as_deref(), Some("Bearer test-token"));
    let params = &sends[0].body["params"][0];
    assert_eq!(params["chainId"], "eip155:31337");
    assert_eq!(params["to"].as_str().unwrap().parse::<Address>().unwrap(), WALLET);

    // Undeployed wallet: space 0, sequence 1
    let expected = CallsPayload::new(
        vec![Call {
            to: TARGET,
            value: U256::from(5u8),
            data: Bytes::from_static(&[0xab, 0xcd, 0xef]),
            gas_limit: U256::ZERO,
            delegate_call: false,
            only_fallback: false,
            behavior_on_error: BehaviorOnError::Revert,
        }],
        EncodedNonce::new(U256::ZERO, U256::from(1u8)).unwrap(),
    )
    .unwrap();

    let calldata: Bytes = serde_json::from_value(params["data"].clone()).unwrap();
    let execute = IWallet::executeCall::abi_decode(&calldata).unwrap();
    assert_eq!(execute._payload, expected.encode_packed(WALLET).unwrap());

    let signature = WalletSignature::decode(&execute._signature).unwrap();
    let digest = expected.hash(WALLET, 31337);
    let leaf = &signature.topology.leaves[0];
    assert_eq!(leaf.share.recover(eip191_hash_message(digest)), Some(SIGNER));
}

#[tokio::test]
async fn test_reverted_transaction_is_internal_error() {
    let server = common::start_mock_server(|path, body| match (path, body["method"].as_str()) {
        ("/rpc", Some("eth_getCode")) => common::rpc_ok(body, json!("0x")),
        (RELAY_PATH, Some("eth_sendTransaction")) => common::rpc_ok(body, json!("relay-1")),
        (RELAY_PATH, Some("im_getTransactionByHash")) => common::rpc_ok(
            body,
            relayed("REVERTED", "0xbeef", Some("execution reverted: insufficient funds")),
        ),
        _ => common::not_found(),
    })
    .await;

    let session = Arc::new(StaticSession::new(common::test_user(Some(WALLET))));
    let provider = provider(&server, session);
    connect(&provider).await;

    let err = provider
        .request(RequestArguments::new(
            "eth_sendTransaction",
            Some(json!([{ "to": TARGET }])),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code, INTERNAL_ERROR);
    assert!(err.message.contains("insufficient funds"));
    assert_eq!(server.calls("im_getTransactionByHash").len(), 1);
}

#[tokio::test]
async fn test_send_before_connect_makes_no_network_calls() {
    let server = common::start_mock_server(|_, body| common::rpc_ok(body, json!("0x"))).await;
    let session = Arc::new(StaticSession::new(common::test_user(Some(WALLET))));
    let provider = provider(&server, session);

    let accounts = provider
        .request(RequestArguments::new("eth_accounts", None))
        .await
        .unwrap();
    assert_eq!(accounts, json!([]));

    let err = provider
        .request(RequestArguments::new(
            "eth_sendTransaction",
            Some(json!([{ "to": TARGET }])),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code, UNAUTHORIZED);
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_request_accounts_registers_new_user() {
    let server = common::start_mock_server(|path, _| match path {
        "/passport-mr/v1/counterfactual-address/anvil" => (
            200,
            json!({ "counterfactual_address": WALLET }).to_string(),
        ),
        _ => common::not_found(),
    })
    .await;

    let session = Arc::new(StaticSession::new(common::test_user(None)));
    let provider = provider(&server, session);
    let mut events = provider.subscribe();

    let accounts = connect(&provider).await;
    assert_eq!(accounts, json!([WALLET.to_checksum(None)]));
    assert_eq!(
        events.recv().await.unwrap(),
        ProviderEvent::AccountsChanged(vec![WALLET])
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer test-token"));
    assert_eq!(
        body["ethereum_address"].as_str().unwrap().parse::<Address>().unwrap(),
        SIGNER
    );
    let share = SignatureShare::from_hex(body["ethereum_signature"].as_str().unwrap()).unwrap();
    assert_eq!(share.recover(eip191_hash_message(ONBOARDING_MESSAGE)), Some(SIGNER));

    // Cached: a second call does not register again
    connect(&provider).await;
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_failed_registration_leaves_accounts_empty() {
    let server = common::start_mock_server(|_, _| (500, "registration unavailable".to_string())).await;
    let session = Arc::new(StaticSession::new(common::test_user(None)));
    let provider = provider(&server, session);

    let err = provider
        .request(RequestArguments::new("eth_requestAccounts", None))
        .await
        .unwrap_err();
    assert_eq!(err.code, INTERNAL_ERROR);
    assert!(err.message.contains("registration unavailable"));

    let accounts = provider
        .request(RequestArguments::new("eth_accounts", None))
        .await
        .unwrap();
    assert_eq!(accounts, json!([]));
}

#[tokio::test]
async fn test_passthrough_reaches_chain_node() {
    let server = common::start_mock_server(|path, body| match (path, body["method"].as_str()) {
        ("/rpc", Some("eth_chainId")) => common::rpc_ok(body, json!("0x7a69")),
        ("/rpc", Some("eth_getBalance")) => common::rpc_ok(body, json!("0x64")),
        _ => common::not_found(),
    })
    .await;
    let provider = provider(&server, Arc::new(StaticSession::new(common::test_user(None))));

    let chain_id = provider
        .request(RequestArguments::new("eth_chainId", None))
        .await
        .unwrap();
    assert_eq!(chain_id, json!("0x7a69"));

    let balance = provider
        .request(RequestArguments::new("eth_getBalance", Some(json!([TARGET]))))
        .await
        .unwrap();
    assert_eq!(balance, json!("0x64"));

    let call = &server.calls("eth_getBalance")[0];
    assert_eq!(call.path, "/rpc");
    assert_eq!(call.body["params"][1], "latest");
}

#[tokio::test]
async fn test_sign_requests_go_to_relay() {
    let server = common::start_mock_server(|path, body| match (path, body["method"].as_str()) {
        (RELAY_PATH, Some("im_sign")) => common::rpc_ok(body, json!("0xsigned")),
        (RELAY_PATH, Some("im_signTypedData")) => common::rpc_ok(body, json!("0xtyped")),
        _ => common::not_found(),
    })
    .await;
    let session = Arc::new(StaticSession::new(common::test_user(Some(WALLET))));
    let provider = provider(&server, session);
    connect(&provider).await;

    let signature = provider
        .request(RequestArguments::new("personal_sign", Some(json!(["hello", WALLET]))))
        .await
        .unwrap();
    assert_eq!(signature, json!("0xsigned"));
    let sign = &server.calls("im_sign")[0].body["params"][0];
    assert_eq!(sign["message"], "hello");
    assert_eq!(sign["chainId"], "eip155:31337");

    let typed = json!({
        "domain": { "name": "Example", "chainId": 31337 },
        "types": { "EIP712Domain": [] },
        "primaryType": "EIP712Domain",
        "message": {}
    });
    let signature = provider
        .request(RequestArguments::new(
            "eth_signTypedData_v4",
            Some(json!([WALLET, typed.to_string()])),
        ))
        .await
        .unwrap();
    assert_eq!(signature, json!("0xtyped"));
    let sign = &server.calls("im_signTypedData")[0].body["params"][0];
    assert_eq!(sign["eip712Payload"], typed);
}

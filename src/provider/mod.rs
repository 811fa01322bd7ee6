//! Transaction provider façade.
//!
//! # Data Flow
//! ```text
//! request(RequestArguments { method, params })
//!     → eth_requestAccounts → session login → registration.rs → cache + AccountsChanged
//!     → eth_accounts → cached address
//!     → eth_sendTransaction → transaction::TransactionPipeline → hash
//!     → personal_sign / eth_signTypedData[_v4] → relay im_sign / im_signTypedData
//!     → passthrough.rs → chain node
//!     → anything else → UNSUPPORTED_METHOD
//!
//! SessionManager::subscribe() → event task → events.rs (AccountsChanged)
//! ```
//!
//! # Design Decisions
//! - Methods that act for the wallet require a cached address; they fail with
//!   UNAUTHORIZED before any network I/O
//! - The session event task holds a weak reference and is aborted on dispose

pub mod error;
pub mod events;
pub mod passthrough;
pub mod registration;

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::blockchain::{ChainClient, ChainId, ChainRpc};
use crate::config::{ProviderConfig, SignerKind};
use crate::observability::{metrics, Flow};
use crate::relay::{RelayClient, RelayerTransaction};
use crate::resilience::RetryPolicy;
use crate::session::{SessionEvent, SessionManager};
use crate::transaction::{get_nonce, TransactionPipeline, TransactionRequest};
use crate::wallet::nonce::EncodedNonce;
use crate::wallet::signer::{DigestSigner, LocalSigner, RemoteSigner};

pub use error::{JsonRpcError, SetupError};
pub use events::{EventBus, ProviderEvent};
pub use registration::{RegistrationClient, RegistrationError, ONBOARDING_MESSAGE};

/// An EIP-1193 style request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestArguments {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Methods handled by the façade itself.
const WALLET_METHODS: &[&str] = &[
    "eth_requestAccounts",
    "eth_accounts",
    "eth_sendTransaction",
    "personal_sign",
    "eth_signTypedData",
    "eth_signTypedData_v4",
];

struct Inner {
    chain_id: ChainId,
    session: Arc<dyn SessionManager>,
    chain: Arc<dyn ChainRpc>,
    relay: Arc<RelayClient>,
    signer: Arc<dyn DigestSigner>,
    registration: RegistrationClient,
    pipeline: TransactionPipeline,
    policy: RetryPolicy,
    address: ArcSwapOption<Address>,
    events: EventBus,
}

/// Wallet-backed JSON-RPC provider that relays transactions.
pub struct WalletRelayProvider {
    inner: Arc<Inner>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl WalletRelayProvider {
    /// Assemble a provider from its collaborators. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: &ProviderConfig,
        session: Arc<dyn SessionManager>,
        chain: Arc<dyn ChainRpc>,
        signer: Arc<dyn DigestSigner>,
    ) -> Result<Self, SetupError> {
        let chain_id = ChainId(config.chain.chain_id);
        let space = config.nonce.parsed_space().map_err(SetupError::Config)?;
        let policy = RetryPolicy::from(&config.confirmation);
        let relay = Arc::new(RelayClient::new(&config.relay, session.clone())?);
        let registration = RegistrationClient::new(&config.registration, &config.chain)?;
        let pipeline = TransactionPipeline::new(
            chain.clone(),
            relay.clone(),
            signer.clone(),
            chain_id,
            space,
            policy,
        );

        let inner = Arc::new(Inner {
            chain_id,
            session,
            chain,
            relay,
            signer,
            registration,
            pipeline,
            policy,
            address: ArcSwapOption::empty(),
            events: EventBus::new(),
        });

        let events = inner.session.subscribe();
        let event_task = tokio::spawn(forward_session_events(Arc::downgrade(&inner), events));

        tracing::info!(chain_id = %chain_id, space = %space, "Wallet relay provider ready");
        Ok(Self {
            inner,
            event_task: Mutex::new(Some(event_task)),
        })
    }

    /// Build the chain client and signer described by `config`.
    pub fn from_config(
        config: &ProviderConfig,
        session: Arc<dyn SessionManager>,
    ) -> Result<Self, SetupError> {
        let chain: Arc<dyn ChainRpc> = Arc::new(ChainClient::new(config.chain.clone())?);
        let signer: Arc<dyn DigestSigner> = match config.signer.kind {
            SignerKind::Local => Arc::new(LocalSigner::from_env(&config.signer.private_key_env)?),
            SignerKind::Remote => {
                let url = config
                    .signer
                    .remote_url
                    .clone()
                    .ok_or_else(|| SetupError::Config("signer.remote_url is required".into()))?;
                let address: Address = config
                    .signer
                    .remote_address
                    .as_deref()
                    .ok_or_else(|| SetupError::Config("signer.remote_address is required".into()))?
                    .parse()
                    .map_err(|e| SetupError::Config(format!("signer.remote_address: {}", e)))?;
                Arc::new(RemoteSigner::new(
                    url,
                    address,
                    session.clone(),
                    Duration::from_secs(config.relay.request_timeout_secs),
                )?)
            }
        };
        Self::new(config, session, chain, signer)
    }

    /// Handle one JSON-RPC request.
    pub async fn request(&self, args: RequestArguments) -> Result<Value, JsonRpcError> {
        let params = args.params.unwrap_or(Value::Null);
        let result = self.inner.dispatch(&args.method, params).await;

        let label = if WALLET_METHODS.contains(&args.method.as_str())
            || passthrough::is_passthrough(&args.method)
        {
            args.method.clone()
        } else {
            "unsupported".to_string()
        };
        metrics::record_provider_request(label, result.is_ok());

        if let Err(e) = &result {
            tracing::debug!(method = %args.method, code = e.code, error = %e.message, "Request failed");
        }
        result
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.events.subscribe()
    }

    /// Cached wallet address, if accounts have been requested.
    pub fn address(&self) -> Option<Address> {
        self.inner.cached_address()
    }

    pub fn chain_id(&self) -> ChainId {
        self.inner.chain_id
    }

    /// Next nonce of the connected wallet in `space` (configured space if `None`).
    pub async fn nonce(&self, space: Option<U256>) -> Result<EncodedNonce, JsonRpcError> {
        let wallet = self.inner.require_address()?;
        let space = space.unwrap_or_else(|| self.inner.pipeline.space());
        Ok(get_nonce(self.inner.chain.as_ref(), wallet, space).await?)
    }

    /// Current relay status of a submitted transaction.
    pub async fn relayed_transaction(&self, relay_id: &str) -> Result<RelayerTransaction, JsonRpcError> {
        Ok(self.inner.relay.im_get_transaction_by_hash(relay_id).await?)
    }

    pub fn confirmation_policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Stop listening to session events.
    pub fn dispose(&self) {
        if let Ok(mut task) = self.event_task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::debug!("Provider disposed");
            }
        }
    }
}

impl Drop for WalletRelayProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for WalletRelayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRelayProvider")
            .field("chain_id", &self.inner.chain_id)
            .field("address", &self.inner.cached_address())
            .field("relay", &self.inner.relay)
            .finish()
    }
}

async fn forward_session_events(inner: Weak<Inner>, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(provider) = inner.upgrade() else { break };
                provider.on_session_event(event);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Session events lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

impl Inner {
    fn cached_address(&self) -> Option<Address> {
        self.address.load_full().map(|address| *address)
    }

    fn require_address(&self) -> Result<Address, JsonRpcError> {
        self.cached_address().ok_or_else(JsonRpcError::unauthorized)
    }

    /// Store `address` and announce it, unless it is already the stored one.
    fn set_address(&self, address: Option<Address>) {
        let previous = self.address.swap(address.map(Arc::new));
        if previous.as_deref().copied() == address {
            return;
        }
        self.events
            .emit(ProviderEvent::AccountsChanged(address.into_iter().collect()));
    }

    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::LoggedOut => {
                tracing::info!("Session ended; clearing accounts");
                self.set_address(None);
            }
            SessionEvent::LoggedIn(user) => {
                if let Some(address) = user.wallet_address {
                    self.set_address(Some(address));
                }
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        match method {
            "eth_requestAccounts" => {
                let address = self.request_accounts().await?;
                Ok(Value::Array(vec![address_value(address)]))
            }
            "eth_accounts" => Ok(Value::Array(
                self.cached_address().into_iter().map(address_value).collect(),
            )),
            "eth_sendTransaction" => self.send_transaction(params).await,
            "personal_sign" => self.personal_sign(params).await,
            "eth_signTypedData" | "eth_signTypedData_v4" => self.sign_typed_data(params).await,
            m if passthrough::is_passthrough(m) => {
                passthrough::forward(self.chain.as_ref(), m, params).await
            }
            other => Err(JsonRpcError::unsupported_method(other)),
        }
    }

    async fn request_accounts(&self) -> Result<Address, JsonRpcError> {
        if let Some(address) = self.cached_address() {
            return Ok(address);
        }

        let flow = Flow::start("eth_requestAccounts");
        let user = self.session.login().await?;
        flow.identify(&user.sub);

        let address = match user.wallet_address {
            Some(address) => address,
            None => {
                flow.add_event("registerWallet");
                self.registration
                    .register(self.signer.as_ref(), self.session.as_ref(), &user.access_token)
                    .await?
            }
        };

        self.set_address(Some(address));
        flow.add_event("accountsConnected");
        Ok(address)
    }

    async fn send_transaction(&self, params: Value) -> Result<Value, JsonRpcError> {
        let wallet = self.require_address()?;
        let request: TransactionRequest = serde_json::from_value(first_param(params)?)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid transaction request: {}", e)))?;

        let flow = Flow::start("eth_sendTransaction");
        let hash = self.pipeline.send(wallet, &request, &flow).await?;
        Ok(Value::String(hash))
    }

    async fn personal_sign(&self, params: Value) -> Result<Value, JsonRpcError> {
        let wallet = self.require_address()?;
        let params = param_list(params)?;

        let message = params
            .first()
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| JsonRpcError::invalid_params("personal_sign requires a message"))?;
        check_from_address(params.get(1), wallet)?;

        let signature = self.relay.im_sign(wallet, message, self.chain_id).await?;
        Ok(Value::String(signature))
    }

    async fn sign_typed_data(&self, params: Value) -> Result<Value, JsonRpcError> {
        let wallet = self.require_address()?;
        let params = param_list(params)?;

        check_from_address(params.first(), wallet)?;
        let typed_data = match params.get(1) {
            Some(Value::String(raw)) if !raw.is_empty() => serde_json::from_str(raw)
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid typed data: {}", e)))?,
            Some(Value::Object(fields)) if !fields.is_empty() => Value::Object(fields.clone()),
            _ => return Err(JsonRpcError::invalid_params("eth_signTypedData requires a typed data payload")),
        };

        if let Some(chain_id) = typed_data.get("domain").and_then(|d| d.get("chainId")) {
            let requested = parse_chain_id(chain_id)?;
            if requested != self.chain_id.0 {
                return Err(JsonRpcError::invalid_params(format!(
                    "Typed data chainId {} does not match the provider chain {}",
                    requested, self.chain_id
                )));
            }
        }

        let signature = self
            .relay
            .im_sign_typed_data(wallet, &typed_data, self.chain_id)
            .await?;
        Ok(Value::String(signature))
    }
}

fn address_value(address: Address) -> Value {
    Value::String(address.to_checksum(None))
}

fn param_list(params: Value) -> Result<Vec<Value>, JsonRpcError> {
    match params {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(JsonRpcError::invalid_params(format!(
            "Expected an array of params, got {}",
            other
        ))),
    }
}

fn first_param(params: Value) -> Result<Value, JsonRpcError> {
    param_list(params)?
        .into_iter()
        .next()
        .ok_or_else(|| JsonRpcError::invalid_params("Missing transaction request"))
}

/// A supplied `from` address must be the connected wallet.
fn check_from_address(param: Option<&Value>, wallet: Address) -> Result<(), JsonRpcError> {
    let Some(value) = param else { return Ok(()) };
    let address: Address = value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| JsonRpcError::invalid_params("Invalid address parameter"))?;
    if address != wallet {
        return Err(JsonRpcError::invalid_params(format!(
            "Address {} is not the connected wallet",
            address
        )));
    }
    Ok(())
}

fn parse_chain_id(value: &Value) -> Result<u64, JsonRpcError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    };
    parsed.ok_or_else(|| JsonRpcError::invalid_params(format!("Invalid typed data chainId {}", value)))
}

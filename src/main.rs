//! wallet-relay CLI
//!
//! Drives a [`WalletRelayProvider`] from the command line: connect the wallet,
//! read its nonce, send a relayed transaction, sign messages, and forward raw
//! JSON-RPC requests.
//!
//! # Architecture Overview
//!
//! ```text
//!   wallet-relay <command>
//!        │
//!        ▼
//!  ┌──────────────────────────────────────────────────────────────────┐
//!  │                     WalletRelayProvider                          │
//!  │                                                                  │
//!  │  eth_requestAccounts ──▶ session ──▶ registration                │
//!  │                                                                  │
//!  │  eth_sendTransaction ──▶ builder ──▶ signing ──▶ relay ──▶ poll  │
//!  │                          (nonce)     (signer)   (submit)         │
//!  │                                                                  │
//!  │  eth_* reads ─────────▶ chain RPC                                │
//!  │                                                                  │
//!  │  ┌────────────────────────────────────────────────────────────┐  │
//!  │  │  config │ logging │ metrics │ flows │ retries              │  │
//!  │  └────────────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use wallet_relay::config::{load_config, ProviderConfig};
use wallet_relay::observability::{init_logging, metrics};
use wallet_relay::provider::{RequestArguments, WalletRelayProvider};
use wallet_relay::session::{StaticSession, User};

const ACCESS_TOKEN_ENV: &str = "WALLET_RELAY_ACCESS_TOKEN";

#[derive(Parser)]
#[command(name = "wallet-relay")]
#[command(about = "Send relayed transactions from a smart-contract wallet", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "wallet-relay.toml")]
    config: PathBuf,

    /// Session access token (falls back to WALLET_RELAY_ACCESS_TOKEN)
    #[arg(long)]
    access_token: Option<String>,

    /// Wallet address already registered for this user
    #[arg(long)]
    wallet: Option<Address>,

    /// Session subject identifier
    #[arg(long, default_value = "cli")]
    sub: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print the wallet address
    Accounts,
    /// Print the wallet's next nonce
    Nonce {
        #[arg(long)]
        space: Option<U256>,
    },
    /// Send a transaction through the relay and wait for its hash
    Send {
        #[arg(long)]
        to: Address,
        #[arg(long, default_value = "0x")]
        data: Bytes,
        #[arg(long)]
        value: Option<U256>,
    },
    /// Sign a message with the wallet
    SignMessage { message: String },
    /// Show the relay status of a submitted transaction
    Status { relay_id: String },
    /// Send a raw JSON-RPC request to the provider
    Request {
        method: String,
        /// JSON array of params
        params: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let config = if config_found {
        load_config(&cli.config)?
    } else {
        ProviderConfig::default()
    };

    init_logging(&config.observability);
    if !config_found {
        tracing::warn!(path = %cli.config.display(), "Config file not found; using defaults");
    }

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let access_token = cli
        .access_token
        .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
        .unwrap_or_default();
    let session = Arc::new(StaticSession::new(User {
        sub: cli.sub,
        access_token,
        email: None,
        wallet_address: cli.wallet,
    }));

    let provider = WalletRelayProvider::from_config(&config, session)?;
    tracing::info!(chain_id = %provider.chain_id(), "wallet-relay starting");

    let output = run(&provider, cli.command).await;
    provider.dispose();

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

async fn run(
    provider: &WalletRelayProvider,
    command: Commands,
) -> Result<Value, Box<dyn std::error::Error>> {
    match command {
        Commands::Accounts => Ok(connect(provider).await?),
        Commands::Nonce { space } => {
            connect(provider).await?;
            let nonce = provider.nonce(space).await?;
            Ok(json!({
                "space": nonce.space().to_string(),
                "sequence": nonce.sequence().to_string(),
                "encoded": nonce.pack().to_string(),
            }))
        }
        Commands::Send { to, data, value } => {
            connect(provider).await?;
            let policy = provider.confirmation_policy();
            tracing::info!(
                %to,
                max_wait_secs = policy.interval.as_secs() * u64::from(policy.max_attempts),
                "Sending transaction"
            );
            let tx = json!({ "to": to, "data": data, "value": value.unwrap_or_default() });
            Ok(provider
                .request(RequestArguments::new("eth_sendTransaction", Some(json!([tx]))))
                .await?)
        }
        Commands::SignMessage { message } => {
            let accounts = connect(provider).await?;
            Ok(provider
                .request(RequestArguments::new(
                    "personal_sign",
                    Some(json!([message, accounts[0]])),
                ))
                .await?)
        }
        Commands::Status { relay_id } => {
            let tx = provider.relayed_transaction(&relay_id).await?;
            Ok(serde_json::to_value(tx)?)
        }
        Commands::Request { method, params } => {
            let params = params.map(|raw| serde_json::from_str::<Value>(&raw)).transpose()?;
            Ok(provider.request(RequestArguments::new(method, params)).await?)
        }
    }
}

async fn connect(provider: &WalletRelayProvider) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(provider
        .request(RequestArguments::new("eth_requestAccounts", None))
        .await?)
}

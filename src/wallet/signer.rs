//! Digest signing strategies.
//!
//! The pipeline only sees [`DigestSigner`]; which key backs it is decided when
//! the provider is built.
//!
//! # Security
//! - Local private keys are loaded from hex or an environment variable
//! - Keys and access tokens are never logged or serialized

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::metrics;
use crate::session::SessionManager;
use crate::wallet::signature::SignatureScheme;

/// Errors produced while obtaining a signature.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Invalid private key format or missing key material.
    #[error("Key error: {0}")]
    Key(String),

    /// Local ECDSA signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The remote signer needs a session and there is none.
    #[error("No active session for remote signing")]
    NoSession,

    /// Remote signing service failed or returned garbage.
    #[error("Remote signer error: {0}")]
    Remote(String),
}

/// Produces signatures over 32-byte digests and raw messages.
#[async_trait]
pub trait DigestSigner: Send + Sync {
    /// EOA address of the signing key.
    async fn address(&self) -> Result<Address, SignerError>;

    /// Sign a payload digest; returns the raw signature bytes.
    async fn sign_digest(&self, digest: B256) -> Result<Bytes, SignerError>;

    /// Sign an arbitrary message with the personal-message prefix.
    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, SignerError>;

    /// How the wallet contract should verify signatures from this signer.
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::EthSign
    }
}

/// Signer backed by an in-process private key.
#[derive(Clone)]
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    /// Create a signer from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, SignerError> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SignerError::Key(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Local signer initialized");
        Ok(Self { signer })
    }

    /// Load the private key from the environment variable `var_name`.
    pub fn from_env(var_name: &str) -> Result<Self, SignerError> {
        let private_key = std::env::var(var_name).map_err(|_| {
            SignerError::Key(format!("Environment variable {} not set", var_name))
        })?;

        Self::from_private_key(&private_key)
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.signer.address())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl DigestSigner for LocalSigner {
    async fn address(&self) -> Result<Address, SignerError> {
        Ok(self.signer.address())
    }

    /// Signs `keccak256("\x19Ethereum Signed Message:\n32" ‖ digest)`.
    async fn sign_digest(&self, digest: B256) -> Result<Bytes, SignerError> {
        self.sign_message(digest.as_slice()).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, SignerError> {
        let signature = self
            .signer
            .sign_message(message)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        metrics::record_signature("local");
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

#[derive(Serialize)]
struct SignDigestRequest {
    address: Address,
    digest: B256,
}

#[derive(Serialize)]
struct SignMessageRequest<'a> {
    address: Address,
    message: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

/// Signer backed by a remote identity service bound to the user's session.
pub struct RemoteSigner {
    http: reqwest::Client,
    base_url: String,
    address: Address,
    session: Arc<dyn SessionManager>,
}

impl RemoteSigner {
    pub fn new(
        base_url: impl Into<String>,
        address: Address,
        session: Arc<dyn SessionManager>,
        timeout: Duration,
    ) -> Result<Self, SignerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignerError::Remote(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            address,
            session,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Bytes, SignerError> {
        let user = self.session.current_user().await.ok_or(SignerError::NoSession)?;

        let response = self
            .http
            .post(format!("{}/v1/{}", self.base_url, path))
            .bearer_auth(&user.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| SignerError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SignerError::Remote(format!(
                "signing service returned {}: {}",
                status, text
            )));
        }

        let parsed: SignResponse = response
            .json()
            .await
            .map_err(|e| SignerError::Remote(format!("invalid signing response: {}", e)))?;
        let raw = alloy::hex::decode(&parsed.signature)
            .map_err(|e| SignerError::Remote(format!("signature is not hex: {}", e)))?;

        metrics::record_signature("remote");
        Ok(raw.into())
    }
}

#[async_trait]
impl DigestSigner for RemoteSigner {
    async fn address(&self) -> Result<Address, SignerError> {
        Ok(self.address)
    }

    async fn sign_digest(&self, digest: B256) -> Result<Bytes, SignerError> {
        let body = SignDigestRequest {
            address: self.address,
            digest,
        };
        self.post("sign", &body).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, SignerError> {
        let message = String::from_utf8_lossy(message);
        let body = SignMessageRequest {
            address: self.address,
            message: &message,
        };
        self.post("sign-message", &body).await
    }
}

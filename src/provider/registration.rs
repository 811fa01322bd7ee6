//! Counterfactual wallet registration.
//!
//! A user without a wallet on the configured chain proves control of the
//! signing key by signing [`ONBOARDING_MESSAGE`]; the registration service
//! replies with the wallet's counterfactual address.

use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ChainConfig, RegistrationConfig};
use crate::relay::types::preview_body;
use crate::session::SessionManager;
use crate::wallet::signer::{DigestSigner, SignerError};

/// Message signed to prove key ownership during registration.
pub const ONBOARDING_MESSAGE: &str = "Only sign this message from Immutable Passport";

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("Registration request failed: {0}")]
    Http(String),

    #[error("Registration service returned HTTP {status}: {preview}")]
    Status { status: u16, preview: String },

    #[error("Invalid registration response: {0}")]
    Response(String),
}

#[derive(Debug, Serialize)]
struct RegistrationRequest {
    ethereum_address: Address,
    ethereum_signature: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    counterfactual_address: Address,
}

/// Client for `POST {base}/v1/counterfactual-address/{chain_name}`.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    url: String,
}

impl RegistrationClient {
    pub fn new(config: &RegistrationConfig, chain: &ChainConfig) -> Result<Self, RegistrationError> {
        let http = reqwest::Client::builder()
            .timeout(REGISTRATION_TIMEOUT)
            .build()
            .map_err(|e| RegistrationError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: format!(
                "{}/v1/counterfactual-address/{}",
                config.base_url.trim_end_matches('/'),
                chain.chain_name
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Register the signer's key and return the user's wallet address.
    pub async fn register(
        &self,
        signer: &dyn DigestSigner,
        session: &dyn SessionManager,
        access_token: &str,
    ) -> Result<Address, RegistrationError> {
        let ethereum_address = signer.address().await?;
        let signature = signer.sign_message(ONBOARDING_MESSAGE.as_bytes()).await?;

        let body = RegistrationRequest {
            ethereum_address,
            ethereum_signature: alloy::hex::encode_prefixed(&signature),
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistrationError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RegistrationError::Http(e.to_string()))?;
        if status >= 300 {
            return Err(RegistrationError::Status {
                status,
                preview: preview_body(&text),
            });
        }

        let parsed: RegistrationResponse = serde_json::from_str(&text)
            .map_err(|e| RegistrationError::Response(e.to_string()))?;

        tracing::info!(
            signer = %ethereum_address,
            wallet = %parsed.counterfactual_address,
            "Registered wallet"
        );
        session.refresh_in_background().await;

        Ok(parsed.counterfactual_address)
    }
}

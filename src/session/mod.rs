//! Session boundary.
//!
//! Authentication (login UI, token refresh, identity provider) lives outside
//! this crate. The provider only needs the access token and the user's
//! chain wallet address, plus a stream of login/logout notifications.
//!
//! # Data Flow
//! ```text
//! SessionManager (external)
//!     → current_user()/login() → User { access_token, wallet_address }
//!     → subscribe() → SessionEvent::{LoggedIn, LoggedOut}
//!         → WalletRelayProvider event task → ProviderEvent::AccountsChanged
//! ```

pub mod memory;

use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::StaticSession;

/// Session errors surfaced by a [`SessionManager`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("login failed: {0}")]
    Login(String),

    #[error("user rejected the login request")]
    Rejected,
}

/// An authenticated user as seen by this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// Stable subject identifier.
    pub sub: String,
    /// Bearer token for relay, signer and registration calls.
    pub access_token: String,
    pub email: Option<String>,
    /// Counterfactual wallet address on the configured chain, once registered.
    pub wallet_address: Option<Address>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("sub", &self.sub)
            .field("access_token", &"[REDACTED]")
            .field("email", &self.email)
            .field("wallet_address", &self.wallet_address)
            .finish()
    }
}

/// Login state notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(User),
    LoggedOut,
}

/// Source of sessions and access tokens.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Current user without prompting; `None` when logged out.
    async fn current_user(&self) -> Option<User>;

    /// Return the current user, logging in if there is no session.
    async fn login(&self) -> Result<User, SessionError>;

    /// Re-fetch user claims without blocking the caller.
    async fn refresh_in_background(&self);

    /// Subscribe to login/logout notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

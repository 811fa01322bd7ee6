//! In-memory session used by the CLI and tests.

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::session::{SessionError, SessionEvent, SessionManager, User};

/// A session whose user is supplied up front (e.g. an access token from the
/// environment) instead of an interactive login.
pub struct StaticSession {
    profile: RwLock<User>,
    active: RwLock<Option<User>>,
    events: broadcast::Sender<SessionEvent>,
}

impl StaticSession {
    /// Create a logged-out session that logs in as `user`.
    pub fn new(user: User) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            profile: RwLock::new(user),
            active: RwLock::new(None),
            events,
        }
    }

    /// Create a session that is already logged in as `user`.
    pub fn logged_in(user: User) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            profile: RwLock::new(user.clone()),
            active: RwLock::new(Some(user)),
            events,
        }
    }

    /// End the session and notify subscribers.
    pub async fn logout(&self) {
        self.active.write().await.take();
        let _ = self.events.send(SessionEvent::LoggedOut);
        tracing::info!("Session logged out");
    }

    /// Record the wallet address assigned to the user.
    pub async fn set_wallet_address(&self, address: Address) {
        self.profile.write().await.wallet_address = Some(address);
        if let Some(user) = self.active.write().await.as_mut() {
            user.wallet_address = Some(address);
        }
    }
}

#[async_trait]
impl SessionManager for StaticSession {
    async fn current_user(&self) -> Option<User> {
        self.active.read().await.clone()
    }

    async fn login(&self) -> Result<User, SessionError> {
        if let Some(user) = self.current_user().await {
            return Ok(user);
        }
        let user = self.profile.read().await.clone();
        if user.access_token.is_empty() {
            return Err(SessionError::Login("no access token configured".to_string()));
        }
        *self.active.write().await = Some(user.clone());
        let _ = self.events.send(SessionEvent::LoggedIn(user.clone()));
        tracing::info!(sub = %user.sub, "Session logged in");
        Ok(user)
    }

    async fn refresh_in_background(&self) {
        tracing::debug!("Static session has no remote claims to refresh");
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

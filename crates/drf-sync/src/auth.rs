//! # Token Lifecycle Manager
//!
//! Owns the in-memory token pair for one run. Decides whether to log in,
//! refresh or reuse, and persists every token it receives.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Token Lifecycle States                            │
//! │                                                                         │
//! │   persisted token loads?                                                │
//! │      no ──► ┌──────────┐  ensure_authenticated  ┌────────────────┐      │
//! │             │ NoToken  │───────────────────────►│ Authenticating │      │
//! │             └──────────┘◄──────── failure ──────└───────┬────────┘      │
//! │                                                         │ 200          │
//! │      yes ─────────────────────────────────────┐         ▼              │
//! │                                               └─►┌───────────────┐     │
//! │                         ┌───────── 200 ─────────►│ Authenticated │     │
//! │                         │                        └───────┬───────┘     │
//! │                 ┌───────┴──────┐   refresh() / 401       │             │
//! │                 │  Refreshing  │◄────────────────────────┘             │
//! │                 └───────┬──────┘                                        │
//! │                         │ 401 ──► Authenticating (full re-login)       │
//! │                         │ 403 ──► warn, AuthError                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! All token reads and writes go through one `tokio::sync::Mutex`, held for
//! the duration of a login or refresh call. A reactive refresh first checks,
//! under the lock, that the access token it was handed is still current;
//! if another fetch already replaced it, nothing is sent.

use std::sync::Arc;

use drf_core::Token;
use secrecy::SecretString;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::{SyncError, SyncResult};
use crate::token_store::TokenStore;

// =============================================================================
// Credentials
// =============================================================================

/// Username and password for `POST token/`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

/// Source of credentials, consulted only when a login is needed.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> SyncResult<Credentials>;
}

/// Fixed credentials, for automation and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        StaticCredentials(Credentials::new(username, password))
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> SyncResult<Credentials> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Where the lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::NoToken => write!(f, "no_token"),
            AuthState::Authenticating => write!(f, "authenticating"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Refreshing => write!(f, "refreshing"),
        }
    }
}

/// Token lifecycle manager.
pub struct TokenLifecycle {
    client: ApiClient,
    credentials: Arc<dyn CredentialProvider>,
    store: Option<TokenStore>,
    token: Mutex<Option<Token>>,
    state: watch::Sender<AuthState>,
}

impl TokenLifecycle {
    /// Creates the manager, starting from the persisted token if one loads.
    pub fn new(
        client: ApiClient,
        credentials: Arc<dyn CredentialProvider>,
        store: Option<TokenStore>,
    ) -> Self {
        let token = store.as_ref().and_then(TokenStore::load);
        let initial = if token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::NoToken
        };
        debug!(state = %initial, "Token lifecycle initialised");

        TokenLifecycle {
            client,
            credentials,
            store,
            token: Mutex::new(token),
            state: watch::Sender::new(initial),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Logs in if there is no token yet.
    pub async fn ensure_authenticated(&self) -> SyncResult<()> {
        let mut slot = self.token.lock().await;
        if slot.is_none() {
            *slot = Some(self.login().await?);
        }
        Ok(())
    }

    /// Current access token, logging in first if needed.
    pub async fn access_token(&self) -> SyncResult<String> {
        let mut slot = self.token.lock().await;
        match slot.as_ref() {
            Some(token) => Ok(token.access.clone()),
            None => {
                let token = self.login().await?;
                let access = token.access.clone();
                *slot = Some(token);
                Ok(access)
            }
        }
    }

    /// `Bearer <access>`, or `None` while unauthenticated.
    pub async fn auth_header(&self) -> Option<String> {
        self.token.lock().await.as_ref().map(Token::bearer)
    }

    /// Snapshot of the current token pair.
    pub async fn current_token(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// A 401 from the refresh endpoint falls through to a full login. With no
    /// token at all this is a plain login.
    pub async fn refresh(&self) -> SyncResult<()> {
        let mut slot = self.token.lock().await;
        self.refresh_locked(&mut slot).await
    }

    /// Best-effort refresh of an existing token. Failures are logged only.
    pub async fn try_refresh(&self) {
        let mut slot = self.token.lock().await;
        if slot.is_none() {
            return;
        }
        if let Err(e) = self.refresh_locked(&mut slot).await {
            warn!(error = %e, "Opportunistic token refresh failed");
        }
    }

    /// Reacts to a 401 on a request made with `rejected_access`.
    ///
    /// Refreshes exactly once unless another caller already replaced the
    /// rejected token.
    pub async fn recover_from_rejection(&self, rejected_access: &str) -> SyncResult<()> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            if token.access != rejected_access {
                debug!("Access token already replaced, skipping refresh");
                return Ok(());
            }
        }
        info!("Access token rejected, refreshing");
        self.refresh_locked(&mut slot).await
    }

    // =========================================================================
    // Transitions (caller holds the token lock)
    // =========================================================================

    async fn refresh_locked(&self, slot: &mut Option<Token>) -> SyncResult<()> {
        let Some(token) = slot.as_mut() else {
            *slot = Some(self.login().await?);
            return Ok(());
        };

        self.state.send_replace(AuthState::Refreshing);
        match self.client.refresh_access(&token.refresh).await {
            Ok(access) => {
                token.access = access;
                self.persist(token);
                self.state.send_replace(AuthState::Authenticated);
                info!("Access token refreshed");
                Ok(())
            }
            Err(SyncError::Auth { status: 401, .. }) => {
                info!("Refresh token rejected, logging in again");
                *slot = None;
                self.forget();
                *slot = Some(self.login().await?);
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(AuthState::Authenticated);
                Err(e)
            }
        }
    }

    async fn login(&self) -> SyncResult<Token> {
        self.state.send_replace(AuthState::Authenticating);

        // Providers may block on a terminal prompt.
        let provider = Arc::clone(&self.credentials);
        let credentials = tokio::task::spawn_blocking(move || provider.credentials())
            .await
            .unwrap_or_else(|e| Err(SyncError::Credentials(e.to_string())));

        let result = match credentials {
            Ok(credentials) => {
                info!(username = %credentials.username, "Requesting API token");
                self.client.obtain_token(&credentials).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(token) => {
                self.persist(&token);
                self.state.send_replace(AuthState::Authenticated);
                info!("Authenticated with API");
                Ok(token)
            }
            Err(e) => {
                self.state.send_replace(AuthState::NoToken);
                Err(e)
            }
        }
    }

    /// Drops the persisted token so a failed re-login leaves nothing stale.
    fn forget(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(path = ?store.path(), error = %e, "Could not remove stale token file");
            }
        }
    }

    fn persist(&self, token: &Token) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(token) {
                warn!(path = ?store.path(), error = %e, "Could not persist token");
            }
        }
    }
}

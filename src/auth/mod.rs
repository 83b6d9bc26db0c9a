//! Session lifecycle: restore, login, OAuth exchange and logout
//!
//! [`SessionManager`] is the only writer of the persisted token and of the
//! shared [`AuthHeader`]. Every successful sign-in writes in the same order:
//! token store, then header, then user, so an observer that sees a user can
//! rely on the token already being in place.

mod session;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{AuthApi, OAuthProvider, RegisterResponse, User};
use crate::error::Error;
use crate::fetch::AuthHeader;
use crate::persist::TokenStore;
use crate::router::{Navigator, HOME_PATH, LOGIN_PATH};

pub use session::*;

/// Session lifecycle errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// The stored token was rejected; the session has been cleared
    #[error("session restore failed: {0}")]
    RestoreFailed(#[source] Box<Error>),

    /// The API answered without a token or without a user
    #[error("malformed auth response: {0}")]
    MalformedResponse(String),

    #[error("OAuth code exchange failed: {0}")]
    OAuthExchangeFailed(#[source] Box<Error>),

    #[error("login failed: {0}")]
    LoginFailed(#[source] Box<Error>),

    #[error("registration failed: {0}")]
    RegistrationFailed(#[source] Box<Error>),

    /// A logout happened while the call was in flight; its response was discarded
    #[error("session changed while the request was in flight")]
    Superseded,

    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Owns authentication state and its lifecycle
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn TokenStore>,
    auth_header: AuthHeader,
    navigator: Option<Arc<dyn Navigator>>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
}

impl SessionManager {
    /// Create a manager. `auth_header` must be the cell the HTTP client reads.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn TokenStore>, auth_header: AuthHeader) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            api,
            store,
            auth_header,
            navigator: None,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Route logout and OAuth completion through `navigator`
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Current snapshot
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receive a fresh snapshot on every change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    /// Bearer token currently attached to requests
    pub fn token(&self) -> Option<String> {
        self.auth_header.token()
    }

    fn update<F: FnOnce(&mut SessionState)>(&self, f: F) {
        self.state.send_modify(f);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        if self.generation() == generation {
            return true;
        }
        warn!("Discarding session response issued before the last logout");
        false
    }

    fn clear_credentials(&self) {
        if let Err(err) = self.store.clear() {
            warn!("Failed to remove persisted token: {}", err);
        }
        self.auth_header.set(None);
    }

    /// Persist, attach, then publish
    fn establish(&self, token: String, user: User) -> Result<User, AuthError> {
        if let Err(err) = self.store.save(&token) {
            self.update(|s| {
                s.loading = false;
                s.error = Some("Could not save session".to_string());
            });
            return Err(AuthError::Storage(err));
        }
        self.auth_header.set(Some(token));
        info!("Signed in as user {}", user.id);
        self.update(|s| {
            s.user = Some(user.clone());
            s.has_token = true;
            s.initialized = true;
            s.loading = false;
            s.error = None;
        });
        Ok(user)
    }

    fn fail(&self, message: &str) {
        self.update(|s| {
            s.loading = false;
            s.error = Some(message.to_string());
        });
    }

    /// Restore a session from the persisted token.
    ///
    /// Returns `Ok(None)` when no token is stored. A rejected token is
    /// removed and reported as [`AuthError::RestoreFailed`]. Either way the
    /// session is initialized afterwards.
    pub async fn restore(&self) -> Result<Option<User>, AuthError> {
        let generation = self.generation();

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(err) => {
                warn!("Could not read persisted token: {}", err);
                self.update(|s| s.initialized = true);
                return Err(AuthError::Storage(err));
            }
        };

        let token = match stored {
            Some(token) => token,
            None => {
                debug!("No persisted token, starting signed out");
                self.update(|s| {
                    s.user = None;
                    s.has_token = false;
                    s.initialized = true;
                    s.loading = false;
                });
                return Ok(None);
            }
        };

        self.auth_header.set(Some(token));
        self.update(|s| {
            s.has_token = true;
            s.loading = true;
        });

        let result = self.api.current_user().await;
        if !self.is_current(generation) {
            return Err(AuthError::Superseded);
        }

        match result {
            Ok(user) => {
                info!("Restored session for user {}", user.id);
                self.update(|s| {
                    s.user = Some(user.clone());
                    s.initialized = true;
                    s.loading = false;
                    s.error = None;
                });
                Ok(Some(user))
            }
            Err(err) => {
                warn!("Stored token rejected, clearing session: {}", err);
                self.clear_credentials();
                self.update(|s| {
                    s.user = None;
                    s.has_token = false;
                    s.initialized = true;
                    s.loading = false;
                });
                Err(AuthError::RestoreFailed(Box::new(err)))
            }
        }
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let generation = self.generation();
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self.api.login(email, password).await;
        if !self.is_current(generation) {
            return Err(AuthError::Superseded);
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("Login rejected: {}", err);
                self.fail("Login failed");
                return Err(AuthError::LoginFailed(Box::new(err)));
            }
        };

        let token = match response.access_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                self.fail("Login failed");
                return Err(AuthError::MalformedResponse(
                    "login response has no access token".to_string(),
                ));
            }
        };
        let user = match response.user {
            Some(user) => user,
            None => {
                self.fail("Login failed");
                return Err(AuthError::MalformedResponse(
                    "login response has no user".to_string(),
                ));
            }
        };

        self.establish(token, user)
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse, AuthError> {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.api.register(email, password).await {
            Ok(response) => {
                info!("Registered account for {}", email);
                self.update(|s| s.loading = false);
                Ok(response)
            }
            Err(err) => {
                warn!("Registration rejected: {}", err);
                self.fail("Registration failed");
                Err(AuthError::RegistrationFailed(Box::new(err)))
            }
        }
    }

    /// Finish an OAuth flow.
    ///
    /// When the callback omits the user, it is looked up with the new token
    /// before anything is stored.
    pub async fn exchange_oauth_code(
        &self,
        code: &str,
        provider: OAuthProvider,
    ) -> Result<User, AuthError> {
        let generation = self.generation();
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self.api.oauth_callback(code, provider).await;
        if !self.is_current(generation) {
            return Err(AuthError::Superseded);
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!("OAuth exchange with {} failed: {}", provider, err);
                self.fail("Authentication failed");
                return Err(AuthError::OAuthExchangeFailed(Box::new(err)));
            }
        };

        let token = match response.access_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                self.fail("Authentication failed");
                return Err(AuthError::MalformedResponse(
                    "OAuth callback response has no token".to_string(),
                ));
            }
        };

        let user = match response.user {
            Some(user) => user,
            None => self.identify_for(generation, &token).await?,
        };

        let user = self.establish(token, user)?;
        self.navigate(HOME_PATH);
        Ok(user)
    }

    /// Adopt a token handed over directly, as the development OAuth redirect does
    pub async fn sign_in_with_token(&self, token: &str) -> Result<User, AuthError> {
        let generation = self.generation();
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let user = self.identify_for(generation, token).await?;
        self.establish(token.to_string(), user)
    }

    async fn identify_for(&self, generation: u64, token: &str) -> Result<User, AuthError> {
        let result = self.api.identify(token).await;
        if !self.is_current(generation) {
            return Err(AuthError::Superseded);
        }
        result.map_err(|err| {
            warn!("Could not identify the new token: {}", err);
            self.fail("Authentication failed");
            AuthError::OAuthExchangeFailed(Box::new(err))
        })
    }

    /// Sign out. Always succeeds.
    ///
    /// Resets `initialized`, so the next guarded navigation restores again.
    pub fn logout(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_credentials();
        self.state.send_replace(SessionState::default());
        info!("Signed out");
        self.navigate(LOGIN_PATH);
    }

    /// The server rejected the current token on some other call
    pub fn handle_unauthorized(&self) {
        if !self.auth_header.is_set() {
            return;
        }
        warn!("Token rejected by the server, clearing session");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_credentials();
        self.update(|s| {
            s.user = None;
            s.has_token = false;
            s.initialized = true;
            s.loading = false;
        });
        self.navigate(LOGIN_PATH);
    }

    fn navigate(&self, path: &str) {
        if let Some(navigator) = &self.navigator {
            navigator.navigate(path);
        }
    }
}

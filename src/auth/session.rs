//! Observable session state

use serde::Serialize;

use crate::api::User;

/// Snapshot of the session as views see it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// The signed-in identity; `Some` only while a token is held
    pub user: Option<User>,

    /// Whether a bearer token is currently attached to outgoing requests
    pub has_token: bool,

    /// Set once a restore attempt has finished, whatever its outcome
    pub initialized: bool,

    /// A network-bound session call is in flight
    pub loading: bool,

    /// Message for the last failed login, registration or OAuth exchange
    pub error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }
}

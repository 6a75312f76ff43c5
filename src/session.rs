//! Session - the signed-in identity, shared by every store.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{BackendError, ErrorKind};

/// The authenticated user as seen by the data layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    /// Bearer token for the backend; `None` falls back to the anon key.
    pub access_token: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Shared handle to the current identity. Clones observe the same session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    current: Arc<RwLock<Option<Identity>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        let session = Self::new();
        session.sign_in(identity);
        session
    }

    pub fn sign_in(&self, identity: Identity) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    pub fn sign_out(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|identity| identity.user_id)
    }

    pub fn access_token(&self) -> Option<String> {
        self.current().and_then(|identity| identity.access_token)
    }

    /// The current identity, or `Unauthorized` when signed out.
    pub fn require(&self) -> Result<Identity, BackendError> {
        self.current()
            .ok_or_else(|| BackendError::new(ErrorKind::Unauthorized, "sign in required"))
    }
}

//! StoreContext - the dependencies every feature store shares.

use std::sync::Arc;

use tracing::warn;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::{StoreError, StoreResult};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::session::{Identity, Session};
use crate::storage::StorageUrls;

#[derive(Clone)]
pub struct StoreContext {
    pub backend: Arc<dyn Backend>,
    pub session: Session,
    pub notifier: Arc<dyn Notifier>,
    pub storage: StorageUrls,
    pub config: ClientConfig,
}

impl StoreContext {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        Self {
            backend,
            session: Session::new(),
            notifier: Arc::new(TracingNotifier),
            storage: StorageUrls::new(config.storage_url.clone()),
            config,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// The signed-in identity, or an `Unauthorized` store error.
    pub fn require_user(&self) -> StoreResult<Identity> {
        Ok(self.session.require()?)
    }

    pub fn user_id(&self) -> Option<String> {
        self.session.user_id()
    }

    /// Notify the outcome of a user action and pass the result through.
    ///
    /// Successes use `success`; failures use the error's user message.
    pub fn report<T>(&self, action: &str, success: &str, result: StoreResult<T>) -> StoreResult<T> {
        match &result {
            Ok(_) => self.notifier.notify(&Notification::success(success)),
            Err(err) => {
                warn!(action, error = %err, "store operation failed");
                self.notifier.notify(&Notification::error(err.user_message()));
            }
        }
        result
    }

    /// Notify a failure only; silent operations (fetches, toggles) use this.
    pub fn report_failure<T>(&self, action: &str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            warn!(action, error = %err, "store operation failed");
            self.notifier.notify(&Notification::error(err.user_message()));
        }
        result
    }
}

/// Reject blank required text before any remote call.
pub(crate) fn require_text(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(format!("{} is required", field)));
    }
    Ok(())
}

//! User-facing notifications (toasts) raised by store operations.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Success => write!(f, "[ok] {}", self.message),
            Level::Error => write!(f, "[error] {}", self.message),
        }
    }
}

/// Sink for notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        match notification.level {
            Level::Success => info!(message = %notification.message, "notification"),
            Level::Error => error!(message = %notification.message, "notification"),
        }
    }
}

/// Collects notifications in a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferNotifier {
    buffer: Arc<Mutex<Vec<Notification>>>,
}

impl BufferNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<Notification>>>) -> Self {
        Self { buffer }
    }

    /// Everything received so far, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for BufferNotifier {
    fn notify(&self, notification: &Notification) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
    }
}

#[cfg(feature = "emitter")]
pub use self::emitter::EmitterNotifier;

#[cfg(feature = "emitter")]
mod emitter {
    use std::sync::{Mutex, PoisonError};

    use event_emitter_rs::EventEmitter;
    use tracing::warn;

    use super::{Notification, Notifier};

    /// Event name used for every emitted notification.
    pub const EVENT: &str = "notification";

    /// Emits notifications as JSON strings on an [`EventEmitter`] for
    /// in-process subscribers. Listeners run on the emitter's threads.
    pub struct EmitterNotifier {
        emitter: Mutex<EventEmitter>,
    }

    impl EmitterNotifier {
        pub fn new(emitter: EventEmitter) -> Self {
            Self {
                emitter: Mutex::new(emitter),
            }
        }
    }

    impl Notifier for EmitterNotifier {
        fn notify(&self, notification: &Notification) {
            let payload = match serde_json::to_string(notification) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "cannot encode notification");
                    return;
                }
            };
            self.emitter
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .emit(EVENT, payload);
        }
    }
}

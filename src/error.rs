use std::fmt;

use thiserror::Error;

/// Failure categories surfaced by the backend contract.
///
/// Every low-level failure is classified into one of these before it reaches
/// a store; stores turn them into notifications with [`ErrorKind::user_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Zero rows where one was expected.
    NotFound,
    /// No valid session, or the session expired.
    Unauthorized,
    /// A row-level policy rejected the operation.
    Forbidden,
    /// Unique-constraint violation.
    Duplicate,
    /// Foreign-key violation, usually a delete of a still-referenced row.
    ReferentialConflict,
    /// Unexpected or missing table/column, or a row that does not decode.
    SchemaMismatch,
    /// The request never produced a backend response.
    Network,
    Unknown,
}

impl ErrorKind {
    /// Classify a backend error code (Postgres SQLSTATE or PostgREST `PGRST*`).
    pub fn from_code(code: &str) -> Option<ErrorKind> {
        let kind = match code {
            "PGRST116" => ErrorKind::NotFound,
            "23505" => ErrorKind::Duplicate,
            "23503" => ErrorKind::ReferentialConflict,
            "42P01" | "42703" | "PGRST200" | "PGRST204" | "PGRST205" => ErrorKind::SchemaMismatch,
            "42501" => ErrorKind::Forbidden,
            "PGRST301" | "PGRST302" | "PGRST303" => ErrorKind::Unauthorized,
            _ => return None,
        };
        Some(kind)
    }

    /// Classify an HTTP status when the body carried no usable code.
    pub fn from_status(status: u16) -> ErrorKind {
        match status {
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 | 406 => ErrorKind::NotFound,
            409 => ErrorKind::Duplicate,
            _ => ErrorKind::Unknown,
        }
    }

    /// Short, human-readable text for notifications.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "It looks like this no longer exists.",
            ErrorKind::Unauthorized => "Please sign in to continue.",
            ErrorKind::Forbidden => "You don't have permission to do that.",
            ErrorKind::Duplicate => "That already exists.",
            ErrorKind::ReferentialConflict => {
                "This is still in use elsewhere and can't be removed."
            }
            ErrorKind::SchemaMismatch => "The app is out of date with the server.",
            ErrorKind::Network => "Network problem, check your connection.",
            ErrorKind::Unknown => "Something went wrong.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::ReferentialConflict => "referential conflict",
            ErrorKind::SchemaMismatch => "schema mismatch",
            ErrorKind::Network => "network error",
            ErrorKind::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// A classified failure from a [`Backend`](crate::Backend) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw backend code, when the backend reported one.
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{}:{}", collection, id))
    }

    /// Build an error from a backend response: the code wins, status is the fallback.
    pub fn classify(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        let kind = code
            .and_then(ErrorKind::from_code)
            .unwrap_or_else(|| ErrorKind::from_status(status));
        let error = Self::new(kind, message);
        match code {
            Some(code) => error.with_code(code),
            None => error,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Error returned by store operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Input rejected before any remote call was made.
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            StoreError::Backend(err) => Some(err.kind),
            StoreError::Invalid(_) => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            StoreError::Backend(err) => err.kind.user_message().to_string(),
            StoreError::Invalid(reason) => reason.clone(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

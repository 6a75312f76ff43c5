//! Client configuration sourced from environment variables.

use thiserror::Error;

pub const BACKEND_URL_VAR: &str = "CARSOCIAL_BACKEND_URL";
pub const ANON_KEY_VAR: &str = "CARSOCIAL_ANON_KEY";
pub const STORAGE_URL_VAR: &str = "CARSOCIAL_STORAGE_URL";
pub const PAGE_SIZE_VAR: &str = "CARSOCIAL_PAGE_SIZE";
pub const RECONCILE_VAR: &str = "CARSOCIAL_RECONCILE";

const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_RECONCILE: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    // Base URL of the hosted backend, without the `/rest/v1` suffix.
    pub backend_url: String,
    // Publishable key sent with every request.
    pub anon_key: String,
    // Base URL for public object URLs; defaults to the backend URL.
    pub storage_url: String,
    // Upper bound on rows fetched by a list operation.
    pub page_size: usize,
    // Refetch a store after a successful create so server defaults show up.
    pub reconcile_after_write: bool,
}

impl ClientConfig {
    pub fn new(backend_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        Self {
            storage_url: backend_url.clone(),
            backend_url,
            anon_key: anon_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
            reconcile_after_write: DEFAULT_RECONCILE,
        }
    }

    /// Config for tests and in-memory use; nothing is ever contacted.
    pub fn local() -> Self {
        Self::new("http://localhost:54321", "local-anon-key")
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_reconcile(mut self, reconcile: bool) -> Self {
        self.reconcile_after_write = reconcile;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend_url = get(BACKEND_URL_VAR).ok_or(ConfigError::Missing(BACKEND_URL_VAR))?;
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: BACKEND_URL_VAR,
                value: backend_url,
            });
        }
        let anon_key = get(ANON_KEY_VAR).ok_or(ConfigError::Missing(ANON_KEY_VAR))?;

        let mut config = Self::new(backend_url, anon_key);
        if let Some(storage_url) = get(STORAGE_URL_VAR) {
            config.storage_url = storage_url.trim_end_matches('/').to_string();
        }
        if let Some(value) = get(PAGE_SIZE_VAR) {
            config.page_size = match value.parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: PAGE_SIZE_VAR,
                        value,
                    })
                }
            };
        }
        if let Some(value) = get(RECONCILE_VAR) {
            config.reconcile_after_write = parse_bool(&value).ok_or(ConfigError::Invalid {
                var: RECONCILE_VAR,
                value,
            })?;
        }
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

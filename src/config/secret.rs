//! API key resolution.
//!
//! The key is read from the environment first, then from a flat TOML secrets file
//! (`KEY = "value"`), the same layout hosted notebooks use for their secrets.

use log::{ info, warn };
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::ChatError;

pub const DEFAULT_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// Bearer token for the completion provider. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Read-only secrets file. A missing or malformed file holds no secrets.
pub struct TomlSecretStore {
    path: PathBuf,
}

impl TomlSecretStore {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Option<toml::Table> {
        if !self.path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read secrets file {}: {}", self.path.display(), e);
                return None;
            }
        };
        match content.parse::<toml::Table>() {
            Ok(table) => Some(table),
            Err(e) => {
                warn!("Failed to parse secrets file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl SecretStore for TomlSecretStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load()?
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::to_owned)
    }
}

pub struct CredentialResolver {
    var: String,
    store: Box<dyn SecretStore>,
}

impl CredentialResolver {
    pub fn new(var: impl Into<String>, store: Box<dyn SecretStore>) -> Self {
        Self { var: var.into(), store }
    }

    pub fn resolve(&self) -> Result<ApiKey, ChatError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Same as [`resolve`](Self::resolve) with the environment lookup supplied by the caller.
    pub fn resolve_with<F>(&self, env: F) -> Result<ApiKey, ChatError>
        where F: Fn(&str) -> Option<String>
    {
        if let Some(key) = env(&self.var).filter(|k| !k.trim().is_empty()) {
            info!("API key loaded from environment variable {}", self.var);
            return Ok(ApiKey(key.trim().to_string()));
        }
        if let Some(key) = self.store.get(&self.var).filter(|k| !k.trim().is_empty()) {
            info!("API key loaded from secret store");
            return Ok(ApiKey(key.trim().to_string()));
        }
        Err(ChatError::MissingCredential { var: self.var.clone() })
    }
}

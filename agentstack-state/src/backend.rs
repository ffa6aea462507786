//! State backend trait and error types

use std::collections::HashMap;

use agentstack_core::resource::Value;
use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("State is locked: {0}")]
    Locked(Box<LockInfo>),

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// Refuses to overwrite state recorded for a different stack
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked(Box::new(lock.clone()))
    }

    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the recorded state, with locking for concurrent writers
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the recorded state; `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state. Callers bump the serial first.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Take the lock, or fail while another unexpired lock is held
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    /// Release a lock taken by [`StateBackend::acquire_lock`]
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove a lock by id, whoever holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;

    /// Prepare the storage location
    async fn init(&self) -> BackendResult<()>;
}

/// Configuration for a state backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type (e.g., "local")
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    /// Local backend storing state at `path`
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            backend_type: "local".to_string(),
            attributes: HashMap::from([("path".to_string(), Value::String(path.into()))]),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_describes_holder() {
        let lock = LockInfo::new("record");
        let error = BackendError::locked(&lock);

        assert!(error.to_string().starts_with("State is locked: record by "));
        assert!(matches!(error, BackendError::Locked(ref held) if held.id == lock.id));
    }

    #[test]
    fn local_config_carries_path() {
        let config = BackendConfig::local("agent.state.json");
        assert_eq!(config.backend_type, "local");
        assert_eq!(config.get_string("path"), Some("agent.state.json"));
        assert_eq!(config.get_string("bucket"), None);
    }
}

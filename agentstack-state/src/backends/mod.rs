//! Backend implementations for state storage

mod local;

pub use local::LocalBackend;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};

/// Create a backend from configuration, dispatching on its type
pub async fn create_backend(config: &BackendConfig) -> BackendResult<Box<dyn StateBackend>> {
    match config.backend_type.as_str() {
        "local" => {
            let backend = LocalBackend::from_config(config)?;
            log::debug!("using local state at {}", backend.state_path().display());
            Ok(Box::new(backend))
        }
        other => Err(BackendError::unsupported_backend(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_unsupported_backend() {
        let config = BackendConfig {
            backend_type: "s3".to_string(),
            attributes: HashMap::new(),
        };

        match create_backend(&config).await {
            Err(BackendError::UnsupportedBackend(name)) => assert_eq!(name, "s3"),
            _ => panic!("Expected UnsupportedBackend error"),
        }
    }

    #[tokio::test]
    async fn test_local_backend_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.state.json");
        let backend = create_backend(&BackendConfig::local(path.display().to_string()))
            .await
            .unwrap();

        assert!(backend.read_state().await.unwrap().is_none());
    }
}

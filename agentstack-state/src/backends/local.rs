//! Local file backend
//!
//! State is a pretty-printed JSON file; the lock is a sibling `.lock` file
//! created exclusively, so two writers cannot both take it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "agentstack.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self { state_path, lock_path }
    }

    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        let path = match config.attributes.get("path") {
            None => PathBuf::from(Self::DEFAULT_STATE_FILE),
            Some(value) => value
                .as_str()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| BackendError::configuration("local backend 'path' must be a non-empty string"))?,
        };
        Ok(Self::with_path(path))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        match tokio::fs::read_to_string(&self.lock_path).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| BackendError::InvalidState(format!("Failed to parse lock file: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io(&self.lock_path, e)),
        }
    }

    async fn create_lock_file(&self, lock: &LockInfo) -> BackendResult<()> {
        let content = serde_json::to_string_pretty(lock)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
            .map_err(|e| BackendError::io(&self.lock_path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| BackendError::io(&self.lock_path, e))?;
        file.flush().await.map_err(|e| BackendError::io(&self.lock_path, e))
    }

    async fn remove_lock_file(&self) -> BackendResult<()> {
        tokio::fs::remove_file(&self.lock_path)
            .await
            .map_err(|e| BackendError::io(&self.lock_path, e))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match tokio::fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::io(&self.state_path, e)),
        };
        let state: StateFile = serde_json::from_str(&content)
            .map_err(|e| BackendError::InvalidState(format!("Failed to parse state file: {}", e)))?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(BackendError::InvalidState(format!(
                "state file version {} is newer than supported version {}",
                state.version,
                StateFile::CURRENT_VERSION
            )));
        }
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(existing) = self.read_state().await?
            && existing.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: existing.lineage,
                actual: state.lineage.clone(),
            });
        }

        let content = serde_json::to_string_pretty(state)?;
        // Write then rename, so a reader never sees half a file
        let staging = self.state_path.with_extension("json.tmp");
        tokio::fs::write(&staging, content)
            .await
            .map_err(|e| BackendError::io(&staging, e))?;
        tokio::fs::rename(&staging, &self.state_path)
            .await
            .map_err(|e| BackendError::io(&self.state_path, e))?;

        log::debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        if let Some(existing) = self.read_lock().await? {
            if !existing.is_expired() {
                return Err(BackendError::locked(&existing));
            }
            log::warn!("taking over expired lock {}", existing);
            self.remove_lock_file().await?;
        }

        let lock = LockInfo::new(operation);
        match self.create_lock_file(&lock).await {
            Ok(()) => Ok(lock),
            // Lost a race with another writer
            Err(BackendError::Io { source, .. }) if source.kind() == ErrorKind::AlreadyExists => {
                match self.read_lock().await? {
                    Some(holder) => Err(BackendError::locked(&holder)),
                    None => Err(BackendError::LockNotFound(lock.id)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;
        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        self.remove_lock_file().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock_id.to_string()))?;
        if existing.id != lock_id {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }
        log::warn!("force-unlocking {}", existing);
        self.remove_lock_file().await
    }

    async fn init(&self) -> BackendResult<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(parent, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentstack_core::resource::Value;
    use chrono::Duration;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_backend_read_write() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        assert!(backend.read_state().await.unwrap().is_none());

        let mut state = StateFile::new();
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let read = backend.read_state().await.unwrap().unwrap();
        assert_eq!(read.serial, 1);
        assert_eq!(read.lineage, state.lineage);
    }

    #[tokio::test]
    async fn test_local_backend_locking() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let lock = backend.acquire_lock("record").await.unwrap();
        assert!(backend.lock_path().exists());

        let err = backend.acquire_lock("record").await.unwrap_err();
        assert!(matches!(err, BackendError::Locked(ref held) if held.id == lock.id));

        backend.release_lock(&lock).await.unwrap();
        let again = backend.acquire_lock("record").await.unwrap();
        backend.release_lock(&again).await.unwrap();
        assert!(!backend.lock_path().exists());
    }

    #[tokio::test]
    async fn expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let stale = LockInfo::with_timeout("record", Duration::seconds(-1));
        backend.create_lock_file(&stale).await.unwrap();

        let lock = backend.acquire_lock("record").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn release_with_wrong_lock_fails() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let lock = backend.acquire_lock("record").await.unwrap();

        let other = LockInfo::new("record");
        assert!(matches!(
            backend.release_lock(&other).await,
            Err(BackendError::LockMismatch { .. })
        ));
        backend.force_unlock(&lock.id).await.unwrap();
        assert!(matches!(
            backend.force_unlock(&lock.id).await,
            Err(BackendError::LockNotFound(_))
        ));
    }

    #[tokio::test]
    async fn state_from_another_lineage_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        backend.write_state(&StateFile::new()).await.unwrap();

        let result = backend.write_state(&StateFile::new()).await;
        assert!(matches!(result, Err(BackendError::LineageMismatch { .. })));
    }

    #[tokio::test]
    async fn init_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("state/agent.state.json"));
        backend.init().await.unwrap();
        assert!(dir.path().join("state").is_dir());
    }

    #[test]
    fn test_local_backend_from_config() {
        let config = BackendConfig {
            backend_type: "local".to_string(),
            attributes: HashMap::new(),
        };
        let backend = LocalBackend::from_config(&config).unwrap();
        assert_eq!(backend.state_path(), Path::new("agentstack.state.json"));
        assert_eq!(backend.lock_path(), Path::new("agentstack.state.lock"));

        let config = BackendConfig {
            backend_type: "local".to_string(),
            attributes: HashMap::from([("path".to_string(), Value::Int(3))]),
        };
        assert!(LocalBackend::from_config(&config).is_err());
    }
}

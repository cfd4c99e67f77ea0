//! Durable storage for the signed-in session.
//!
//! Only the auth slice survives a restart; everything else is re-fetched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::models::user::Session;

const STORAGE_VERSION: u32 = 1;

#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, ClientError>;
    async fn save(&self, session: &Session) -> Result<(), ClientError>;
    async fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    version: u32,
    session: Session,
}

/// Keeps the session as a JSON document on disk.
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SessionStorage for FileSessionStorage {
    async fn load(&self) -> Result<Option<Session>, ClientError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ClientError::Storage(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_slice::<PersistedSession>(&raw) {
            Ok(persisted) if persisted.version == STORAGE_VERSION => {
                debug!(path = %self.path.display(), "restored persisted session");
                Ok(Some(persisted.session))
            }
            Ok(persisted) => {
                warn!(
                    path = %self.path.display(),
                    version = persisted.version,
                    "ignoring session stored by an incompatible version"
                );
                Ok(None)
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                ClientError::Storage(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let body = serde_json::to_vec_pretty(&PersistedSession {
            version: STORAGE_VERSION,
            session: session.clone(),
        })
        .map_err(|err| ClientError::Storage(format!("failed to encode session: {err}")))?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await.map_err(|err| {
            ClientError::Storage(format!("failed to write {}: {err}", temp.display()))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|err| {
            ClientError::Storage(format!("failed to replace {}: {err}", self.path.display()))
        })
    }

    async fn clear(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::Storage(format!(
                "failed to remove {}: {err}",
                self.path.display()
            ))),
        }
    }
}

#[derive(Default)]
pub struct MemorySessionStorage {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<(), ClientError> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        *self.session.lock().await = None;
        Ok(())
    }
}

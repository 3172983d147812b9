//! Filesystem-backed object storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "object_storage";

pub struct ObjectStorage {
    state: StateCell,
    root: PathBuf,
}

impl ObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            state: StateCell::new(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an object under `key`, creating intermediate directories.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), SubsystemError> {
        self.state.ensure_ready(NAME)?;
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_error)
    }

    /// Read an object. A missing key is `Ok(None)`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SubsystemError> {
        self.state.ensure_ready(NAME)?;
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    // Keys are relative, without `..` or root components.
    fn object_path(&self, key: &str) -> Result<PathBuf, SubsystemError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(SubsystemError::Failed {
                name: NAME,
                message: format!("invalid object key '{}'", key),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(source: std::io::Error) -> SubsystemError {
    SubsystemError::Io { name: NAME, source }
}

#[async_trait]
impl Subsystem for ObjectStorage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(io_error)?;
        self.state.mark_ready(NAME)?;
        tracing::info!(root = %self.root.display(), "Object storage ready");
        Ok(())
    }

    async fn close(&self) -> Result<(), SubsystemError> {
        self.state.mark_closed();
        Ok(())
    }
}

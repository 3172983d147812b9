//! Local function definitions.
//!
//! # Layout
//! ```text
//! functions/
//!     hello/index.ts      → slug "hello"
//!     billing/main.ts     → slug "billing"
//!     notes/README.md     → ignored (no entrypoint)
//! ```

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;

use super::{CloseTransition, StateCell, Subsystem, SubsystemError, SubsystemState};

const NAME: &str = "function_catalog";

/// Entrypoint file names, in lookup order.
pub const ENTRYPOINTS: [&str; 3] = ["index.ts", "index.js", "main.ts"];

/// One function found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDefinition {
    pub slug: String,
    pub entrypoint: String,
    pub source: String,
}

pub struct FunctionCatalog {
    state: StateCell,
    dir: PathBuf,
    definitions: RwLock<Vec<FunctionDefinition>>,
}

impl FunctionCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: StateCell::new(),
            dir: dir.into(),
            definitions: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of the loaded definitions, sorted by slug.
    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn scan(dir: &Path) -> Result<Vec<FunctionDefinition>, std::io::Error> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "Functions directory missing, catalog is empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let slug = entry.file_name().to_string_lossy().into_owned();
        if slug.starts_with('.') || slug.starts_with('_') {
            continue;
        }

        for candidate in ENTRYPOINTS {
            let path = entry.path().join(candidate);
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    found.push(FunctionDefinition {
                        slug: slug.clone(),
                        entrypoint: candidate.to_string(),
                        source,
                    });
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
    }

    found.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(found)
}

#[async_trait]
impl Subsystem for FunctionCatalog {
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> SubsystemState {
        self.state.get()
    }

    async fn initialize(&self) -> Result<(), SubsystemError> {
        let found = scan(&self.dir)
            .await
            .map_err(|source| SubsystemError::Io { name: NAME, source })?;
        let slugs: Vec<_> = found.iter().map(|f| f.slug.as_str()).collect();
        tracing::info!(dir = %self.dir.display(), functions = ?slugs, "Function catalog loaded");

        *self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner) = found;
        self.state.mark_ready(NAME)
    }

    async fn close(&self) -> Result<(), SubsystemError> {
        if self.state.mark_closed() == CloseTransition::Closed {
            self.definitions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scans_function_directories() {
        let dir = std::env::temp_dir().join(format!("gw-functions-{}", uuid::Uuid::new_v4()));
        for (slug, file) in [("hello", "index.ts"), ("billing", "main.ts"), ("notes", "README.md")] {
            tokio::fs::create_dir_all(dir.join(slug)).await.unwrap();
            tokio::fs::write(dir.join(slug).join(file), format!("// {}", slug))
                .await
                .unwrap();
        }
        tokio::fs::write(dir.join("stray.ts"), "x").await.unwrap();

        let catalog = FunctionCatalog::new(&dir);
        catalog.initialize().await.unwrap();

        let defs = catalog.definitions();
        let slugs: Vec<_> = defs.iter().map(|d| d.slug.as_str()).collect();
        assert_eq!(slugs, vec!["billing", "hello"]);
        assert_eq!(defs[1].entrypoint, "index.ts");
        assert_eq!(defs[1].source, "// hello");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_directory_is_empty_catalog() {
        let catalog = FunctionCatalog::new("/nonexistent/functions/dir");
        catalog.initialize().await.unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.state(), SubsystemState::Ready);
    }
}

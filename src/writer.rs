//! File write surface used when applying generated changes.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file (and missing parent directories) if absent.
    pub create: bool,
    /// Replace the contents of an existing file.
    pub overwrite: bool,
}

#[async_trait]
pub trait FileWriter: Send + Sync {
    async fn write_file(&self, path: &Path, contents: &[u8], options: WriteOptions) -> Result<()>;

    /// Remove `path`. A file that is already gone counts as deleted.
    async fn delete_file(&self, path: &Path) -> Result<()>;
}

/// Writes straight to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

#[async_trait]
impl FileWriter for FsWriter {
    async fn write_file(&self, path: &Path, contents: &[u8], options: WriteOptions) -> Result<()> {
        let exists = tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("failed to check {}", path.display()))?;
        if exists && !options.overwrite {
            anyhow::bail!("{} already exists", path.display());
        }
        if !exists {
            if !options.create {
                anyhow::bail!("{} does not exist", path.display());
            }
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CREATE_OVERWRITE: WriteOptions = WriteOptions {
        create: true,
        overwrite: true,
    };

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src/nested/a.ts");

        FsWriter
            .write_file(&path, b"export {};\n", CREATE_OVERWRITE)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "export {};\n");
    }

    #[tokio::test]
    async fn respects_overwrite_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "old").unwrap();
        let no_overwrite = WriteOptions {
            create: true,
            overwrite: false,
        };

        assert!(FsWriter.write_file(&path, b"new", no_overwrite).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");

        FsWriter.write_file(&path, b"new", CREATE_OVERWRITE).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn respects_create_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.ts");
        let no_create = WriteOptions {
            create: false,
            overwrite: true,
        };

        assert!(FsWriter.write_file(&path, b"x", no_create).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn deleting_missing_file_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.ts");
        std::fs::write(&path, "x").unwrap();

        FsWriter.delete_file(&path).await.unwrap();
        assert!(!path.exists());
        FsWriter.delete_file(&path).await.unwrap();
    }
}

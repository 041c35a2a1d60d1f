//! Mapping archive paths onto workspace folders.
//!
//! Single-folder workspaces receive archive paths relative to the folder.
//! Multi-root workspaces prefix each path with the owning folder's name, so the
//! folder is picked by the longest matching name prefix.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    /// Root directory of the folder on disk.
    pub uri: PathBuf,
    pub name: String,
    pub index: usize,
}

impl WorkspaceFolder {
    /// Folder rooted at `uri`, named after its last path component.
    pub fn from_root(uri: impl Into<PathBuf>, index: usize) -> Self {
        let uri = uri.into();
        let name = uri
            .file_name()
            .map_or_else(|| uri.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { uri, name, index }
    }
}

/// An archive path resolved against its owning folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub folder: WorkspaceFolder,
    /// The normalized archive path, folder prefix included. Unique across
    /// folders.
    pub archive_path: String,
    /// Forward-slash path inside `folder`.
    pub relative_path: String,
}

pub trait WorkspaceResolver: Send + Sync {
    fn resolve(&self, zip_file_path: &str) -> Result<ResolvedPath, ReconcileError>;
}

/// The configured workspace folders, in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceFolders {
    folders: Vec<WorkspaceFolder>,
}

impl WorkspaceFolders {
    /// Build folders from root directories, assigning indices in order.
    pub fn from_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let folders = roots
            .into_iter()
            .enumerate()
            .map(|(i, root)| WorkspaceFolder::from_root(root, i))
            .collect();
        Self { folders }
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.folders
    }

    fn owning_folder<'a>(&'a self, path: &'a str) -> Option<(&'a WorkspaceFolder, &'a str)> {
        if self.folders.len() < 2 {
            return None;
        }
        self.folders
            .iter()
            .filter_map(|folder| {
                let rest = path.strip_prefix(folder.name.as_str())?.strip_prefix('/')?;
                Some((folder, rest))
            })
            .max_by_key(|(folder, _)| folder.name.len())
    }
}

impl WorkspaceResolver for WorkspaceFolders {
    fn resolve(&self, zip_file_path: &str) -> Result<ResolvedPath, ReconcileError> {
        let path = normalize(zip_file_path)?;
        let Some(first) = self.folders.first() else {
            return Err(ReconcileError::NoWorkspaceFolders(zip_file_path.to_string()));
        };

        let (folder, relative) = self.owning_folder(&path).unwrap_or((first, path.as_str()));
        Ok(ResolvedPath {
            folder: folder.clone(),
            relative_path: relative.to_string(),
            archive_path: path.clone(),
        })
    }
}

/// Convert separators to `/`, drop `.` segments and reject paths that could
/// leave the workspace.
pub(crate) fn normalize(zip_file_path: &str) -> Result<String, ReconcileError> {
    let unified = zip_file_path.replace('\\', "/");
    if unified.trim().is_empty() {
        return Err(ReconcileError::EmptyPath);
    }
    let has_drive = unified.as_bytes().get(1) == Some(&b':');
    if unified.starts_with('/') || has_drive {
        return Err(ReconcileError::AbsolutePath(zip_file_path.to_string()));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ReconcileError::EscapingPath(zip_file_path.to_string())),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(ReconcileError::EmptyPath);
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn multi_root() -> WorkspaceFolders {
        WorkspaceFolders::from_roots(["/ws/app", "/ws/app-server", "/ws/lib"])
    }

    #[test]
    fn single_folder_keeps_full_path() {
        let folders = WorkspaceFolders::from_roots(["/ws/app"]);
        let resolved = folders.resolve("app/src/main.ts").unwrap();
        assert_eq!(resolved.folder.name, "app");
        assert_eq!(resolved.relative_path, "app/src/main.ts");
        assert_eq!(resolved.archive_path, "app/src/main.ts");
    }

    #[test]
    fn multi_root_picks_longest_prefix() {
        let resolved = multi_root().resolve("app-server/src/index.ts").unwrap();
        assert_eq!(resolved.folder.name, "app-server");
        assert_eq!(resolved.folder.index, 1);
        assert_eq!(resolved.relative_path, "src/index.ts");
        assert_eq!(resolved.archive_path, "app-server/src/index.ts");
    }

    #[test]
    fn multi_root_prefix_must_end_at_segment() {
        let resolved = multi_root().resolve("library/x.rs").unwrap();
        assert_eq!(resolved.folder.index, 0);
        assert_eq!(resolved.relative_path, "library/x.rs");
    }

    #[test]
    fn unmatched_path_falls_back_to_first_folder() {
        let resolved = multi_root().resolve("README.md").unwrap();
        assert_eq!(resolved.folder.name, "app");
        assert_eq!(resolved.relative_path, "README.md");
    }

    #[test]
    fn windows_separators_and_dot_segments_normalize() {
        let folders = WorkspaceFolders::from_roots(["/ws/app"]);
        let resolved = folders.resolve(".\\src\\./a.ts").unwrap();
        assert_eq!(resolved.relative_path, "src/a.ts");
        assert_eq!(resolved.archive_path, "src/a.ts");
    }

    #[test]
    fn rejects_malformed_paths() {
        let folders = WorkspaceFolders::from_roots(["/ws/app"]);
        assert_eq!(folders.resolve(""), Err(ReconcileError::EmptyPath));
        assert_eq!(folders.resolve("./"), Err(ReconcileError::EmptyPath));
        assert!(matches!(
            folders.resolve("/etc/passwd"),
            Err(ReconcileError::AbsolutePath(_))
        ));
        assert!(matches!(
            folders.resolve("C:/x.txt"),
            Err(ReconcileError::AbsolutePath(_))
        ));
        assert!(matches!(
            folders.resolve("src/../../x"),
            Err(ReconcileError::EscapingPath(_))
        ));
    }

    #[test]
    fn bare_folder_name_resolves_to_first_folder() {
        let resolved = multi_root().resolve("lib/").unwrap();
        assert_eq!(resolved.folder.index, 0);
        assert_eq!(resolved.relative_path, "lib");
    }

    #[test]
    fn no_folders_is_an_error() {
        let folders = WorkspaceFolders::default();
        assert_eq!(
            folders.resolve("a.ts"),
            Err(ReconcileError::NoWorkspaceFolders("a.ts".into()))
        );
    }
}

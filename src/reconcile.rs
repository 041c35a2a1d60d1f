//! Turning a result archive into file-change records.
//!
//! The server smuggles command-execution logs inside the archive at
//! [`RUN_COMMAND_LOG_PATH`]. That entry goes to the diagnostic sink and never
//! becomes a file change.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::protocol::{CodeReference, ResultArchive, UploadId};
use crate::workspace::{self, WorkspaceFolder, WorkspaceResolver};

/// Archive path the server uses for command-execution log text.
pub const RUN_COMMAND_LOG_PATH: &str = ".codegen/dev/run_command.log";

/// Scheme of [`VirtualLocation`]s.
pub const VIRTUAL_SCHEME: &str = "codegen-diff";

/// Synthetic address of a not-yet-applied change, namespaced by upload id.
///
/// Built from the normalized archive path, so files with the same relative
/// path in different workspace folders get distinct locations. Never a real
/// filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualLocation(String);

impl VirtualLocation {
    pub fn new(upload_id: &UploadId, archive_path: &str) -> Self {
        Self(format!("{VIRTUAL_SCHEME}:/{upload_id}/{archive_path}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VirtualLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub zip_file_path: String,
    pub file_content: String,
    pub relative_path: String,
    pub workspace_folder: WorkspaceFolder,
    pub virtual_location: VirtualLocation,
    pub change_applied: bool,
    pub rejected: bool,
}

impl FileChange {
    /// Where the change lands on disk.
    pub fn absolute_path(&self) -> PathBuf {
        self.workspace_folder.uri.join(&self.relative_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedFile {
    pub zip_file_path: String,
    pub relative_path: String,
    pub workspace_folder: WorkspaceFolder,
    pub change_applied: bool,
    pub rejected: bool,
}

impl DeletedFile {
    pub fn absolute_path(&self) -> PathBuf {
        self.workspace_folder.uri.join(&self.relative_path)
    }
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciled {
    pub file_changes: Vec<FileChange>,
    pub deleted_files: Vec<DeletedFile>,
    pub references: Vec<CodeReference>,
}

/// Receives log content diverted out of result archives.
pub trait DiagnosticSink: Send + Sync {
    fn log_info(&self, message: &str);
}

/// Forwards diverted content to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log_info(&self, message: &str) {
        tracing::info!(target: "codegen_session::run_command_log", "{message}");
    }
}

fn is_run_command_log(zip_file_path: &str) -> bool {
    workspace::normalize(zip_file_path).is_ok_and(|path| path == RUN_COMMAND_LOG_PATH)
}

/// Build file-change and deletion records for `archive`.
///
/// Pure apart from the diagnostic sink: the archive is not modified and the
/// same inputs always produce the same records, in archive order.
pub fn reconcile(
    archive: &ResultArchive,
    upload_id: &UploadId,
    resolver: &dyn WorkspaceResolver,
    diagnostics: &dyn DiagnosticSink,
) -> Result<Reconciled, ReconcileError> {
    let (logs, files): (Vec<_>, Vec<_>) = archive
        .new_file_contents
        .iter()
        .partition(|entry| is_run_command_log(&entry.zip_file_path));

    for log in logs {
        diagnostics.log_info(&format!(
            "run command log from code generation:\n{}",
            log.file_content
        ));
    }

    let file_changes = files
        .into_iter()
        .map(|entry| {
            let resolved = resolver.resolve(&entry.zip_file_path)?;
            Ok(FileChange {
                zip_file_path: entry.zip_file_path.clone(),
                file_content: entry.file_content.clone(),
                virtual_location: VirtualLocation::new(upload_id, &resolved.archive_path),
                relative_path: resolved.relative_path,
                workspace_folder: resolved.folder,
                change_applied: false,
                rejected: false,
            })
        })
        .collect::<Result<Vec<_>, ReconcileError>>()?;

    let deleted_files = archive
        .deleted_files
        .iter()
        .map(|path| {
            let resolved = resolver.resolve(path)?;
            Ok(DeletedFile {
                zip_file_path: path.clone(),
                relative_path: resolved.relative_path,
                workspace_folder: resolved.folder,
                change_applied: false,
                rejected: false,
            })
        })
        .collect::<Result<Vec<_>, ReconcileError>>()?;

    tracing::debug!(
        files = file_changes.len(),
        deleted = deleted_files.len(),
        references = archive.references.len(),
        "reconciled result archive"
    );

    Ok(Reconciled {
        file_changes,
        deleted_files,
        references: archive.references.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::NewFileContent;
    use crate::workspace::WorkspaceFolders;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn log_info(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn entry(path: &str, content: &str) -> NewFileContent {
        NewFileContent {
            zip_file_path: path.into(),
            file_content: content.into(),
        }
    }

    fn upload() -> UploadId {
        UploadId::from("upload-1")
    }

    fn folders() -> WorkspaceFolders {
        WorkspaceFolders::from_roots(["/ws/app"])
    }

    #[test]
    fn log_entry_is_diverted_and_excluded() {
        let archive = ResultArchive {
            new_file_contents: vec![entry(RUN_COMMAND_LOG_PATH, "X"), entry("a.ts", "Y")],
            ..Default::default()
        };
        let sink = RecordingSink::default();

        let out = reconcile(&archive, &upload(), &folders(), &sink).unwrap();

        assert_eq!(out.file_changes.len(), 1);
        assert_eq!(out.file_changes[0].zip_file_path, "a.ts");
        assert_eq!(out.file_changes[0].file_content, "Y");
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains('X'));
    }

    #[test]
    fn sink_untouched_without_log_entry() {
        let archive = ResultArchive {
            new_file_contents: vec![entry("a.ts", "Y")],
            ..Default::default()
        };
        let sink = RecordingSink::default();

        let out = reconcile(&archive, &upload(), &folders(), &sink).unwrap();

        assert_eq!(out.file_changes.len(), 1);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn log_entry_anywhere_in_archive_is_excluded() {
        let archive = ResultArchive {
            new_file_contents: vec![
                entry("a.ts", "1"),
                entry(RUN_COMMAND_LOG_PATH, "npm test output"),
                entry("b.ts", "2"),
            ],
            ..Default::default()
        };
        let sink = RecordingSink::default();

        let out = reconcile(&archive, &upload(), &folders(), &sink).unwrap();

        let paths: Vec<_> = out.file_changes.iter().map(|f| f.zip_file_path.as_str()).collect();
        assert_eq!(paths, ["a.ts", "b.ts"]);
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn records_carry_paths_and_virtual_location() {
        let archive = ResultArchive {
            new_file_contents: vec![entry("src/a.ts", "Y")],
            deleted_files: vec!["src/old.ts".into()],
            references: vec![CodeReference {
                license_name: Some("MIT".into()),
                repository: Some("example/repo".into()),
                url: None,
                recommendation_content_span: None,
            }],
        };

        let out = reconcile(&archive, &upload(), &folders(), &TracingSink).unwrap();

        let change = &out.file_changes[0];
        assert_eq!(change.relative_path, "src/a.ts");
        assert_eq!(change.workspace_folder.name, "app");
        assert_eq!(change.virtual_location.as_str(), "codegen-diff:/upload-1/src/a.ts");
        assert!(!change.change_applied);
        assert!(!change.rejected);

        assert_eq!(out.deleted_files.len(), 1);
        assert_eq!(out.deleted_files[0].relative_path, "src/old.ts");
        assert_eq!(out.references, archive.references);
    }

    #[test]
    fn log_entry_matches_after_normalization() {
        let archive = ResultArchive {
            new_file_contents: vec![
                entry("./.codegen/dev/run_command.log", "dotted"),
                entry(".codegen\\dev\\run_command.log", "backslashed"),
                entry("a.ts", "Y"),
            ],
            ..Default::default()
        };
        let sink = RecordingSink::default();

        let out = reconcile(&archive, &upload(), &folders(), &sink).unwrap();

        let paths: Vec<_> = out.file_changes.iter().map(|f| f.zip_file_path.as_str()).collect();
        assert_eq!(paths, ["a.ts"]);
        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("dotted"));
        assert!(messages[1].contains("backslashed"));
    }

    #[test]
    fn multi_root_virtual_locations_are_distinct() {
        let archive = ResultArchive {
            new_file_contents: vec![entry("app/src/a.ts", "1"), entry("lib/src/a.ts", "2")],
            ..Default::default()
        };
        let folders = WorkspaceFolders::from_roots(["/ws/app", "/ws/lib"]);

        let out = reconcile(&archive, &upload(), &folders, &TracingSink).unwrap();

        let [app, lib] = &out.file_changes[..] else {
            panic!("expected two changes, got {:?}", out.file_changes);
        };
        assert_eq!(app.relative_path, lib.relative_path);
        assert_eq!(app.virtual_location.as_str(), "codegen-diff:/upload-1/app/src/a.ts");
        assert_eq!(lib.virtual_location.as_str(), "codegen-diff:/upload-1/lib/src/a.ts");
        assert_eq!(app.absolute_path(), PathBuf::from("/ws/app/src/a.ts"));
        assert_eq!(lib.absolute_path(), PathBuf::from("/ws/lib/src/a.ts"));
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let archive = ResultArchive {
            new_file_contents: vec![entry("a.ts", "Y"), entry("b/c.ts", "Z")],
            deleted_files: vec!["d.ts".into()],
            references: vec![],
        };
        let before = archive.clone();

        let first = reconcile(&archive, &upload(), &folders(), &TracingSink).unwrap();
        let second = reconcile(&archive, &upload(), &folders(), &TracingSink).unwrap();

        assert_eq!(first, second);
        assert_eq!(archive, before);
    }

    #[test]
    fn malformed_entry_fails_reconciliation() {
        let archive = ResultArchive {
            new_file_contents: vec![entry("a.ts", "Y"), entry("../escape.ts", "Z")],
            ..Default::default()
        };

        let err = reconcile(&archive, &upload(), &folders(), &TracingSink).unwrap_err();
        assert_eq!(err, ReconcileError::EscapingPath("../escape.ts".into()));
    }

    #[test]
    fn unresolvable_deleted_file_fails() {
        let archive = ResultArchive {
            deleted_files: vec!["gone.ts".into()],
            ..Default::default()
        };

        let err =
            reconcile(&archive, &upload(), &WorkspaceFolders::default(), &TracingSink).unwrap_err();
        assert!(matches!(err, ReconcileError::NoWorkspaceFolders(_)));
    }
}

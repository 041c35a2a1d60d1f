use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Server-side scope for a sequence of generation requests.
    ConversationId
);
string_id!(
    /// Server-side identifier of the workspace snapshot submitted for generation.
    UploadId
);
string_id!(GenerationId);

/// Status of a generation job as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus {
    InProgress,
    Complete,
    Failed,
    Cancelled,
}

/// One answer to `get_generation_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: GenerationStatus,
    #[serde(default)]
    pub remaining_iteration_count: Option<u32>,
    #[serde(default)]
    pub total_iteration_count: Option<u32>,
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl StatusReport {
    pub fn in_progress() -> Self {
        Self::with_status(GenerationStatus::InProgress)
    }

    pub fn with_status(status: GenerationStatus) -> Self {
        Self {
            status,
            remaining_iteration_count: None,
            total_iteration_count: None,
            failure_code: None,
            failure_reason: None,
        }
    }

    /// Failure payload of a `Failed` report.
    pub fn failure(&self) -> GenerationFailure {
        GenerationFailure {
            code: self.failure_code.clone(),
            reason: self
                .failure_reason
                .clone()
                .unwrap_or_else(|| "the service reported a failed generation".to_string()),
        }
    }
}

/// What the service said when a generation ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub code: Option<String>,
    pub reason: String,
}

/// A file the server produced, keyed by its path inside the result archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileContent {
    pub zip_file_path: String,
    pub file_content: String,
}

/// Byte span of recommended content a reference applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpan {
    pub start: u32,
    pub end: u32,
}

/// Attribution for generated code that resembles licensed public code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReference {
    #[serde(default)]
    pub license_name: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub recommendation_content_span: Option<ContentSpan>,
}

/// The server's packaged diff for one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultArchive {
    #[serde(default)]
    pub new_file_contents: Vec<NewFileContent>,
    #[serde(default)]
    pub deleted_files: Vec<String>,
    #[serde(default)]
    pub references: Vec<CodeReference>,
}

/// Review state of a file from an earlier iteration, sent back to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReview {
    pub zip_file_path: String,
    pub rejected: bool,
    pub change_applied: bool,
}

/// Context sent with `start_generation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub message: String,
    /// Zero-based index of this iteration within the conversation.
    pub iteration: u32,
    pub prior_files: Vec<FileReview>,
    pub prior_deleted_files: Vec<FileReview>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn failure_defaults_reason() {
        let report = StatusReport::with_status(GenerationStatus::Failed);
        let failure = report.failure();
        assert_eq!(failure.code, None);
        assert!(failure.reason.contains("failed"));
    }

    #[test]
    fn archive_missing_fields_default() {
        let archive: ResultArchive =
            serde_json::from_str(r#"{"new_file_contents":[{"zip_file_path":"a.ts","file_content":"Y"}]}"#)
                .unwrap();
        assert_eq!(archive.new_file_contents.len(), 1);
        assert!(archive.deleted_files.is_empty());
        assert!(archive.references.is_empty());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ConversationId::from("conv-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"conv-1\"");
        assert_eq!(id.to_string(), "conv-1");
    }
}

use std::path::PathBuf;

/// Why an archive entry could not be turned into a file-change record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("workspace has no folders to resolve '{0}' against")]
    NoWorkspaceFolders(String),
    #[error("archive entry has an empty path")]
    EmptyPath,
    #[error("archive path '{0}' is absolute")]
    AbsolutePath(String),
    #[error("archive path '{0}' escapes its workspace folder")]
    EscapingPath(String),
}

/// Errors surfaced to the caller of `Session::send` and `State::interact`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Generation was requested before the conversation/upload handshake.
    #[error("conversation has not been started")]
    NotStarted,
    #[error("code generation timed out ({code})")]
    PollTimeout { code: String },
    #[error("code generation was cancelled")]
    PollCancelled,
    /// A remote call itself failed. Never retried inside this crate.
    #[error("remote call {operation} failed")]
    RemoteCallFailure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("code generation failed: {reason}")]
    GenerationFailed { code: Option<String>, reason: String },
    #[error("result archive could not be reconciled")]
    ReconciliationFailure(#[from] ReconcileError),
    #[error("no code generation iterations remain (of {total})")]
    IterationsExhausted { total: u32 },
    #[error("another interaction is already in flight for this session")]
    Busy,
    #[error("no file change recorded for '{0}'")]
    UnknownFile(String),
    #[error("failed to write {}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl SessionError {
    pub(crate) fn remote(operation: &'static str, source: anyhow::Error) -> Self {
        Self::RemoteCallFailure { operation, source }
    }

    /// Short machine-readable name of the error kind, for renderers and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::PollTimeout { .. } => "PollTimeout",
            Self::PollCancelled => "PollCancelled",
            Self::RemoteCallFailure { .. } => "RemoteCallFailure",
            Self::GenerationFailed { .. } => "GenerationFailed",
            Self::ReconciliationFailure(_) => "ReconciliationFailure",
            Self::IterationsExhausted { .. } => "IterationsExhausted",
            Self::Busy => "Busy",
            Self::UnknownFile(_) => "UnknownFile",
            Self::WriteFailure { .. } => "WriteFailure",
        }
    }
}

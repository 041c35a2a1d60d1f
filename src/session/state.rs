use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::SessionError;
use crate::poller::PollConfig;
use crate::protocol::{
    CodeReference, ConversationId, FileReview, GenerationId, GenerationRequest, GenerationService,
    UploadId,
};
use crate::reconcile::{DeletedFile, FileChange};
use crate::session::codegen::CodeGen;
use crate::session::hooks::Hooks;
use crate::workspace::WorkspaceResolver;

/// Identifiers obtained from the conversation/upload handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handshake {
    pub conversation_id: ConversationId,
    pub upload_id: UploadId,
}

/// Everything a state needs to talk to the service and place files.
#[derive(Clone)]
pub struct GenerationConfig {
    /// `None` until the handshake succeeds; generation cannot start without it.
    pub handshake: Option<Handshake>,
    pub workspace: Arc<dyn WorkspaceResolver>,
    pub service: Arc<dyn GenerationService>,
    pub poll: PollConfig,
    /// Local iteration budget used when the service reports no counts
    /// (0 = unlimited).
    pub max_iterations: u32,
}

impl GenerationConfig {
    pub fn new(
        workspace: Arc<dyn WorkspaceResolver>,
        service: Arc<dyn GenerationService>,
        settings: &Settings,
    ) -> Self {
        Self {
            handshake: None,
            workspace,
            service,
            poll: settings.poll_config(),
            max_iterations: settings.max_iterations,
        }
    }

    #[must_use]
    pub fn with_handshake(mut self, handshake: Handshake) -> Self {
        self.handshake = Some(handshake);
        self
    }

    pub(crate) fn require_handshake(&self) -> Result<&Handshake, SessionError> {
        self.handshake.as_ref().ok_or(SessionError::NotStarted)
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("handshake", &self.handshake)
            .field("poll", &self.poll)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

/// Data carried between iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationContext {
    /// Number of completed iterations, which is also the index of the next one.
    pub iteration: u32,
    pub file_changes: Vec<FileChange>,
    pub deleted_files: Vec<DeletedFile>,
    pub references: Vec<CodeReference>,
    pub remaining_iterations: Option<u32>,
    pub total_iterations: Option<u32>,
}

impl GenerationContext {
    /// Start-generation request for `message`, echoing the review state of
    /// files from the previous iteration.
    pub fn request(&self, message: &str) -> GenerationRequest {
        GenerationRequest {
            message: message.to_string(),
            iteration: self.iteration,
            prior_files: self
                .file_changes
                .iter()
                .map(|f| FileReview {
                    zip_file_path: f.zip_file_path.clone(),
                    rejected: f.rejected,
                    change_applied: f.change_applied,
                })
                .collect(),
            prior_deleted_files: self
                .deleted_files
                .iter()
                .map(|f| FileReview {
                    zip_file_path: f.zip_file_path.clone(),
                    rejected: f.rejected,
                    change_applied: f.change_applied,
                })
                .collect(),
        }
    }

    /// Mark the change or deletion at `zip_file_path`. Returns false if no
    /// record has that path.
    pub(crate) fn set_rejected(&mut self, zip_file_path: &str, rejected: bool) -> bool {
        let mut found = false;
        for change in self
            .file_changes
            .iter_mut()
            .filter(|f| f.zip_file_path == zip_file_path)
        {
            change.rejected = rejected;
            found = true;
        }
        for deleted in self
            .deleted_files
            .iter_mut()
            .filter(|f| f.zip_file_path == zip_file_path)
        {
            deleted.rejected = rejected;
            found = true;
        }
        found
    }

    /// Whether no further iteration may start.
    pub(crate) fn exhausted(&self, max_iterations: u32) -> bool {
        match self.remaining_iterations {
            Some(remaining) => remaining == 0,
            None => max_iterations != 0 && self.iteration >= max_iterations,
        }
    }
}

/// What one successful generation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub generation_id: GenerationId,
    /// Zero-based index of the iteration that produced this result.
    pub iteration: u32,
    pub file_changes: Vec<FileChange>,
    pub deleted_files: Vec<DeletedFile>,
    pub references: Vec<CodeReference>,
    pub remaining_iterations: Option<u32>,
    pub total_iterations: Option<u32>,
}

/// Returned to the caller of a successful interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interaction {
    pub result: GenerationResult,
    /// Whether the session accepts another message after this one.
    pub can_continue: bool,
}

/// A successful interaction together with the state that replaces the
/// current one.
#[derive(Debug)]
pub struct Step {
    pub interaction: Interaction,
    pub next_state: State,
}

/// Input to [`State::interact`].
#[derive(Debug, Clone, Copy)]
pub struct Action<'a> {
    pub message: &'a str,
    /// Owned by the caller; observed at every blocking point.
    pub token: &'a CancellationToken,
    pub hooks: &'a Hooks,
}

#[derive(Debug, Clone)]
pub enum State {
    ConversationNotStarted(ConversationNotStarted),
    PrepareCodeGen(PrepareCodeGen),
    CodeGen(CodeGen),
    /// No iterations remain.
    Complete(Complete),
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConversationNotStarted(_) => "ConversationNotStarted",
            Self::PrepareCodeGen(_) => "PrepareCodeGen",
            Self::CodeGen(_) => "CodeGen",
            Self::Complete(_) => "Complete",
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        match self {
            Self::ConversationNotStarted(s) => &s.config,
            Self::PrepareCodeGen(s) => &s.config,
            Self::CodeGen(s) => s.config(),
            Self::Complete(s) => &s.config,
        }
    }

    /// Files and counters known so far; `None` before the conversation starts.
    pub fn context(&self) -> Option<&GenerationContext> {
        match self {
            Self::ConversationNotStarted(_) => None,
            Self::PrepareCodeGen(s) => Some(&s.context),
            Self::CodeGen(s) => Some(s.context()),
            Self::Complete(s) => Some(&s.context),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub async fn interact(&self, action: Action<'_>) -> Result<Step, SessionError> {
        match self {
            Self::ConversationNotStarted(s) => s.interact(action),
            Self::PrepareCodeGen(s) => s.interact(action).await,
            Self::CodeGen(s) => s.interact(action).await,
            Self::Complete(s) => s.interact(action),
        }
    }

    /// Same state with `context` swapped in.
    #[must_use]
    pub(crate) fn with_context(&self, context: GenerationContext) -> Self {
        match self {
            Self::ConversationNotStarted(_) => self.clone(),
            Self::PrepareCodeGen(s) => Self::PrepareCodeGen(PrepareCodeGen {
                config: s.config.clone(),
                context,
            }),
            Self::CodeGen(s) => Self::CodeGen(CodeGen::new(s.config().clone(), context)),
            Self::Complete(s) => Self::Complete(Complete {
                config: s.config.clone(),
                context,
            }),
        }
    }

    /// Next state after an iteration that left `context` behind.
    pub(crate) fn after_iteration(config: GenerationConfig, context: GenerationContext) -> Self {
        if context.exhausted(config.max_iterations) {
            Self::Complete(Complete { config, context })
        } else {
            Self::PrepareCodeGen(PrepareCodeGen { config, context })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationNotStarted {
    pub config: GenerationConfig,
}

impl ConversationNotStarted {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    #[allow(clippy::unused_self)]
    fn interact(&self, _action: Action<'_>) -> Result<Step, SessionError> {
        Err(SessionError::NotStarted)
    }
}

/// Waiting for the next message; runs a [`CodeGen`] when one arrives.
#[derive(Debug, Clone)]
pub struct PrepareCodeGen {
    pub config: GenerationConfig,
    pub context: GenerationContext,
}

impl PrepareCodeGen {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            context: GenerationContext::default(),
        }
    }

    async fn interact(&self, action: Action<'_>) -> Result<Step, SessionError> {
        self.config.require_handshake()?;
        let detail = match self.context.total_iterations {
            Some(total) => format!("iteration {} of {total}", self.context.iteration + 1),
            None => format!("iteration {}", self.context.iteration + 1),
        };
        action.hooks.report("Preparing code generation", Some(&detail));

        CodeGen::new(self.config.clone(), self.context.clone())
            .interact(action)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct Complete {
    pub config: GenerationConfig,
    pub context: GenerationContext,
}

impl Complete {
    fn interact(&self, _action: Action<'_>) -> Result<Step, SessionError> {
        Err(SessionError::IterationsExhausted {
            total: self.context.total_iterations.unwrap_or(self.context.iteration),
        })
    }
}

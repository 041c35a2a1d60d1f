//! A code-generation session: one conversation, one current state.

mod codegen;
mod hooks;
mod state;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::protocol::{ConversationId, UploadId};
use crate::writer::{FileWriter, WriteOptions};

pub use codegen::CodeGen;
pub use hooks::{CompleteFn, ErrorFn, Hooks, ProgressFn};
pub use state::{
    Action, Complete, ConversationNotStarted, GenerationConfig, GenerationContext,
    GenerationResult, Handshake, Interaction, PrepareCodeGen, State, Step,
};

/// Counts from [`Session::insert_changes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    pub written: usize,
    pub deleted: usize,
    /// Records left alone because they were rejected.
    pub skipped: usize,
}

pub struct Session {
    tab_id: String,
    handshake: OnceLock<Handshake>,
    state: Mutex<Arc<State>>,
    latest_message: Mutex<Option<String>>,
    /// Held for the whole of `send`, `preloader` and `insert_changes`.
    interaction: tokio::sync::Mutex<()>,
}

impl Session {
    /// Session starting from `config`. A config that already carries a
    /// handshake resumes in `PrepareCodeGen`; otherwise the conversation still
    /// has to be started.
    pub fn new(tab_id: impl Into<String>, config: GenerationConfig) -> Self {
        let handshake = OnceLock::new();
        let state = match config.handshake.clone() {
            Some(existing) => {
                let _ = handshake.set(existing);
                State::PrepareCodeGen(PrepareCodeGen::new(config))
            }
            None => State::ConversationNotStarted(ConversationNotStarted::new(config)),
        };
        Self {
            tab_id: tab_id.into(),
            handshake,
            state: Mutex::new(Arc::new(state)),
            latest_message: Mutex::new(None),
            interaction: tokio::sync::Mutex::new(()),
        }
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    /// Snapshot of the current state. Later transitions do not affect it.
    pub fn state(&self) -> Arc<State> {
        Arc::clone(&lock(&self.state))
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.handshake.get().map(|h| &h.conversation_id)
    }

    pub fn upload_id(&self) -> Option<&UploadId> {
        self.handshake.get().map(|h| &h.upload_id)
    }

    pub fn latest_message(&self) -> Option<String> {
        lock(&self.latest_message).clone()
    }

    /// Start the conversation and register the upload.
    ///
    /// Runs once; after a successful call further calls only record
    /// `message`.
    pub async fn preloader(
        &self,
        message: &str,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _guard = self.interaction.try_lock().map_err(|_| SessionError::Busy)?;
        self.record_message(message);
        if self.handshake.get().is_some() {
            return Ok(());
        }

        let current = self.state();
        let config = current.config();
        let service = config.service.as_ref();
        let conversation_id = call_remote(token, "start_conversation", service.start_conversation())
            .await?;
        let upload_id =
            call_remote(token, "create_upload", service.create_upload(&conversation_id)).await?;
        let handshake = Handshake {
            conversation_id,
            upload_id,
        };
        tracing::info!(
            tab = %self.tab_id,
            conversation = %handshake.conversation_id,
            upload = %handshake.upload_id,
            "conversation started"
        );

        let next = State::PrepareCodeGen(PrepareCodeGen::new(
            config.clone().with_handshake(handshake.clone()),
        ));
        let _ = self.handshake.set(handshake);
        self.swap(&current, next);
        Ok(())
    }

    /// Send `message` to the current state.
    ///
    /// On success the state's successor becomes current; on any error the
    /// current state is left exactly as it was.
    pub async fn send(
        &self,
        message: &str,
        token: &CancellationToken,
        hooks: &Hooks,
    ) -> Result<Interaction, SessionError> {
        let _guard = self.interaction.try_lock().map_err(|_| SessionError::Busy)?;
        self.record_message(message);

        let current = self.state();
        let step = current
            .interact(Action {
                message,
                token,
                hooks,
            })
            .await?;
        self.swap(&current, step.next_state);
        Ok(step.interaction)
    }

    /// Mark the change or deletion recorded at `zip_file_path` as rejected or
    /// accepted.
    pub fn set_change_rejected(
        &self,
        zip_file_path: &str,
        rejected: bool,
    ) -> Result<(), SessionError> {
        let _guard = self.interaction.try_lock().map_err(|_| SessionError::Busy)?;
        let current = self.state();
        let mut context = current.context().cloned().ok_or(SessionError::NotStarted)?;
        if !context.set_rejected(zip_file_path, rejected) {
            return Err(SessionError::UnknownFile(zip_file_path.to_string()));
        }
        self.swap(&current, current.with_context(context));
        Ok(())
    }

    /// Write every accepted, not yet applied change through `writer` and
    /// delete accepted removals.
    ///
    /// Records are marked applied as they succeed. If a write fails, the
    /// progress made so far is kept and the failure is returned.
    pub async fn insert_changes(
        &self,
        writer: &dyn FileWriter,
    ) -> Result<InsertSummary, SessionError> {
        let _guard = self.interaction.try_lock().map_err(|_| SessionError::Busy)?;
        let current = self.state();
        let mut context = current.context().cloned().ok_or(SessionError::NotStarted)?;
        let mut summary = InsertSummary::default();
        let options = WriteOptions {
            create: true,
            overwrite: true,
        };

        let mut failure = None;
        for change in &mut context.file_changes {
            if change.change_applied {
                continue;
            }
            if change.rejected {
                summary.skipped += 1;
                continue;
            }
            let path = change.absolute_path();
            if let Err(source) = writer
                .write_file(&path, change.file_content.as_bytes(), options)
                .await
            {
                failure = Some(SessionError::WriteFailure { path, source });
                break;
            }
            change.change_applied = true;
            summary.written += 1;
        }
        if failure.is_none() {
            for deleted in &mut context.deleted_files {
                if deleted.change_applied {
                    continue;
                }
                if deleted.rejected {
                    summary.skipped += 1;
                    continue;
                }
                let path = deleted.absolute_path();
                if let Err(source) = writer.delete_file(&path).await {
                    failure = Some(SessionError::WriteFailure { path, source });
                    break;
                }
                deleted.change_applied = true;
                summary.deleted += 1;
            }
        }

        tracing::info!(
            tab = %self.tab_id,
            written = summary.written,
            deleted = summary.deleted,
            skipped = summary.skipped,
            failed = failure.is_some(),
            "inserted changes"
        );
        self.swap(&current, current.with_context(context));
        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    fn record_message(&self, message: &str) {
        *lock(&self.latest_message) = Some(message.to_string());
    }

    fn swap(&self, previous: &State, next: State) {
        tracing::info!(
            tab = %self.tab_id,
            from = previous.name(),
            to = next.name(),
            "session state transition"
        );
        *lock(&self.state) = Arc::new(next);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tab_id", &self.tab_id)
            .field("handshake", &self.handshake.get())
            .field("state", &self.state().name())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run one remote call unless `token` has fired, abandoning it if the token
/// fires while it is in flight.
pub(crate) async fn call_remote<T>(
    token: &CancellationToken,
    operation: &'static str,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, SessionError> {
    if token.is_cancelled() {
        return Err(SessionError::PollCancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(SessionError::PollCancelled),
        result = call => result.map_err(|source| SessionError::remote(operation, source)),
    }
}

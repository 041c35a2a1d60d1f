use std::fmt;
use std::sync::Arc;

use crate::error::SessionError;
use crate::protocol::GenerationFailure;
use crate::reconcile::{DiagnosticSink, TracingSink};
use crate::session::state::GenerationResult;

pub type ProgressFn = dyn Fn(&str, Option<&str>) + Send + Sync;
pub type CompleteFn = dyn Fn(&GenerationResult) + Send + Sync;
pub type ErrorFn = dyn Fn(&GenerationFailure) -> SessionError + Send + Sync;

/// Per-call-site behavior around the shared generation core.
///
/// Interactive doc generation and feature development share polling and
/// reconciliation but report progress, completion and failures differently.
pub struct Hooks {
    /// Error code carried by `PollTimeout` for this call site.
    pub timeout_code: String,
    pub progress: Box<ProgressFn>,
    pub on_complete: Box<CompleteFn>,
    /// Translates a server-reported failure into the error the caller sees.
    pub on_error: Box<ErrorFn>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Hooks {
    pub fn with_timeout_code(mut self, code: impl Into<String>) -> Self {
        self.timeout_code = code.into();
        self
    }

    pub fn with_progress(mut self, f: impl Fn(&str, Option<&str>) + Send + Sync + 'static) -> Self {
        self.progress = Box::new(f);
        self
    }

    pub fn with_on_complete(mut self, f: impl Fn(&GenerationResult) + Send + Sync + 'static) -> Self {
        self.on_complete = Box::new(f);
        self
    }

    pub fn with_on_error(
        mut self,
        f: impl Fn(&GenerationFailure) -> SessionError + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Box::new(f);
        self
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub(crate) fn report(&self, message: &str, detail: Option<&str>) {
        (self.progress)(message, detail);
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            timeout_code: "CodeGenTimeout".to_string(),
            progress: Box::new(|message: &str, detail: Option<&str>| {
                tracing::debug!(progress = message, detail, "code generation progress");
            }),
            on_complete: Box::new(|_: &GenerationResult| {}),
            on_error: Box::new(|failure: &GenerationFailure| SessionError::GenerationFailed {
                code: failure.code.clone(),
                reason: failure.reason.clone(),
            }),
            diagnostics: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("timeout_code", &self.timeout_code)
            .finish_non_exhaustive()
    }
}

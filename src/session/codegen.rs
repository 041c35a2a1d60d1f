//! One start → poll → fetch → reconcile cycle.

use crate::error::SessionError;
use crate::poller::{PollOutcome, Poller};
use crate::protocol::StatusReport;
use crate::reconcile::reconcile;
use crate::session::call_remote;
use crate::session::state::{
    Action, GenerationConfig, GenerationContext, GenerationResult, Interaction, State, Step,
};

const GENERATING: &str = "Generating code";
const COMPLETE: &str = "Code generation complete";

#[derive(Debug, Clone)]
pub struct CodeGen {
    config: GenerationConfig,
    context: GenerationContext,
}

impl CodeGen {
    pub fn new(config: GenerationConfig, context: GenerationContext) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    /// Run one generation iteration for `action.message`.
    ///
    /// Fails with `NotStarted` before touching the network when the handshake
    /// is missing. Server-reported failures go through the error hook;
    /// timeouts, cancellation and remote-call errors are returned unchanged
    /// and the completion hook is not called.
    pub async fn interact(&self, action: Action<'_>) -> Result<Step, SessionError> {
        let handshake = self.config.require_handshake()?;
        let Action {
            message,
            token,
            hooks,
        } = action;
        let service = self.config.service.as_ref();
        let conversation = &handshake.conversation_id;

        let request = self.context.request(message);
        hooks.report(GENERATING, None);
        let generation_id = call_remote(
            token,
            "start_generation",
            service.start_generation(conversation, &handshake.upload_id, &request),
        )
        .await?;
        tracing::info!(
            %conversation,
            generation = %generation_id,
            iteration = self.context.iteration,
            "started code generation"
        );

        let poller = Poller::new(self.config.poll);
        let outcome = poller
            .poll(
                token,
                &hooks.timeout_code,
                |report| hooks.report(GENERATING, iteration_detail(report).as_deref()),
                || service.get_generation_status(conversation, &generation_id),
            )
            .await;

        let report = match outcome {
            Ok(PollOutcome::Completed(report)) => report,
            Ok(PollOutcome::Failed(failure)) => {
                tracing::warn!(
                    generation = %generation_id,
                    code = failure.code.as_deref(),
                    reason = %failure.reason,
                    "code generation failed"
                );
                return Err((hooks.on_error)(&failure));
            }
            Err(err) => {
                tracing::warn!(generation = %generation_id, error = %err, "code generation stopped");
                return Err(err);
            }
        };

        let archive = call_remote(
            token,
            "fetch_result_archive",
            service.fetch_result_archive(conversation, &generation_id),
        )
        .await?;
        let reconciled = reconcile(
            &archive,
            &handshake.upload_id,
            self.config.workspace.as_ref(),
            hooks.diagnostics.as_ref(),
        )?;

        let result = GenerationResult {
            generation_id,
            iteration: self.context.iteration,
            file_changes: reconciled.file_changes,
            deleted_files: reconciled.deleted_files,
            references: reconciled.references,
            remaining_iterations: report.remaining_iteration_count,
            total_iterations: report.total_iteration_count,
        };
        let summary = format!(
            "{} changed, {} deleted",
            plural(result.file_changes.len(), "file"),
            plural(result.deleted_files.len(), "file"),
        );
        hooks.report(COMPLETE, Some(&summary));
        (hooks.on_complete)(&result);

        let context = GenerationContext {
            iteration: self.context.iteration + 1,
            file_changes: result.file_changes.clone(),
            deleted_files: result.deleted_files.clone(),
            references: result.references.clone(),
            remaining_iterations: result.remaining_iterations,
            total_iterations: result.total_iterations,
        };
        let next_state = State::after_iteration(self.config.clone(), context);
        Ok(Step {
            interaction: Interaction {
                result,
                can_continue: !next_state.is_terminal(),
            },
            next_state,
        })
    }
}

fn iteration_detail(report: &StatusReport) -> Option<String> {
    match (report.remaining_iteration_count, report.total_iteration_count) {
        (Some(remaining), Some(total)) => Some(format!("{remaining} of {total} iterations remaining")),
        _ => None,
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

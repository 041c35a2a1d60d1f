use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::lock_renderer;
use crate::cassette::{Cassette, ReplayService};
use crate::config;
use crate::display::renderer::Renderer;
use crate::reconcile::DiagnosticSink;
use crate::session::{GenerationConfig, Hooks, InsertSummary, Interaction, Session};
use crate::workspace::WorkspaceFolders;
use crate::writer::FsWriter;

pub struct ReplayConfig {
    pub cassette: PathBuf,
    /// Messages to send; the cassette's own messages are used when empty.
    pub messages: Vec<String>,
    /// Workspace folder roots, in index order. Settings come from the first.
    pub workspace: Vec<PathBuf>,
    pub tab_id: String,
    pub apply: bool,
    pub json: bool,
}

/// What a replay produced, printed with `--json`.
#[derive(Debug, Default, Serialize)]
pub struct ReplayReport {
    pub tab_id: String,
    pub conversation_id: Option<String>,
    pub upload_id: Option<String>,
    pub interactions: Vec<Interaction>,
    pub applied: Option<InsertSummary>,
    /// Kind of the session error that ended the replay early.
    pub error: Option<String>,
}

/// Sends run-command logs from the server to the terminal.
struct RendererSink<W: Write>(Arc<Mutex<Renderer<W>>>);

impl<W: Write + Send> DiagnosticSink for RendererSink<W> {
    fn log_info(&self, message: &str) {
        lock_renderer(&self.0).render_diagnostic(message);
    }
}

/// Run a session against a recorded cassette, rendering as it goes.
///
/// Session errors are rendered and recorded in the report; only setup
/// problems (unreadable cassette or settings) are returned as errors.
pub async fn replay<W: Write + Send + 'static>(
    config: ReplayConfig,
    token: &CancellationToken,
    renderer: Arc<Mutex<Renderer<W>>>,
) -> Result<ReplayReport> {
    let cassette = Cassette::load(&config.cassette)?;
    let messages = if config.messages.is_empty() {
        cassette.messages.clone()
    } else {
        config.messages.clone()
    };
    let Some(first) = messages.first() else {
        anyhow::bail!(
            "{}: no messages to send (pass --message or add `messages` to the cassette)",
            config.cassette.display()
        );
    };
    let root = config
        .workspace
        .first()
        .context("at least one workspace folder is required")?;
    let settings = config::load(root)?;

    let service = Arc::new(ReplayService::new(cassette));
    let generation = GenerationConfig::new(
        Arc::new(WorkspaceFolders::from_roots(config.workspace.iter().cloned())),
        service,
        &settings,
    );
    let session = Session::new(config.tab_id.clone(), generation);
    let mut report = ReplayReport {
        tab_id: config.tab_id.clone(),
        ..ReplayReport::default()
    };

    if let Err(err) = session.preloader(first, token).await {
        lock_renderer(&renderer).render_error(&err);
        report.error = Some(err.kind().to_string());
        return finish(report, &config, &renderer);
    }
    let conversation = session.conversation_id().map(ToString::to_string);
    let upload = session.upload_id().map(ToString::to_string);
    lock_renderer(&renderer).render_header(
        session.tab_id(),
        conversation.as_deref().unwrap_or_default(),
        upload.as_deref().unwrap_or_default(),
    );
    report.conversation_id = conversation;
    report.upload_id = upload;

    let progress = Arc::clone(&renderer);
    let hooks = Hooks::default()
        .with_timeout_code(settings.timeout_code.clone())
        .with_progress(move |message, detail| {
            lock_renderer(&progress).render_progress(message, detail);
        })
        .with_diagnostics(Arc::new(RendererSink(Arc::clone(&renderer))));

    for message in &messages {
        lock_renderer(&renderer).render_user_message(message);
        match session.send(message, token, &hooks).await {
            Ok(interaction) => {
                lock_renderer(&renderer).render_result(&interaction);
                let can_continue = interaction.can_continue;
                report.interactions.push(interaction);
                if !can_continue {
                    break;
                }
            }
            Err(err) => {
                lock_renderer(&renderer).render_error(&err);
                report.error = Some(err.kind().to_string());
                return finish(report, &config, &renderer);
            }
        }
    }

    if config.apply {
        match session.insert_changes(&FsWriter).await {
            Ok(summary) => {
                lock_renderer(&renderer).render_applied(&summary);
                report.applied = Some(summary);
            }
            Err(err) => {
                lock_renderer(&renderer).render_error(&err);
                report.error = Some(err.kind().to_string());
            }
        }
    }

    finish(report, &config, &renderer)
}

fn finish<W: Write>(
    report: ReplayReport,
    config: &ReplayConfig,
    renderer: &Mutex<Renderer<W>>,
) -> Result<ReplayReport> {
    if config.json {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        lock_renderer(renderer).write_raw(&format!("{json}\n"));
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CASSETTE: &str = r#"
messages = ["add a greeting"]

[[generations]]
generation_id = "gen-1"

[[generations.statuses]]
status = "Complete"
remaining_iteration_count = 0
total_iteration_count = 1

[[generations.archive.new_file_contents]]
zip_file_path = "src/hello.txt"
file_content = "hello\n"

[[generations.archive.new_file_contents]]
zip_file_path = ".codegen/dev/run_command.log"
file_content = "echo ok"
"#;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let cassette = dir.path().join("case.toml");
        std::fs::write(&cassette, CASSETTE).unwrap();
        (dir, cassette)
    }

    fn output(renderer: &Arc<Mutex<Renderer<Vec<u8>>>>) -> String {
        String::from_utf8(lock_renderer(renderer).writer().clone()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn apply_writes_generated_files() {
        let (dir, cassette) = setup();
        let workspace = dir.path().join("app");
        std::fs::create_dir_all(&workspace).unwrap();
        let renderer = Arc::new(Mutex::new(Renderer::with_writer(Vec::new())));

        let report = replay(
            ReplayConfig {
                cassette,
                messages: vec![],
                workspace: vec![workspace.clone()],
                tab_id: "tab-test".into(),
                apply: true,
                json: false,
            },
            &CancellationToken::new(),
            Arc::clone(&renderer),
        )
        .await
        .unwrap();

        assert_eq!(report.error, None);
        assert_eq!(report.interactions.len(), 1);
        assert_eq!(
            report.applied,
            Some(InsertSummary {
                written: 1,
                deleted: 0,
                skipped: 0,
            })
        );
        assert_eq!(
            std::fs::read_to_string(workspace.join("src/hello.txt")).unwrap(),
            "hello\n"
        );
        assert!(!workspace.join(".codegen/dev/run_command.log").exists());
        assert!(output(&renderer).contains("echo ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_messages_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cassette = dir.path().join("empty.toml");
        std::fs::write(&cassette, "").unwrap();
        let renderer = Arc::new(Mutex::new(Renderer::with_writer(Vec::new())));

        let err = replay(
            ReplayConfig {
                cassette,
                messages: vec![],
                workspace: vec![dir.path().to_path_buf()],
                tab_id: "tab-test".into(),
                apply: false,
                json: false,
            },
            &CancellationToken::new(),
            renderer,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("no messages to send"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_replay_reports_error_kind() {
        let (dir, cassette) = setup();
        let renderer = Arc::new(Mutex::new(Renderer::with_writer(Vec::new())));
        let token = CancellationToken::new();
        token.cancel();

        let report = replay(
            ReplayConfig {
                cassette,
                messages: vec![],
                workspace: vec![dir.path().to_path_buf()],
                tab_id: "tab-test".into(),
                apply: false,
                json: true,
            },
            &token,
            Arc::clone(&renderer),
        )
        .await
        .unwrap();

        assert_eq!(report.error.as_deref(), Some("PollCancelled"));
        let out = output(&renderer);
        assert!(out.contains("Error (PollCancelled)"));
        assert!(out.contains("\"error\": \"PollCancelled\""));
    }
}

use std::error::Error;
use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::Print;
use unicode_width::UnicodeWidthChar;

use super::theme;
use crate::error::SessionError;
use crate::reconcile::{DeletedFile, FileChange};
use crate::session::{InsertSummary, Interaction};

/// Produces colored terminal output for a session.
pub struct Renderer<W: Write = io::Stdout> {
    /// Display columns available for one line.
    width: usize,
    /// Last progress line printed, so repeats can be skipped.
    last_progress: Option<String>,
    out: W,
}

impl Default for Renderer<io::Stdout> {
    fn default() -> Self {
        Self {
            width: super::term_width(),
            last_progress: None,
            out: io::stdout(),
        }
    }
}

impl Renderer<io::Stdout> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<W: Write> Renderer<W> {
    /// Renderer over `writer` with a fixed 80-column width.
    pub fn with_writer(writer: W) -> Self {
        Self {
            width: 80,
            last_progress: None,
            out: writer,
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    // --- Session lifecycle ---

    pub fn render_header(&mut self, tab_id: &str, conversation_id: &str, upload_id: &str) {
        let header = format!("Session {tab_id} · conversation {conversation_id} · upload {upload_id}");
        let header = truncate_to_width(&header, self.width);
        queue!(self.out, Print(theme::dim().apply(header)), Print("\n\n")).ok();
        self.out.flush().ok();
    }

    pub fn render_user_message(&mut self, message: &str) {
        self.last_progress = None;
        let line = truncate_to_width(&format!("> {message}"), self.width);
        queue!(self.out, Print(theme::prompt_style().apply(line)), Print("\n")).ok();
        self.out.flush().ok();
    }

    /// One progress update. Consecutive identical updates are shown once.
    pub fn render_progress(&mut self, message: &str, detail: Option<&str>) {
        let text = match detail {
            Some(detail) => format!("  {message} · {detail}"),
            None => format!("  {message}"),
        };
        if self.last_progress.as_deref() == Some(text.as_str()) {
            return;
        }
        let line = truncate_to_width(&text, self.width);
        queue!(self.out, Print(theme::dim().apply(line)), Print("\n")).ok();
        self.out.flush().ok();
        self.last_progress = Some(text);
    }

    /// Command-execution log text the server sent with its result.
    pub fn render_diagnostic(&mut self, message: &str) {
        for line in message.lines() {
            let line = truncate_to_width(&format!("  │ {line}"), self.width);
            queue!(self.out, Print(theme::dim_italic().apply(line)), Print("\n")).ok();
        }
        self.out.flush().ok();
    }

    pub fn render_result(&mut self, interaction: &Interaction) {
        let result = &interaction.result;
        let iteration = match result.total_iterations {
            Some(total) => format!("iteration {} of {total}", result.iteration + 1),
            None => format!("iteration {}", result.iteration + 1),
        };
        let stats = format!(
            "  {iteration} · {} changed · {} deleted",
            result.file_changes.len(),
            result.deleted_files.len()
        );

        queue!(self.out, Print("\n")).ok();
        queue!(
            self.out,
            Print(theme::result_line().apply("Generated")),
            Print(theme::dim().apply(stats)),
            Print("\n"),
        )
        .ok();
        for change in &result.file_changes {
            self.render_change_line(change);
        }
        for deleted in &result.deleted_files {
            self.render_deleted_line(deleted);
        }
        for reference in &result.references {
            let parts: Vec<&str> = [
                reference.license_name.as_deref(),
                reference.repository.as_deref(),
                reference.url.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect();
            if parts.is_empty() {
                continue;
            }
            let line = truncate_to_width(&format!("  reference: {}", parts.join(" · ")), self.width);
            queue!(self.out, Print(theme::dim().apply(line)), Print("\n")).ok();
        }
        if !interaction.can_continue {
            queue!(
                self.out,
                Print(theme::dim().apply("  no iterations remain")),
                Print("\n")
            )
            .ok();
        }
        queue!(self.out, Print("\n")).ok();
        self.out.flush().ok();
    }

    pub fn render_applied(&mut self, summary: &InsertSummary) {
        let stats = format!(
            "  {} written · {} deleted · {} skipped",
            summary.written, summary.deleted, summary.skipped
        );
        queue!(
            self.out,
            Print(theme::result_line().apply("Applied")),
            Print(theme::dim().apply(stats)),
            Print("\n"),
        )
        .ok();
        self.out.flush().ok();
    }

    /// Error line with its kind and the full cause chain.
    pub fn render_error(&mut self, err: &SessionError) {
        let mut text = format!("Error ({}): {err}", err.kind());
        let mut source = err.source();
        while let Some(cause) = source {
            text.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        let line = truncate_to_width(&text, self.width);
        queue!(self.out, Print(theme::error().apply(line)), Print("\n")).ok();
        self.out.flush().ok();
    }

    pub fn write_raw(&mut self, text: &str) {
        queue!(self.out, Print(text)).ok();
        self.out.flush().ok();
    }

    fn render_change_line(&mut self, change: &FileChange) {
        let status = if change.rejected { "  (rejected)" } else { "" };
        let path = format!("{}/{}", change.workspace_folder.name, change.relative_path);
        let line = truncate_to_width(&format!("  ~ {path}"), self.width);
        queue!(
            self.out,
            Print(theme::file_changed().apply(line)),
            Print(theme::dim().apply(status)),
            Print("\n")
        )
        .ok();
    }

    fn render_deleted_line(&mut self, deleted: &DeletedFile) {
        let path = format!("{}/{}", deleted.workspace_folder.name, deleted.relative_path);
        let line = truncate_to_width(&format!("  - {path}"), self.width);
        queue!(
            self.out,
            Print(theme::file_deleted().apply(line)),
            Print("\n")
        )
        .ok();
    }
}

/// Fit `s` into `max_width` display columns, ending with `...` when cut.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    const ELLIPSIS: &str = "...";
    let columns = |ch: char| ch.width().unwrap_or(0);
    if s.chars().map(columns).sum::<usize>() <= max_width {
        return s.to_string();
    }
    let Some(budget) = max_width.checked_sub(ELLIPSIS.len()) else {
        return String::new();
    };

    let mut used = 0;
    let mut kept: String = s
        .chars()
        .take_while(|&ch| {
            used += columns(ch);
            used <= budget
        })
        .collect();
    kept.push_str(ELLIPSIS);
    kept
}

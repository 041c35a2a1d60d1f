#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use codegen_session::commands::replay::{ReplayConfig, ReplayReport, replay};
use codegen_session::display::renderer::Renderer;
use tokio_util::sync::CancellationToken;

/// Replay a cassette from `tests/cases` and capture the rendered output.
async fn replay_case(name: &str, workspace: &[&str]) -> (String, ReplayReport) {
    let base = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/cases");
    let renderer = Arc::new(Mutex::new(Renderer::with_writer(Vec::new())));

    let report = replay(
        ReplayConfig {
            cassette: base.join(format!("{name}.toml")),
            messages: vec![],
            workspace: workspace.iter().map(PathBuf::from).collect(),
            tab_id: "tab-test".to_string(),
            apply: false,
            json: false,
        },
        &CancellationToken::new(),
        Arc::clone(&renderer),
    )
    .await
    .expect("replay setup should succeed");

    let output = renderer
        .lock()
        .expect("renderer lock should not be poisoned")
        .writer()
        .clone();
    let output = String::from_utf8(output).expect("Output should be valid UTF-8");
    (output, report)
}

/// Remove the CSI styling sequences the renderer emits.
fn strip_ansi(s: &str) -> String {
    let mut plain = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(esc) = rest.find('\x1b') {
        plain.push_str(&rest[..esc]);
        let sequence = &rest[esc + 1..];
        // Parameters and intermediates sit below '@'; the final byte ends it.
        let len = sequence
            .strip_prefix('[')
            .and_then(|params| params.find(|c: char| ('@'..='~').contains(&c)))
            .map_or(0, |end| end + 2);
        rest = &sequence[len..];
    }
    plain.push_str(rest);
    plain
}

#[test]
fn strip_ansi_keeps_only_text() {
    assert_eq!(
        strip_ansi("\x1b[38;5;2mGenerated\x1b[39m \x1b[2m1 changed\x1b[0m"),
        "Generated 1 changed"
    );
    assert_eq!(strip_ansi("plain │ text"), "plain │ text");
}

macro_rules! replay_test {
    ($name:ident, $error:expr) => {
        replay_test!($name, $error, ["/ws/app"]);
    };
    ($name:ident, $error:expr, [$($root:literal),+]) => {
        #[tokio::test(start_paused = true)]
        async fn $name() {
            let (output, report) = replay_case(stringify!($name), &[$($root),+]).await;
            let expected_error: Option<&str> = $error;
            assert_eq!(report.error.as_deref(), expected_error);
            let clean = strip_ansi(&output);

            insta::with_settings!({
                snapshot_path => "../tests/cases",
                prepend_module_to_snapshot => false,
            }, {
                insta::assert_snapshot!(stringify!($name), clean);
            });
        }
    };
}

replay_test!(multi_iteration, None);
replay_test!(last_iteration, None);
replay_test!(multi_root, None, ["/ws/app", "/ws/lib"]);
replay_test!(generation_failed, Some("GenerationFailed"));
replay_test!(poll_timeout, Some("PollTimeout"));

#[tokio::test(start_paused = true)]
async fn multi_iteration_report_tracks_both_iterations() {
    let (_, report) = replay_case("multi_iteration", &["/ws/app"]).await;

    assert_eq!(report.conversation_id.as_deref(), Some("conv-replay"));
    assert_eq!(report.upload_id.as_deref(), Some("upload-replay"));
    assert_eq!(report.interactions.len(), 2);
    let second = &report.interactions[1].result;
    assert_eq!(second.iteration, 1);
    assert_eq!(second.remaining_iterations, Some(1));
    assert_eq!(
        second.file_changes[0].virtual_location.as_str(),
        "codegen-diff:/upload-replay/src/login.tsx"
    );
    assert_eq!(second.deleted_files[0].relative_path, "src/old_login.tsx");
    assert_eq!(second.references.len(), 1);
}

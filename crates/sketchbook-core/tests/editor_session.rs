//! End-to-end editor scenarios against a simulated document.
//!
//! `FakeDom` applies drained effects the way the wasm layer does: one frame
//! list, three container flags, a URL query and the parent's message log.
//! Assertions are made on what the document would look like after every
//! drain, not on the effect list.

use proptest::prelude::*;
use sketchbook_core::{
    Effect, EditorConfig, EditorSession, FrameId, Message, Modifiers, Selection, Sender,
    ViewMode, Visibility,
};
use serde_json::json;

const TEMPLATE: &str = concat!(
    "<!doctype html><html><body data-sketch-js-path=\"/sketches/ana/rain/sketch.js\">",
    "<script id=\"sketch-source\">OLD</script>",
    "<script src=\"/runner.js\"></script></body></html>"
);

#[derive(Debug, Default)]
struct FakeDom {
    frames: Vec<(FrameId, Option<String>)>,
    max_frames: usize,
    visibility: Option<Visibility>,
    view_mode_param: Option<ViewMode>,
    parent_log: Vec<Message>,
    console_lines: Vec<String>,
    editor_text: String,
}

impl FakeDom {
    fn apply(&mut self, session: &mut EditorSession) {
        for effect in session.drain_effects() {
            match effect {
                Effect::SetVisibility(v) => self.visibility = Some(v),
                Effect::ReplaceViewModeParam(mode) => self.view_mode_param = mode,
                Effect::ReplaceBuffer { text, .. } => self.editor_text = text,
                Effect::RemoveFrame(id) => self.frames.retain(|(f, _)| *f != id),
                Effect::CreateFrame { id, sandbox } => {
                    assert_eq!(sandbox, "allow-scripts");
                    self.frames.push((id, None));
                }
                Effect::WriteDocument { id, html } => {
                    let frame = self
                        .frames
                        .iter_mut()
                        .find(|(f, _)| *f == id)
                        .expect("document written to a missing frame");
                    frame.1 = Some(html);
                }
                Effect::PostToParent(message) => self.parent_log.push(message),
                Effect::ConsoleClear => self.console_lines.clear(),
                Effect::ConsoleAppend(entry) => self.console_lines.push(entry.line()),
                Effect::RestoreEditor(_)
                | Effect::Gutter(_)
                | Effect::Status(_)
                | Effect::FetchTemplate { .. }
                | Effect::FetchSource { .. }
                | Effect::Focus => {}
            }
            self.max_frames = self.max_frames.max(self.frames.len());
        }
    }

    fn document(&self) -> &str {
        self.frames
            .last()
            .and_then(|(_, html)| html.as_deref())
            .unwrap_or("")
    }
}

fn config() -> EditorConfig {
    EditorConfig {
        template_url: Some("/sketches/ana/rain/".into()),
        auto_run: false,
        ..EditorConfig::default()
    }
}

fn ready(text: &str) -> (EditorSession, FakeDom) {
    let mut session = EditorSession::new(config(), true).with_initial_text(text);
    let mut dom = FakeDom::default();
    session.start();
    session.template_fetched(Ok(TEMPLATE.into()));
    dom.apply(&mut session);
    dom.parent_log.clear();
    (session, dom)
}

fn injected(doc: &str) -> &str {
    let open = "<script id=\"sketch-source\">";
    let start = doc.find(open).expect("marker kept") + open.len();
    let end = start + doc[start..].find("</script>").expect("marker closed");
    &doc[start..end]
}

#[test]
fn run_injects_buffer_into_template() {
    let (mut session, mut dom) = ready("const x = 1;");
    session.run();
    dom.apply(&mut session);
    assert_eq!(
        injected(dom.document()),
        "window.SKETCH_SOURCE_CODE = `const x = 1;`;"
    );
    assert!(dom.document().contains("<script src=\"/runner.js\"></script>"));
}

#[test]
fn run_escapes_template_literal_breakers() {
    let (mut session, mut dom) = ready("text(`$${n}`, 0, 0);");
    session.run();
    dom.apply(&mut session);
    assert_eq!(
        injected(dom.document()),
        "window.SKETCH_SOURCE_CODE = `text(\\`\\$\\${n}\\`, 0, 0);`;"
    );
}

#[test]
fn run_then_stop_never_duplicates_frames() {
    let (mut session, mut dom) = ready("draw();");
    session.run();
    session.stop();
    dom.apply(&mut session);
    assert!(dom.max_frames <= 1);
    assert!(dom.frames.is_empty());
    assert_eq!(dom.parent_log.last(), Some(&Message::SketchStopped));
}

#[test]
fn repeated_runs_keep_one_frame() {
    let (mut session, mut dom) = ready("draw();");
    for _ in 0..5 {
        session.run();
        dom.apply(&mut session);
        assert_eq!(dom.frames.len(), 1);
    }
    assert_eq!(dom.max_frames, 1);
}

#[test]
fn run_from_unknown_window_is_ignored() {
    let (mut session, mut dom) = ready("draw();");
    session
        .handle_message(Sender::Unknown, &json!({"type": "runSketch"}))
        .expect("well-formed");
    session
        .handle_message(Sender::EditorFrame, &json!({"type": "runSketch"}))
        .expect("well-formed");
    dom.apply(&mut session);
    assert!(dom.frames.is_empty());
    assert!(dom.parent_log.is_empty());
}

#[test]
fn parent_commands_drive_the_editor() {
    let (mut session, mut dom) = ready("draw();");
    session
        .handle_message(Sender::Parent, &json!({"type": "runSketch"}))
        .expect("well-formed");
    dom.apply(&mut session);
    assert_eq!(dom.frames.len(), 1);
    assert_eq!(dom.parent_log.last(), Some(&Message::SketchRunning));

    session
        .handle_message(Sender::Parent, &json!({"type": "cycleViewMode"}))
        .expect("well-formed");
    dom.apply(&mut session);
    assert_eq!(dom.view_mode_param, Some(ViewMode::Sketch));
    assert_eq!(dom.visibility, Some(ViewMode::Sketch.visibility()));

    session
        .handle_message(Sender::Parent, &json!({"type": "stopSketch"}))
        .expect("well-formed");
    dom.apply(&mut session);
    assert!(dom.frames.is_empty());
    assert_eq!(dom.view_mode_param, Some(ViewMode::Code));
}

#[test]
fn url_omits_default_mode() {
    let (mut session, mut dom) = ready("x");
    session.set_view_mode(ViewMode::Debug);
    dom.apply(&mut session);
    assert_eq!(dom.view_mode_param, Some(ViewMode::Debug));
    session.set_view_mode(ViewMode::Overlay);
    dom.apply(&mut session);
    assert_eq!(dom.view_mode_param, None);
}

#[test]
fn start_reflects_configured_mode_in_url() {
    let config = EditorConfig {
        initial_view_mode: ViewMode::Debug,
        ..config()
    };
    let mut session = EditorSession::new(config, true);
    let mut dom = FakeDom::default();
    session.start();
    dom.apply(&mut session);
    assert_eq!(dom.view_mode_param, Some(ViewMode::Debug));
    assert_eq!(
        dom.parent_log.first(),
        Some(&Message::ViewModeChanged {
            view_mode: ViewMode::Debug
        })
    );

    let (_, dom) = ready("x");
    assert_eq!(dom.view_mode_param, None);
}

#[test]
fn shortcuts_from_keyboard() {
    let (mut session, mut dom) = ready("draw();");
    assert!(session.on_key("Enter", "Enter", Modifiers::CTRL));
    dom.apply(&mut session);
    assert_eq!(dom.frames.len(), 1);

    assert!(session.on_key(";", "Semicolon", Modifiers::CTRL));
    dom.apply(&mut session);
    assert_eq!(dom.visibility, Some(ViewMode::Debug.visibility()));

    assert!(session.on_key(".", "Period", Modifiers::CTRL));
    dom.apply(&mut session);
    assert!(dom.frames.is_empty());
}

#[test]
fn console_relay_follows_frames() {
    let (mut session, mut dom) = ready("draw();");
    session.run();
    let old = session.active_frame().expect("running");
    session.run();
    let live = session.active_frame().expect("running");
    dom.apply(&mut session);

    let entry = json!({"type": "consoleEntry", "level": "log", "args": ["tick", "1"]});
    session.handle_message(Sender::Preview(old), &entry).expect("well-formed");
    session.handle_message(Sender::Preview(live), &entry).expect("well-formed");
    dom.apply(&mut session);
    assert_eq!(dom.console_lines, vec!["tick 1".to_owned()]);

    session.run();
    dom.apply(&mut session);
    assert!(dom.console_lines.is_empty());
}

#[test]
fn format_and_comment_reach_the_editor_surface() {
    let (mut session, mut dom) = ready("function draw() {\nbackground(0);\n}");
    session.format();
    dom.apply(&mut session);
    assert_eq!(dom.editor_text, "function draw() {\n  background(0);\n}");

    session.on_selection(Selection::new(0, 38));
    session.toggle_comment();
    dom.apply(&mut session);
    assert_eq!(
        dom.editor_text,
        "// function draw() {\n  // background(0);\n// }"
    );
    assert_eq!(
        dom.parent_log,
        vec![Message::SketchDirty { status: true }]
    );
}

#[test]
fn bootstrap_extracts_stored_source_and_auto_runs() {
    let cfg = EditorConfig {
        auto_run: true,
        ..config()
    };
    let mut session = EditorSession::new(cfg, true);
    let mut dom = FakeDom::default();
    session.start();
    session.template_fetched(Ok(TEMPLATE.into()));
    session.source_fetched(Ok("circle(1, 2, 3);".into()));
    dom.apply(&mut session);
    assert_eq!(dom.editor_text, "circle(1, 2, 3);");
    assert_eq!(
        injected(dom.document()),
        "window.SKETCH_SOURCE_CODE = `circle(1, 2, 3);`;"
    );
    assert!(!dom.parent_log.contains(&Message::SketchDirty { status: true }));
}

// ── Random command sequences ──────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Step {
    Run,
    Stop,
    Cycle,
    Clear,
    Type,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Run),
        Just(Step::Stop),
        Just(Step::Cycle),
        Just(Step::Clear),
        Just(Step::Type),
    ]
}

proptest! {
    #[test]
    fn at_most_one_frame_and_state_agrees(steps in prop::collection::vec(arb_step(), 1..40)) {
        let (mut session, mut dom) = ready("draw();");
        for step in steps {
            match step {
                Step::Run => session.run(),
                Step::Stop => session.stop(),
                Step::Cycle => session.cycle_view_mode(),
                Step::Clear => session.clear(),
                Step::Type => session.on_input("draw();", Selection::caret(7)),
            }
            dom.apply(&mut session);
            prop_assert!(dom.frames.len() <= 1);
            prop_assert_eq!(dom.frames.len() == 1, session.is_running());
            prop_assert_eq!(dom.visibility, Some(session.visibility()));
        }
        prop_assert!(dom.max_frames <= 1);
    }
}

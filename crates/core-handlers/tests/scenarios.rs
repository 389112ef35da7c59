//! End-to-end dispatch scenarios over the full subsystem stack.

mod common;

use common::{buffer_text, current_mode, editor, primary_head};
use core_actions::{Action, ActionResult, ActionStatus};
use core_dispatch::{handler_fn, Hook};
use core_text::Engine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn basic_motion_move_down() {
    let d = editor("hello\nworld", 0);
    let r = d.dispatch(Action::new("cursor.moveDown").with_count(1));
    assert_eq!(primary_head(&d), 6);
    assert!(r.view_update.redraw);
}

#[test]
fn word_forward_with_count() {
    let d = editor("foo bar baz qux", 0);
    d.dispatch(Action::new("cursor.wordForward").with_count(2));
    assert_eq!(primary_head(&d), 8);
}

#[test]
fn search_wraps_to_buffer_start() {
    let d = editor("foo bar baz", 8);
    let r = d.dispatch(Action::new("search.forward").with_pattern("foo"));
    assert_eq!(primary_head(&d), 0);
    assert!(r.message.unwrap().contains("(wrapped)"));
}

#[test]
fn matching_bracket_pairs_parens() {
    let d = editor("if (a && (b || c)) {}", 3);
    d.dispatch(Action::new("cursor.matchingBracket"));
    assert_eq!(primary_head(&d), 17);
}

#[test]
fn open_below_edits_and_switches_mode() {
    let d = editor("abc", 1);
    let r = d.dispatch(Action::new("mode.openBelow"));
    assert_eq!(buffer_text(&d), "abc\n");
    assert_eq!(primary_head(&d), 4);
    assert_eq!(r.mode_change.as_deref(), Some("insert"));
    assert!(r.view_update.redraw);
    assert_eq!(current_mode(&d), "insert");
}

#[test]
fn pre_hook_cancellation_skips_handler() {
    struct Veto;
    impl Hook for Veto {
        fn name(&self) -> &str {
            "veto"
        }
        fn is_pre(&self) -> bool {
            true
        }
        fn before(
            &self,
            _action: &mut Action,
            _ctx: &mut core_dispatch::ExecutionContext<'_>,
        ) -> bool {
            false
        }
    }
    let d = editor("abc", 0);
    let invoked = Arc::new(AtomicUsize::new(0));
    let probe = invoked.clone();
    d.registry().register(
        "probe.count",
        handler_fn(move |_, _| {
            probe.fetch_add(1, Ordering::SeqCst);
            ActionResult::success()
        }),
    );
    d.hooks().register(Arc::new(Veto));
    let r = d.dispatch(Action::new("probe.count"));
    assert_eq!(r.status, ActionStatus::Cancelled);
    assert_eq!(r.message.as_deref(), Some("cancelled by hook"));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn handler_panic_is_isolated_and_counted() {
    let d = editor("abc", 0);
    d.registry()
        .register("test.panic", handler_fn(|_, _| panic!("scenario")));
    let r = d.dispatch(Action::new("test.panic"));
    assert_eq!(r.status, ActionStatus::Error);
    assert!(r
        .message
        .unwrap()
        .contains("handler panic for test.panic"));
    assert_eq!(d.panic_count("test.panic"), 1);
    // The dispatcher keeps working afterwards.
    let r = d.dispatch(Action::new("cursor.moveRight"));
    assert_eq!(r.status, ActionStatus::Ok);
}

#[test]
fn consecutive_next_from_last_match_wraps_to_first() {
    // Two matches; from the second, the next search must wrap to the first.
    let d = editor("foo bar foo bar", 0);
    d.dispatch(Action::new("search.forward").with_pattern("foo"));
    assert_eq!(primary_head(&d), 8);
    let r = d.dispatch(Action::new("search.next"));
    assert_eq!(primary_head(&d), 0);
    assert!(r.message.unwrap().contains("(wrapped)"));
}

#[test]
fn replace_twice_is_idempotent_when_replacement_does_not_match() {
    let replace = || {
        Action::new("search.replace")
            .with_pattern("foo")
            .with_text("qux")
            .with_arg("global", "true")
    };
    let d = editor("foo a foo\nb foo", 0);
    d.dispatch(replace());
    let once = buffer_text(&d);
    let r = d.dispatch(replace());
    assert_eq!(r.status, ActionStatus::NoOp);
    assert_eq!(buffer_text(&d), once);
    assert_eq!(once, "qux a qux\nb qux");
}

#[test]
fn visual_flow_extends_then_collapses() {
    let d = editor("alpha beta gamma", 0);
    d.dispatch(Action::new("mode.visual"));
    d.dispatch(Action::new("cursor.wordForward"));
    d.read_subsystems(|s| {
        let sel = s.cursors.as_ref().unwrap().primary();
        assert_eq!((sel.anchor, sel.head), (0, 6));
    });
    assert_eq!(current_mode(&d), "visual");
    d.dispatch(Action::new("mode.normal"));
    d.read_subsystems(|s| {
        let sel = s.cursors.as_ref().unwrap().primary();
        assert!(sel.is_empty());
        assert_eq!(sel.head, 0);
    });
    assert_eq!(current_mode(&d), "normal");
}

#[test]
fn search_then_motion_keeps_state_across_dispatches() {
    let d = editor("x foo y foo z", 0);
    d.dispatch(Action::new("search.forward").with_pattern("foo"));
    assert_eq!(primary_head(&d), 2);
    d.dispatch(Action::new("cursor.moveRight"));
    // State survived the unrelated dispatch.
    d.dispatch(Action::new("search.next"));
    assert_eq!(primary_head(&d), 8);
}

#[test]
fn yank_register_survives_across_dispatches() {
    let d = editor("keep this line\nrest", 0);
    d.dispatch(Action::new("editor.yankLine"));
    d.dispatch(Action::new("cursor.moveDown"));
    d.dispatch(Action::new("editor.paste"));
    assert_eq!(buffer_text(&d), "keep this line\nrest\nkeep this line");
}

#[test]
fn no_handler_error_shape() {
    let d = editor("abc", 0);
    let r = d.dispatch(Action::new("missing.op"));
    assert_eq!(r.status, ActionStatus::Error);
    assert_eq!(r.message.as_deref(), Some("no handler for action: missing.op"));
}

#[test]
fn count_limit_hook_clamps_large_counts() {
    use core_dispatch::hooks::CountLimitHook;
    let d = editor("a\nb\nc\nd\ne", 0);
    d.hooks().register(Arc::new(CountLimitHook::new(2)));
    d.dispatch(Action::new("cursor.moveDown").with_count(100));
    // Clamped to 2 lines down.
    d.read_subsystems(|s| {
        let engine = s.engine.as_ref().unwrap();
        let head = s.cursors.as_ref().unwrap().primary().head;
        assert_eq!(engine.offset_to_point(head).line, 2);
    });
}

#[test]
fn repeat_last_tracks_editor_actions_only() {
    use core_dispatch::hooks::RepeatLastHook;
    let d = editor("abc def", 0);
    let repeat = Arc::new(RepeatLastHook::new());
    d.hooks().register(repeat.clone());
    d.dispatch(Action::new("cursor.wordForward"));
    assert!(repeat.last_action().is_none());
    d.dispatch(Action::new("editor.deleteWord"));
    assert_eq!(buffer_text(&d), "abc ");
    assert_eq!(
        repeat.last_action().map(|a| a.name),
        Some("editor.deleteWord".to_string())
    );
    // A motion does not overwrite the remembered action...
    d.dispatch(Action::new("cursor.firstLine"));
    let again = repeat.last_action().unwrap();
    assert_eq!(again.name, "editor.deleteWord");
    // ...and replaying it dispatches like any other action.
    d.dispatch(again);
    assert_eq!(buffer_text(&d), "");
}

#[test]
fn change_journal_records_edit_payloads() {
    use core_dispatch::hooks::ChangeJournalHook;
    let d = editor("hello", 0);
    let journal = Arc::new(ChangeJournalHook::new(16));
    d.hooks().register(journal.clone());
    d.dispatch(Action::new("editor.insertText").with_text("say "));
    let entries = journal.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "editor.insertText");
    assert_eq!(entries[0].edit.new_text, "say ");
    assert_eq!(entries[0].edit.old_text, "");
}

#[test]
fn scenario_chain_insert_flow() {
    // A realistic normal-mode editing burst: iw -> text -> Escape.
    let d = editor("world", 0);
    d.dispatch(Action::new("mode.insert"));
    assert_eq!(current_mode(&d), "insert");
    d.dispatch(Action::new("editor.insertText").with_text("hello "));
    d.dispatch(Action::new("mode.normal"));
    assert_eq!(buffer_text(&d), "hello world");
    assert_eq!(current_mode(&d), "normal");
}

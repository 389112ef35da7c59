//! The `editor.*` namespace: text mutation across the cursor set.
//!
//! Shared discipline for every op: selections are processed in descending
//! head order (so pending offsets stay valid), already-placed cursors are
//! shifted by the deltas of edits applied below them, multi-cursor edits are
//! bracketed in a history group, and the cursor set is clamped to the
//! post-edit buffer length before returning.

use core_actions::{Action, ActionError, ActionResult, Edit, Value};
use core_dispatch::{ActionHandler, ExecutionContext, NamespaceHandler};
use core_state::{CursorSet, History};
use core_text::rune::{next_rune_end, prev_rune_start};
use core_text::{ByteOffset, Engine, Range};
use tracing::trace;

use crate::motion;

const LOCALS: &[&str] = &[
    "insertText",
    "insertNewline",
    "deleteChar",
    "deleteCharBack",
    "deleteLine",
    "deleteWord",
    "deleteToLineEnd",
    "yankLine",
    "yankSelection",
    "paste",
    "pasteBefore",
    "indentLine",
    "outdentLine",
];

const INDENT: &str = "    ";

#[derive(Default)]
pub struct EditorHandler;

type DynEngine<'a> = dyn Engine + Send + Sync + 'a;
type DynHistory<'a> = dyn History + Send + Sync + 'a;

/// One planned replacement for the current selection, in current-buffer
/// coordinates, plus where the cursor lands relative to the edit.
struct PlannedEdit {
    range: Range,
    new_text: String,
    /// Cursor target after this edit, already in post-edit coordinates.
    cursor: ByteOffset,
}

impl EditorHandler {
    pub fn new() -> Self {
        Self
    }

    fn run(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ActionError> {
        let count = ctx.count;
        let local = action.local();

        // Yank and paste go through the data bag, which needs a borrow
        // disjoint from the engine/cursors; handle them first.
        match local {
            "yankLine" | "yankSelection" => return self.yank(ctx, local, count),
            "paste" | "pasteBefore" => return self.paste(ctx, local == "pasteBefore"),
            _ => {}
        }

        let text_arg = action.args.text.clone();
        let (engine, cursors, history) = ctx.edit_parts()?;
        let result = match local {
            "insertText" => {
                let text = text_arg.ok_or_else(|| {
                    ActionError::InvalidAction("editor.insertText: missing text".into())
                })?;
                apply_planned(engine, cursors, history, "insert", |_, sel| {
                    let range = if sel.is_empty() {
                        Range::empty(sel.head)
                    } else {
                        sel.range()
                    };
                    Some(PlannedEdit {
                        range,
                        new_text: text.clone(),
                        cursor: range.start + text.len(),
                    })
                })?
            }
            "insertNewline" => {
                apply_planned(engine, cursors, history, "insert", |_, sel| {
                    let range = if sel.is_empty() {
                        Range::empty(sel.head)
                    } else {
                        sel.range()
                    };
                    Some(PlannedEdit {
                        range,
                        new_text: "\n".into(),
                        cursor: range.start + 1,
                    })
                })?
            }
            "deleteChar" => {
                apply_planned(engine, cursors, history, "delete", |engine, sel| {
                    let text = engine.text();
                    let mut end = sel.head;
                    for _ in 0..count {
                        end = next_rune_end(&text, end);
                    }
                    (end > sel.head).then_some(PlannedEdit {
                        range: Range::new(sel.head, end),
                        new_text: String::new(),
                        cursor: sel.head,
                    })
                })?
            }
            "deleteCharBack" => {
                apply_planned(engine, cursors, history, "delete", |engine, sel| {
                    let text = engine.text();
                    let mut start = sel.head;
                    for _ in 0..count {
                        start = prev_rune_start(&text, start);
                    }
                    (start < sel.head).then_some(PlannedEdit {
                        range: Range::new(start, sel.head),
                        new_text: String::new(),
                        cursor: start,
                    })
                })?
            }
            "deleteWord" => {
                apply_planned(engine, cursors, history, "delete", |engine, sel| {
                    let text = engine.text();
                    let end = motion::word_forward(&text, sel.head, false, count);
                    (end > sel.head).then_some(PlannedEdit {
                        range: Range::new(sel.head, end),
                        new_text: String::new(),
                        cursor: sel.head,
                    })
                })?
            }
            "deleteToLineEnd" => {
                apply_planned(engine, cursors, history, "delete", |engine, sel| {
                    let end = engine.line_end_offset(engine.offset_to_point(sel.head).line);
                    (end > sel.head).then_some(PlannedEdit {
                        range: Range::new(sel.head, end),
                        new_text: String::new(),
                        cursor: sel.head,
                    })
                })?
            }
            "deleteLine" => {
                apply_planned(engine, cursors, history, "delete", |engine, sel| {
                    let line = engine.offset_to_point(sel.head).line;
                    let last = engine.line_count().saturating_sub(1);
                    let end_line = (line + count - 1).min(last);
                    let mut start = engine.line_start_offset(line);
                    let mut end = engine.line_end_offset(end_line);
                    if end < engine.len() {
                        end += 1; // trailing newline
                    } else if start > 0 {
                        start -= 1; // last line: take the preceding newline
                    }
                    (end > start).then_some(PlannedEdit {
                        range: Range::new(start, end),
                        new_text: String::new(),
                        cursor: start,
                    })
                })?
            }
            "indentLine" => {
                apply_planned(engine, cursors, history, "indent", |engine, sel| {
                    let line = engine.offset_to_point(sel.head).line;
                    let start = engine.line_start_offset(line);
                    Some(PlannedEdit {
                        range: Range::empty(start),
                        new_text: INDENT.into(),
                        cursor: sel.head + INDENT.len(),
                    })
                })?
            }
            "outdentLine" => {
                apply_planned(engine, cursors, history, "indent", |engine, sel| {
                    let point = engine.offset_to_point(sel.head);
                    let start = engine.line_start_offset(point.line);
                    let content = engine.line_text(point.line);
                    let strip = leading_indent_len(&content);
                    (strip > 0).then_some(PlannedEdit {
                        range: Range::new(start, start + strip),
                        new_text: String::new(),
                        // Keep the column, clamped at the new line start.
                        cursor: sel.head.saturating_sub(strip).max(start),
                    })
                })?
            }
            other => {
                return Err(ActionError::InvalidAction(format!(
                    "editor: unknown operation {other}"
                )));
            }
        };
        trace!(target: "handlers.editor", op = local, edits = result.edits.len(), "edit");
        Ok(result)
    }

    fn yank(
        &self,
        ctx: &mut ExecutionContext<'_>,
        local: &str,
        count: u32,
    ) -> Result<ActionResult, ActionError> {
        let yanked = {
            let (engine, cursors) = ctx.motion_parts()?;
            let primary = cursors.primary();
            if local == "yankSelection" {
                if primary.is_empty() {
                    return Ok(ActionResult::noop().with_message("yank: nothing selected"));
                }
                let range = primary.range();
                engine.text_range(range.start, range.end)
            } else {
                let line = engine.offset_to_point(primary.head).line;
                let last = engine.line_count().saturating_sub(1);
                let end_line = (line + count - 1).min(last);
                let start = engine.line_start_offset(line);
                let end = (engine.line_end_offset(end_line) + 1).min(engine.len());
                let mut text = engine.text_range(start, end);
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                text
            }
        };
        let bytes = yanked.len();
        ctx.data_mut().set_register_text(yanked);
        trace!(target: "handlers.editor", op = local, bytes, "yank");
        Ok(ActionResult::success()
            .with_message(format!("yanked {bytes} bytes"))
            .with_data("bytes", Value::Int(bytes as i64)))
    }

    fn paste(
        &self,
        ctx: &mut ExecutionContext<'_>,
        before: bool,
    ) -> Result<ActionResult, ActionError> {
        let Some(register) = ctx.data().register_text().map(str::to_string) else {
            return Ok(ActionResult::noop().with_message("paste: register empty"));
        };
        let (engine, cursors, history) = ctx.edit_parts()?;
        let linewise = register.ends_with('\n');
        let result = apply_planned(engine, cursors, history, "paste", |engine, sel| {
            if linewise {
                let line = engine.offset_to_point(sel.head).line;
                if before {
                    let at = engine.line_start_offset(line);
                    Some(PlannedEdit {
                        range: Range::empty(at),
                        new_text: register.clone(),
                        cursor: at,
                    })
                } else if line + 1 < engine.line_count() {
                    let at = engine.line_start_offset(line + 1);
                    Some(PlannedEdit {
                        range: Range::empty(at),
                        new_text: register.clone(),
                        cursor: at,
                    })
                } else {
                    // Pasting below the final line: lead with a newline and
                    // drop the register's trailing one.
                    let at = engine.len();
                    let body = &register[..register.len() - 1];
                    Some(PlannedEdit {
                        range: Range::empty(at),
                        new_text: format!("\n{body}"),
                        cursor: at + 1,
                    })
                }
            } else {
                let text = engine.text();
                let at = if before {
                    sel.head
                } else {
                    next_rune_end(&text, sel.head)
                };
                Some(PlannedEdit {
                    range: Range::empty(at),
                    new_text: register.clone(),
                    cursor: at + register.len(),
                })
            }
        })?;
        Ok(result)
    }
}

/// Whitespace prefix to strip for one outdent step: a tab, or up to four
/// leading spaces.
fn leading_indent_len(line: &str) -> usize {
    if line.starts_with('\t') {
        return 1;
    }
    line.bytes().take(4).take_while(|&b| b == b' ').count()
}

/// Drive `plan` over the selections in descending head order, apply each
/// planned replacement, shift already-placed cursors, group in history when
/// several cursors edit, and assemble the result.
fn apply_planned(
    engine: &mut DynEngine<'_>,
    cursors: &mut CursorSet,
    history: Option<&mut DynHistory<'_>>,
    group: &str,
    plan: impl Fn(&DynEngine<'_>, core_state::Selection) -> Option<PlannedEdit>,
) -> Result<ActionResult, ActionError> {
    let grouped = cursors.is_multi();
    let mut history = history;
    if grouped && let Some(h) = history.as_deref_mut() {
        h.begin_group(group);
    }

    let mut edits: Vec<Edit> = Vec::new();
    let mut placed: Vec<(usize, ByteOffset)> = Vec::new();
    let mut lines: Vec<u32> = Vec::new();
    let mut structural = false;

    let mut order: Vec<usize> = (0..cursors.count()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(cursors.all()[i].head));
    for idx in order {
        let sel = cursors.all()[idx];
        let Some(planned) = plan(&*engine, sel) else {
            placed.push((idx, sel.head));
            continue;
        };
        let tx = engine.replace(planned.range.start, planned.range.end, &planned.new_text)?;
        for (_, target) in placed.iter_mut() {
            if *target > planned.range.start {
                *target = (*target as i64 + tx.delta).max(0) as usize;
            }
        }
        structural |= planned.new_text.contains('\n') || tx.old_text.contains('\n');
        lines.push(engine.offset_to_point(planned.range.start).line);
        placed.push((idx, planned.cursor));
        edits.push(Edit::new(planned.range, planned.new_text, tx.old_text));
    }

    for (idx, target) in placed {
        if let Some(sel) = cursors.selection_mut(idx) {
            sel.move_to(target);
        }
    }
    cursors.clamp(engine.len());
    if grouped && let Some(h) = history.as_deref_mut() {
        h.end_group();
    }

    if edits.is_empty() {
        return Ok(ActionResult::noop());
    }
    let result = ActionResult::success().with_edits(edits);
    Ok(if structural {
        result.with_redraw()
    } else {
        lines.sort_unstable();
        lines.dedup();
        result.with_redraw_lines(lines)
    })
}

impl ActionHandler for EditorHandler {
    fn handle(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult {
        match self.run(action, ctx) {
            Ok(result) => result,
            Err(e) => ActionResult::error(e),
        }
    }
}

impl NamespaceHandler for EditorHandler {
    fn namespace(&self) -> &str {
        "editor"
    }

    fn can_handle(&self, action_name: &str) -> bool {
        let (ns, local) = core_actions::split_name(action_name);
        ns == "editor" && LOCALS.contains(&local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_dispatch::Dispatcher;
    use core_state::{Selection, UndoJournal};
    use core_text::TextEngine;
    use std::sync::Arc;

    fn harness(text: &str, at: usize) -> Dispatcher {
        let d = Dispatcher::default();
        d.install_engine(Box::new(TextEngine::from_str(text)));
        d.install_cursors(CursorSet::single(at));
        d.install_history(Box::new(UndoJournal::new()));
        d.router().register_namespace(Arc::new(EditorHandler::new()));
        d
    }

    fn buffer(d: &Dispatcher) -> String {
        d.read_subsystems(|s| s.engine.as_ref().unwrap().text())
    }

    fn head(d: &Dispatcher) -> usize {
        d.read_subsystems(|s| s.cursors.as_ref().unwrap().primary().head)
    }

    #[test]
    fn insert_text_at_caret() {
        let d = harness("hello world", 5);
        let r = d.dispatch(Action::new("editor.insertText").with_text(","));
        assert_eq!(buffer(&d), "hello, world");
        assert_eq!(head(&d), 6);
        assert_eq!(r.edits.len(), 1);
        assert_eq!(r.edits[0].new_text, ",");
        assert_eq!(r.view_update.redraw_lines, vec![0]);
        assert!(!r.view_update.redraw);
    }

    #[test]
    fn insert_text_replaces_selection() {
        let d = harness("hello world", 0);
        d.write_subsystems(|s| {
            *s.cursors.as_mut().unwrap().primary_mut() = Selection::new(0, 5);
        });
        d.dispatch(Action::new("editor.insertText").with_text("goodbye"));
        assert_eq!(buffer(&d), "goodbye world");
        assert_eq!(head(&d), 7);
    }

    #[test]
    fn insert_missing_text_is_invalid() {
        let d = harness("x", 0);
        let r = d.dispatch(Action::new("editor.insertText"));
        assert!(r.is_error());
        assert!(r.message.unwrap().contains("missing text"));
    }

    #[test]
    fn newline_triggers_full_redraw() {
        let d = harness("ab", 1);
        let r = d.dispatch(Action::new("editor.insertNewline"));
        assert_eq!(buffer(&d), "a\nb");
        assert_eq!(head(&d), 2);
        assert!(r.view_update.redraw);
    }

    #[test]
    fn delete_char_respects_count_and_runes() {
        let d = harness("a\u{1f600}bc", 1);
        let r = d.dispatch(Action::new("editor.deleteChar").with_count(2));
        assert_eq!(buffer(&d), "ac");
        assert_eq!(head(&d), 1);
        assert_eq!(r.edits[0].old_text, "\u{1f600}b");
    }

    #[test]
    fn delete_char_back_stops_at_start() {
        let d = harness("abc", 1);
        d.dispatch(Action::new("editor.deleteCharBack").with_count(5));
        assert_eq!(buffer(&d), "bc");
        assert_eq!(head(&d), 0);
        // Nothing left behind the cursor.
        let r = d.dispatch(Action::new("editor.deleteCharBack"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn delete_word_uses_word_forward_target() {
        let d = harness("foo bar baz", 0);
        d.dispatch(Action::new("editor.deleteWord"));
        assert_eq!(buffer(&d), "bar baz");
        d.dispatch(Action::new("editor.deleteWord").with_count(2));
        assert_eq!(buffer(&d), "");
    }

    #[test]
    fn delete_line_takes_trailing_newline() {
        let d = harness("one\ntwo\nthree", 5);
        d.dispatch(Action::new("editor.deleteLine"));
        assert_eq!(buffer(&d), "one\nthree");
        assert_eq!(head(&d), 4);
    }

    #[test]
    fn delete_last_line_takes_preceding_newline() {
        let d = harness("one\ntwo", 5);
        d.dispatch(Action::new("editor.deleteLine"));
        assert_eq!(buffer(&d), "one");
    }

    #[test]
    fn delete_line_with_count_spans_lines() {
        let d = harness("a\nb\nc\nd", 0);
        d.dispatch(Action::new("editor.deleteLine").with_count(2));
        assert_eq!(buffer(&d), "c\nd");
    }

    #[test]
    fn delete_to_line_end_stops_before_newline() {
        let d = harness("hello world\nnext", 5);
        d.dispatch(Action::new("editor.deleteToLineEnd"));
        assert_eq!(buffer(&d), "hello\nnext");
    }

    #[test]
    fn yank_then_paste_line() {
        let d = harness("one\ntwo\nthree", 0);
        let r = d.dispatch(Action::new("editor.yankLine"));
        assert!(r.is_ok());
        d.dispatch(Action::new("editor.paste"));
        assert_eq!(buffer(&d), "one\none\ntwo\nthree");
        assert_eq!(head(&d), 4);
    }

    #[test]
    fn paste_linewise_below_last_line() {
        let d = harness("one\ntwo", 5);
        d.dispatch(Action::new("editor.yankLine"));
        d.dispatch(Action::new("editor.paste"));
        assert_eq!(buffer(&d), "one\ntwo\ntwo");
    }

    #[test]
    fn paste_charwise_after_cursor() {
        let d = harness("abc", 0);
        d.write_subsystems(|s| {
            *s.cursors.as_mut().unwrap().primary_mut() = Selection::new(0, 2);
        });
        d.dispatch(Action::new("editor.yankSelection"));
        d.write_subsystems(|s| {
            *s.cursors.as_mut().unwrap().primary_mut() = Selection::caret(2);
        });
        d.dispatch(Action::new("editor.paste"));
        assert_eq!(buffer(&d), "abcab");
    }

    #[test]
    fn paste_empty_register_noops() {
        let d = harness("abc", 0);
        let r = d.dispatch(Action::new("editor.paste"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn yank_selection_requires_selection() {
        let d = harness("abc", 1);
        let r = d.dispatch(Action::new("editor.yankSelection"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn indent_and_outdent_shift_cursor() {
        let d = harness("line", 2);
        d.dispatch(Action::new("editor.indentLine"));
        assert_eq!(buffer(&d), "    line");
        assert_eq!(head(&d), 6);
        d.dispatch(Action::new("editor.outdentLine"));
        assert_eq!(buffer(&d), "line");
        assert_eq!(head(&d), 2);
        // Nothing more to strip.
        let r = d.dispatch(Action::new("editor.outdentLine"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn outdent_strips_tab_or_partial_spaces() {
        let d = harness("\tx\n  y", 1);
        d.dispatch(Action::new("editor.outdentLine"));
        assert_eq!(buffer(&d), "x\n  y");
        let d2 = harness("  y", 2);
        d2.dispatch(Action::new("editor.outdentLine"));
        assert_eq!(buffer(&d2), "y");
        assert_eq!(head(&d2), 0);
    }

    #[test]
    fn multi_cursor_insert_hits_every_cursor_once() {
        let d = harness("aa bb", 0);
        d.write_subsystems(|s| {
            s.cursors.as_mut().unwrap().add(Selection::caret(3));
        });
        let r = d.dispatch(Action::new("editor.insertText").with_text("_"));
        assert_eq!(buffer(&d), "_aa _bb");
        assert_eq!(r.edits.len(), 2);
        d.read_subsystems(|s| {
            let heads: Vec<usize> =
                s.cursors.as_ref().unwrap().all().iter().map(|s| s.head).collect();
            assert_eq!(heads, vec![1, 5]);
            // Two cursors edited: one closed history group.
            assert!(s.history.as_ref().unwrap().can_undo());
            assert!(!s.history.as_ref().unwrap().is_grouping());
        });
    }

    #[test]
    fn delete_does_not_touch_the_register() {
        let d = harness("doomed line\nkeep", 0);
        d.dispatch(Action::new("editor.deleteLine"));
        assert_eq!(buffer(&d), "keep");
        // Only explicit yanks populate the register.
        let r = d.dispatch(Action::new("editor.paste"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
        assert_eq!(buffer(&d), "keep");
    }

    #[test]
    fn cursor_clamped_after_edits() {
        let d = harness("abcdef", 6);
        d.dispatch(Action::new("editor.deleteCharBack").with_count(3));
        assert_eq!(buffer(&d), "abc");
        assert_eq!(head(&d), 3);
    }
}

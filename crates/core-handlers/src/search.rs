//! The `search.*` namespace: regex search with wrap, word-under-cursor
//! seeding, and line-wise replace.
//!
//! Direction and the compiled pattern live in the context data bag under the
//! search-state slot, so `search.next` / `search.prev` continue whatever the
//! last `search.forward` / `search.backward` set up.

use core_actions::{Action, ActionError, ActionResult, Edit, Value};
use core_dispatch::{ActionHandler, ExecutionContext, NamespaceHandler, SearchState};
use core_text::rune::{is_word_rune, next_rune_end, prev_rune_start};
use core_text::{ByteOffset, Range};
use regex::Regex;
use tracing::{debug, trace};

const LOCALS: &[&str] = &[
    "forward",
    "backward",
    "next",
    "prev",
    "wordForward",
    "wordBackward",
    "replace",
    "clear",
];

#[derive(Default)]
pub struct SearchHandler;

/// Compile `pattern`, prepending `(?i)` when case-insensitive.
fn compile(pattern: &str, case_sensitive: bool) -> Result<Regex, ActionError> {
    let source = if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){pattern}")
    };
    Regex::new(&source)
        .map_err(|e| ActionError::InvalidAction(format!("search: invalid pattern: {e}")))
}

impl SearchHandler {
    pub fn new() -> Self {
        Self
    }

    fn run(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ActionError> {
        match action.local() {
            "forward" | "backward" => {
                let forward = action.local() == "forward";
                let pattern = action.args.search_pattern.clone().ok_or_else(|| {
                    ActionError::InvalidAction("search: missing pattern".into())
                })?;
                let case_sensitive = !action.args.flag("ignore_case");
                let compiled = compile(&pattern, case_sensitive)?;
                ctx.data_mut().set_search_state(SearchState {
                    pattern,
                    compiled,
                    forward,
                    case_sensitive,
                });
                if forward {
                    self.find_next(ctx)
                } else {
                    self.find_prev(ctx)
                }
            }
            "next" | "prev" => {
                let reverse = action.local() == "prev";
                let Some(state) = ctx.data().search_state() else {
                    return Ok(ActionResult::noop().with_message("search: no previous search"));
                };
                let forward = state.forward != reverse;
                if forward {
                    self.find_next(ctx)
                } else {
                    self.find_prev(ctx)
                }
            }
            "wordForward" | "wordBackward" => {
                let forward = action.local() == "wordForward";
                let Some(word) = self.word_under_cursor(ctx)? else {
                    return Ok(ActionResult::noop().with_message("search: no word under cursor"));
                };
                let pattern = format!(r"\b{}\b", regex::escape(&word));
                let compiled = compile(&pattern, true)?;
                ctx.data_mut().set_search_state(SearchState {
                    pattern,
                    compiled,
                    forward,
                    case_sensitive: true,
                });
                if forward {
                    self.find_next(ctx)
                } else {
                    self.find_prev(ctx)
                }
            }
            "replace" => self.replace_in_range(action, ctx),
            "clear" => {
                ctx.data_mut().clear_search_state();
                Ok(ActionResult::success().with_message("search cleared"))
            }
            other => Err(ActionError::InvalidAction(format!(
                "search: unknown operation {other}"
            ))),
        }
    }

    /// Contiguous run of word runes around the primary cursor.
    fn word_under_cursor(
        &self,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Option<String>, ActionError> {
        let (engine, cursors) = ctx.motion_parts()?;
        let text = engine.text();
        let head = cursors.primary().head.min(text.len());
        let on_word = |o: ByteOffset| {
            core_text::rune::rune_at(&text, o).map(is_word_rune).unwrap_or(false)
        };
        if !on_word(head) {
            return Ok(None);
        }
        let mut start = head;
        while start > 0 && on_word(prev_rune_start(&text, start)) {
            start = prev_rune_start(&text, start);
        }
        let mut end = head;
        while on_word(end) {
            end = next_rune_end(&text, end);
        }
        Ok(Some(text[start..end].to_string()))
    }

    /// Forward search from just past the primary cursor, wrapping to the
    /// buffer start when nothing matches ahead.
    fn find_next(&self, ctx: &mut ExecutionContext<'_>) -> Result<ActionResult, ActionError> {
        let (pattern, regex) = {
            let state = ctx
                .data()
                .search_state()
                .ok_or_else(|| ActionError::InvalidAction("search: no previous search".into()))?;
            (state.pattern.clone(), state.compiled.clone())
        };
        let (engine, cursors) = ctx.motion_parts()?;
        let text = engine.text();
        let head = cursors.primary().head;
        // Start just past the cursor (next rune boundary); from the buffer
        // end the search restarts at 0.
        let start = if head >= text.len() {
            0
        } else {
            next_rune_end(&text, head)
        };

        // Wrap scans the whole text rather than text[..start]: a match the
        // cursor currently sits inside straddles the split point and would
        // otherwise be unfindable.
        let (target, wrapped) = match regex.find(&text[start..]) {
            Some(m) => (Some(start + m.start()), false),
            None if start > 0 => (regex.find(&text).map(|m| m.start()), true),
            None => (None, false),
        };
        let Some(target) = target else {
            return Ok(
                ActionResult::noop().with_message(format!("search: pattern not found: {pattern}"))
            );
        };
        cursors.primary_mut().move_to(target);
        let point = engine.offset_to_point(target);
        trace!(target: "handlers.search", %pattern, offset = target, wrapped, "match");
        let message = if wrapped {
            format!("search: {pattern} (wrapped)")
        } else {
            format!("search: {pattern}")
        };
        Ok(ActionResult::success()
            .with_message(message)
            .with_scroll_to(point.line, point.column, true)
            .with_redraw())
    }

    /// Backward search: last match before the cursor, wrapping to the last
    /// match in the remainder.
    fn find_prev(&self, ctx: &mut ExecutionContext<'_>) -> Result<ActionResult, ActionError> {
        let (pattern, regex) = {
            let state = ctx
                .data()
                .search_state()
                .ok_or_else(|| ActionError::InvalidAction("search: no previous search".into()))?;
            (state.pattern.clone(), state.compiled.clone())
        };
        let (engine, cursors) = ctx.motion_parts()?;
        let text = engine.text();
        let head = cursors.primary().head.min(text.len());

        let (target, wrapped) = match regex.find_iter(&text[..head]).last() {
            Some(m) => (Some(m.start()), false),
            None => (regex.find_iter(&text).last().map(|m| m.start()), true),
        };
        let Some(target) = target else {
            return Ok(
                ActionResult::noop().with_message(format!("search: pattern not found: {pattern}"))
            );
        };
        cursors.primary_mut().move_to(target);
        let point = engine.offset_to_point(target);
        trace!(target: "handlers.search", %pattern, offset = target, wrapped, "match (backward)");
        let message = if wrapped {
            format!("search: {pattern} (wrapped)")
        } else {
            format!("search: {pattern}")
        };
        Ok(ActionResult::success()
            .with_message(message)
            .with_scroll_to(point.line, point.column, true)
            .with_redraw())
    }

    /// Line-wise replace over an inclusive line range, processed in reverse
    /// index order so earlier line offsets stay valid.
    fn replace_in_range(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ActionResult, ActionError> {
        let pattern = action
            .args
            .search_pattern
            .clone()
            .ok_or_else(|| ActionError::InvalidAction("search: missing pattern".into()))?;
        let replacement = action.args.text.clone().unwrap_or_default();
        let global = action.args.flag("global");
        let case_sensitive = !action.args.flag("ignore_case");
        let regex = compile(&pattern, case_sensitive)?;

        let (engine, cursors, history) = ctx.edit_parts()?;
        let line_count = engine.line_count();
        let start_line: u32 = action
            .args
            .get("start_line")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let end_line: u32 = action
            .args
            .get("end_line")
            .and_then(|v| v.parse().ok())
            .unwrap_or(line_count.saturating_sub(1))
            .min(line_count.saturating_sub(1));
        if start_line > end_line {
            return Err(ActionError::InvalidAction(format!(
                "search: invalid line range {start_line}..{end_line}"
            )));
        }

        let mut history = history;
        if let Some(h) = history.as_deref_mut() {
            h.begin_group("replace");
        }
        let mut edits = Vec::new();
        let mut changed_lines = Vec::new();
        for line in (start_line..=end_line).rev() {
            let content = engine.line_text(line);
            let new_content = if global {
                regex.replace_all(&content, replacement.as_str()).into_owned()
            } else {
                regex.replace(&content, replacement.as_str()).into_owned()
            };
            if new_content == content {
                continue;
            }
            let start = engine.line_start_offset(line);
            let end = engine.line_end_offset(line);
            engine.replace(start, end, &new_content)?;
            edits.push(Edit::new(Range::new(start, end), new_content, content));
            changed_lines.push(line);
        }
        cursors.clamp(engine.len());
        if let Some(h) = history.as_deref_mut() {
            h.end_group();
        }

        let count = changed_lines.len();
        debug!(target: "handlers.search", %pattern, lines = count, global, "replace");
        if count == 0 {
            return Ok(
                ActionResult::noop().with_message(format!("replace: no match for {pattern}"))
            );
        }
        changed_lines.sort_unstable();
        Ok(ActionResult::success()
            .with_message(format!("replace: {count} lines changed"))
            .with_data("replaced_lines", Value::Int(count as i64))
            .with_edits(edits)
            .with_redraw_lines(changed_lines))
    }
}

impl ActionHandler for SearchHandler {
    fn handle(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult {
        match self.run(action, ctx) {
            Ok(result) => result,
            Err(e) => ActionResult::error(e),
        }
    }
}

impl NamespaceHandler for SearchHandler {
    fn namespace(&self) -> &str {
        "search"
    }

    fn can_handle(&self, action_name: &str) -> bool {
        let (ns, local) = core_actions::split_name(action_name);
        ns == "search" && LOCALS.contains(&local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_dispatch::Dispatcher;
    use core_state::{CursorSet, UndoJournal};
    use core_text::{Engine, TextEngine};
    use std::sync::Arc;

    fn harness(text: &str, at: usize) -> Dispatcher {
        let d = Dispatcher::default();
        d.install_engine(Box::new(TextEngine::from_str(text)));
        d.install_cursors(CursorSet::single(at));
        d.install_history(Box::new(UndoJournal::new()));
        d.router().register_namespace(Arc::new(SearchHandler::new()));
        d
    }

    fn head(d: &Dispatcher) -> usize {
        d.read_subsystems(|s| s.cursors.as_ref().unwrap().primary().head)
    }

    #[test]
    fn forward_finds_next_match() {
        let d = harness("foo bar foo baz", 0);
        let r = d.dispatch(Action::new("search.forward").with_pattern("foo"));
        assert!(r.is_ok());
        assert_eq!(head(&d), 8);
        assert_eq!(r.message.as_deref(), Some("search: foo"));
        let scroll = r.view_update.scroll_to.unwrap();
        assert!(scroll.center);
    }

    #[test]
    fn forward_wraps_from_last_match() {
        let d = harness("foo bar baz", 8);
        let r = d.dispatch(Action::new("search.forward").with_pattern("foo"));
        assert_eq!(head(&d), 0);
        assert!(r.message.unwrap().contains("(wrapped)"));
    }

    #[test]
    fn not_found_is_noop_with_message() {
        let d = harness("foo bar", 0);
        let r = d.dispatch(Action::new("search.forward").with_pattern("zzz"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
        assert!(r.message.unwrap().contains("pattern not found: zzz"));
    }

    #[test]
    fn invalid_pattern_is_error() {
        let d = harness("foo", 0);
        let r = d.dispatch(Action::new("search.forward").with_pattern("[unclosed"));
        assert!(r.is_error());
        assert!(r.message.unwrap().contains("search: invalid pattern"));
    }

    #[test]
    fn next_follows_stored_direction_and_prev_reverses() {
        let d = harness("aXbXcX", 0);
        d.dispatch(Action::new("search.forward").with_pattern("X"));
        assert_eq!(head(&d), 1);
        d.dispatch(Action::new("search.next"));
        assert_eq!(head(&d), 3);
        d.dispatch(Action::new("search.next"));
        assert_eq!(head(&d), 5);
        d.dispatch(Action::new("search.prev"));
        assert_eq!(head(&d), 3);
    }

    #[test]
    fn next_without_state_noops() {
        let d = harness("abc", 0);
        let r = d.dispatch(Action::new("search.next"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn backward_takes_last_match_before_cursor() {
        let d = harness("foo foo foo", 8);
        let r = d.dispatch(Action::new("search.backward").with_pattern("foo"));
        assert_eq!(head(&d), 4);
        assert!(!r.message.unwrap().contains("wrapped"));
    }

    #[test]
    fn backward_wraps_to_tail_match() {
        let d = harness("bar foo", 0);
        let r = d.dispatch(Action::new("search.backward").with_pattern("foo"));
        assert_eq!(head(&d), 4);
        assert!(r.message.unwrap().contains("(wrapped)"));
    }

    #[test]
    fn case_insensitive_flag_compiles_prefix() {
        let d = harness("Foo bar baz", 6);
        let r = d
            .dispatch(Action::new("search.forward").with_pattern("foo").with_arg("ignore_case", "true"));
        assert!(r.is_ok());
        assert_eq!(head(&d), 0, "wraps to the case-folded match");
        assert!(r.message.unwrap().contains("(wrapped)"));
    }

    #[test]
    fn word_under_cursor_seeds_bounded_pattern() {
        let d = harness("bar foobar foo bar", 1);
        d.dispatch(Action::new("search.wordForward"));
        // \bbar\b must skip "foobar".
        assert_eq!(head(&d), 15);
    }

    #[test]
    fn word_search_off_word_noops() {
        let d = harness("a  b", 1);
        let r = d.dispatch(Action::new("search.wordForward"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
        assert!(r.message.unwrap().contains("no word under cursor"));
    }

    #[test]
    fn replace_global_changes_all_lines() {
        let d = harness("foo a\nfoo b\nc foo foo", 0);
        let r = d.dispatch(
            Action::new("search.replace")
                .with_pattern("foo")
                .with_text("qux")
                .with_arg("global", "true"),
        );
        assert!(r.is_ok());
        assert_eq!(
            d.read_subsystems(|s| s.engine.as_ref().unwrap().text()),
            "qux a\nqux b\nc qux qux"
        );
        assert_eq!(r.data.get("replaced_lines"), Some(&Value::Int(3)));
        assert_eq!(r.view_update.redraw_lines, vec![0, 1, 2]);
    }

    #[test]
    fn replace_non_global_touches_first_match_per_line() {
        let d = harness("foo foo", 0);
        d.dispatch(Action::new("search.replace").with_pattern("foo").with_text("x"));
        assert_eq!(
            d.read_subsystems(|s| s.engine.as_ref().unwrap().text()),
            "x foo"
        );
    }

    #[test]
    fn replace_respects_line_range() {
        let d = harness("foo\nfoo\nfoo", 0);
        d.dispatch(
            Action::new("search.replace")
                .with_pattern("foo")
                .with_text("bar")
                .with_arg("start_line", "1")
                .with_arg("end_line", "1"),
        );
        assert_eq!(
            d.read_subsystems(|s| s.engine.as_ref().unwrap().text()),
            "foo\nbar\nfoo"
        );
    }

    #[test]
    fn replace_without_match_noops() {
        let d = harness("abc", 0);
        let r = d.dispatch(Action::new("search.replace").with_pattern("zzz").with_text("y"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn clear_resets_state() {
        let d = harness("foo foo", 0);
        d.dispatch(Action::new("search.forward").with_pattern("foo"));
        let r = d.dispatch(Action::new("search.clear"));
        assert_eq!(r.message.as_deref(), Some("search cleared"));
        let r = d.dispatch(Action::new("search.next"));
        assert_eq!(r.status, core_actions::ActionStatus::NoOp);
    }

    #[test]
    fn multibyte_text_searches_from_rune_boundary() {
        let d = harness("\u{1f600}foo", 0);
        let r = d.dispatch(Action::new("search.forward").with_pattern("foo"));
        assert!(r.is_ok());
        assert_eq!(head(&d), 4);
    }
}

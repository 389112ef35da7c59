//! The `mode.*` namespace: transitions plus the composite entries that
//! mutate cursors (and sometimes the buffer) before switching.
//!
//! Multi-cursor edits are applied in descending head order so earlier edits
//! never invalidate later offsets, and are bracketed in a history group when
//! more than one cursor is involved.

use core_actions::{Action, ActionError, ActionResult, Edit};
use core_dispatch::{ActionHandler, ExecutionContext, NamespaceHandler};
use core_state::mode;
use core_text::rune::{next_rune_end, rune_at};
use core_text::Range;
use tracing::trace;

const LOCALS: &[&str] = &[
    "normal",
    "insert",
    "insertLineStart",
    "append",
    "appendLineEnd",
    "openBelow",
    "openAbove",
    "visual",
    "visualLine",
    "visualBlock",
    "command",
    "replace",
    "replaceChar",
];

#[derive(Default)]
pub struct ModeHandler;

impl ModeHandler {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> Result<ActionResult, ActionError> {
        let local = action.local();
        let count = ctx.count;
        let result = match local {
            "insert" => ActionResult::success().with_mode_change(mode::INSERT),
            "command" => ActionResult::success().with_mode_change(mode::COMMAND),
            "replace" => ActionResult::success().with_mode_change(mode::REPLACE),
            "visualBlock" => ActionResult::success().with_mode_change(mode::VISUAL_BLOCK),
            "normal" => {
                let cursors = ctx.cursors_mut()?;
                cursors.map_in_place(|sel| {
                    if !sel.is_empty() {
                        sel.collapse_to_start();
                    }
                });
                ActionResult::success()
                    .with_mode_change(mode::NORMAL)
                    .with_redraw()
            }
            "visual" => {
                let cursors = ctx.cursors_mut()?;
                cursors.map_in_place(|sel| sel.anchor = sel.head);
                ActionResult::success()
                    .with_mode_change(mode::VISUAL)
                    .with_redraw()
            }
            "visualLine" => {
                let (engine, cursors) = ctx.motion_parts()?;
                let len = engine.len();
                cursors.map_in_place(|sel| {
                    let line = engine.offset_to_point(sel.head).line;
                    let start = engine.line_start_offset(line);
                    let end = engine.line_end_offset(line);
                    // Include the trailing newline when the line has one.
                    let end = if end < len { end + 1 } else { end };
                    sel.anchor = start;
                    sel.head = end;
                });
                ActionResult::success()
                    .with_mode_change(mode::VISUAL_LINE)
                    .with_redraw()
            }
            "insertLineStart" => {
                let (engine, cursors) = ctx.motion_parts()?;
                cursors.map_in_place(|sel| {
                    sel.move_to(crate::motion::first_non_blank(engine, sel.head));
                });
                ActionResult::success()
                    .with_mode_change(mode::INSERT)
                    .with_redraw()
            }
            "append" => {
                let (engine, cursors) = ctx.motion_parts()?;
                let text = engine.text();
                let len = engine.len();
                cursors.map_in_place(|sel| {
                    sel.move_to(next_rune_end(&text, sel.head).min(len));
                });
                ActionResult::success()
                    .with_mode_change(mode::INSERT)
                    .with_redraw()
            }
            "appendLineEnd" => {
                let (engine, cursors) = ctx.motion_parts()?;
                cursors.map_in_place(|sel| {
                    sel.move_to(engine.line_end_offset(engine.offset_to_point(sel.head).line));
                });
                ActionResult::success()
                    .with_mode_change(mode::INSERT)
                    .with_redraw()
            }
            "openBelow" => self.open_line(ctx, true)?,
            "openAbove" => self.open_line(ctx, false)?,
            "replaceChar" => self.replace_char(ctx, action, count)?,
            other => {
                return Err(ActionError::InvalidAction(format!(
                    "mode: unknown transition {other}"
                )));
            }
        };
        trace!(target: "handlers.mode", action = local, mode = result.mode_change.as_deref().unwrap_or("-"), "mode action");
        Ok(result)
    }

    /// `o` / `O`: insert a newline at each cursor's line end (below) or line
    /// start (above) and leave the cursor on the fresh empty line.
    fn open_line(
        &self,
        ctx: &mut ExecutionContext<'_>,
        below: bool,
    ) -> Result<ActionResult, ActionError> {
        let (engine, cursors, history) = ctx.edit_parts()?;
        let grouped = cursors.is_multi();
        let mut history = history;
        if grouped && let Some(h) = history.as_deref_mut() {
            h.begin_group(if below { "open-below" } else { "open-above" });
        }

        let mut edits = Vec::new();
        // Descending head order keeps pending selection offsets valid; the
        // targets already placed above each insertion shift with it.
        let mut placed: Vec<(usize, usize)> = Vec::new();
        let mut order: Vec<usize> = (0..cursors.count()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(cursors.all()[i].head));
        for idx in order {
            let sel = cursors.all()[idx];
            let line = engine.offset_to_point(sel.head).line;
            let at = if below {
                engine.line_end_offset(line)
            } else {
                engine.line_start_offset(line)
            };
            let tx = engine.insert(at, "\n")?;
            for (_, target) in placed.iter_mut() {
                if *target >= at {
                    *target += 1;
                }
            }
            // Below: cursor starts the new line (just past the inserted
            // newline). Above: the insertion offset is the new empty line.
            placed.push((idx, if below { at + 1 } else { at }));
            edits.push(Edit::new(Range::empty(at), "\n", tx.old_text));
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
        Ok(ActionResult::success()
            .with_mode_change(mode::INSERT)
            .with_edits(edits)
            .with_redraw())
    }

    /// `r{char}`: replace up to `count` runes with the argument rune, never
    /// crossing the end of the line.
    fn replace_char(
        &self,
        ctx: &mut ExecutionContext<'_>,
        action: &Action,
        count: u32,
    ) -> Result<ActionResult, ActionError> {
        let ch = action
            .args
            .text
            .as_deref()
            .and_then(|t| t.chars().next())
            .ok_or_else(|| ActionError::InvalidAction("mode.replaceChar: empty char".into()))?;

        let (engine, cursors, history) = ctx.edit_parts()?;
        let grouped = cursors.is_multi();
        let mut history = history;
        if grouped && let Some(h) = history.as_deref_mut() {
            h.begin_group("replace-char");
        }

        let mut edits = Vec::new();
        let mut lines = Vec::new();
        // (cursor index, final head) — heads above an applied edit shift by
        // its delta, e.g. when a multi-byte rune is replaced by an ASCII one.
        let mut placed: Vec<(usize, usize)> = Vec::new();
        let mut order: Vec<usize> = (0..cursors.count()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(cursors.all()[i].head));
        for idx in order {
            let head = cursors.all()[idx].head;
            let text = engine.text();
            let mut end = head;
            let mut replaced = 0u32;
            while replaced < count {
                match rune_at(&text, end) {
                    Some('\n') | None => break,
                    Some(_) => {
                        end = next_rune_end(&text, end);
                        replaced += 1;
                    }
                }
            }
            if replaced > 0 {
                let replacement: String =
                    std::iter::repeat(ch).take(replaced as usize).collect();
                let tx = engine.replace(head, end, &replacement)?;
                for (_, target) in placed.iter_mut() {
                    if *target > head {
                        *target = (*target as i64 + tx.delta).max(0) as usize;
                    }
                }
                lines.push(engine.offset_to_point(head).line);
                edits.push(Edit::new(Range::new(head, end), replacement, tx.old_text));
            }
            placed.push((idx, head));
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
        Ok(ActionResult::success()
            .with_edits(edits)
            .with_redraw_lines(lines))
    }
}

impl ActionHandler for ModeHandler {
    fn handle(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult {
        match self.run(action, ctx) {
            Ok(result) => result,
            Err(e) => ActionResult::error(e),
        }
    }
}

impl NamespaceHandler for ModeHandler {
    fn namespace(&self) -> &str {
        "mode"
    }

    fn can_handle(&self, action_name: &str) -> bool {
        let (ns, local) = core_actions::split_name(action_name);
        ns == "mode" && LOCALS.contains(&local)
    }
}

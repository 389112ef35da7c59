//! The `cursor.*` namespace: motions applied across the whole cursor set.
//!
//! Every motion maps over the selections: in visual context (any non-empty
//! selection) the head extends, otherwise the selection collapses onto the
//! target. Motions on an empty buffer are no-ops.

use core_actions::{Action, ActionError, ActionResult};
use core_dispatch::{ActionHandler, ExecutionContext, NamespaceHandler};
use core_state::{CursorSet, Renderer};
use core_text::ByteOffset;
use tracing::trace;

use crate::motion;

const LOCALS: &[&str] = &[
    "moveLeft",
    "moveRight",
    "moveUp",
    "moveDown",
    "lineStart",
    "lineEnd",
    "firstLine",
    "lastLine",
    "firstNonBlank",
    "wordForward",
    "wordBackward",
    "wordEndForward",
    "bigWordForward",
    "bigWordBackward",
    "bigWordEndForward",
    "gotoLine",
    "gotoColumn",
    "gotoPercent",
    "matchingBracket",
    "paragraphForward",
    "paragraphBackward",
    "sentenceForward",
    "sentenceBackward",
    "screenTop",
    "screenMiddle",
    "screenBottom",
];

#[derive(Default)]
pub struct CursorHandler;

impl CursorHandler {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> Result<ActionResult, ActionError> {
        let count = ctx.count;
        let extend = ctx.has_selection();
        // Screen motions consult the renderer before the engine borrow.
        let visible = ctx.renderer().map(|r| r.visible_line_range());
        let (engine, cursors) = ctx.motion_parts()?;

        if engine.is_empty() {
            return Ok(ActionResult::noop());
        }
        let before = cursors.primary().head;
        let text = engine.text();
        let local = action.local();

        match local {
            "moveLeft" => apply(cursors, extend, |o| motion::left(&text, o, count)),
            "moveRight" => {
                let max = engine.len();
                apply(cursors, extend, |o| motion::right(&text, o, count).min(max));
            }
            "moveUp" => apply(cursors, extend, |o| motion::vertical(engine, o, -(count as i64))),
            "moveDown" => apply(cursors, extend, |o| motion::vertical(engine, o, count as i64)),
            "lineStart" => apply(cursors, extend, |o| {
                engine.line_start_offset(engine.offset_to_point(o).line)
            }),
            "lineEnd" => apply(cursors, extend, |o| {
                engine.line_end_offset(engine.offset_to_point(o).line)
            }),
            "firstLine" => apply(cursors, extend, |_| engine.line_start_offset(0)),
            "lastLine" => {
                let last = engine.line_count().saturating_sub(1);
                apply(cursors, extend, |_| engine.line_start_offset(last));
            }
            "firstNonBlank" => apply(cursors, extend, |o| motion::first_non_blank(engine, o)),
            "wordForward" => apply(cursors, extend, |o| motion::word_forward(&text, o, false, count)),
            "wordBackward" => {
                apply(cursors, extend, |o| motion::word_backward(&text, o, false, count))
            }
            "wordEndForward" => {
                apply(cursors, extend, |o| motion::word_end_forward(&text, o, false, count))
            }
            "bigWordForward" => {
                apply(cursors, extend, |o| motion::word_forward(&text, o, true, count))
            }
            "bigWordBackward" => {
                apply(cursors, extend, |o| motion::word_backward(&text, o, true, count))
            }
            "bigWordEndForward" => {
                apply(cursors, extend, |o| motion::word_end_forward(&text, o, true, count))
            }
            "gotoLine" => {
                // 1-indexed externally; clamp into [1, line_count].
                let line = count.max(1).min(engine.line_count()) - 1;
                apply(cursors, extend, |_| engine.line_start_offset(line));
            }
            "gotoColumn" => {
                // 1-indexed externally: count 1 targets column 0.
                let column = count.max(1) - 1;
                apply(cursors, extend, |o| {
                    let point = engine.offset_to_point(o);
                    let clamped = (column as usize).min(engine.line_len(point.line)) as u32;
                    engine.point_to_offset(core_text::Point::new(point.line, clamped))
                });
            }
            "gotoPercent" => {
                let percent = count.clamp(1, 100) as u64;
                let line_count = engine.line_count() as u64;
                let target = ((line_count * percent) / 100).min(line_count - 1) as u32;
                apply(cursors, extend, |_| engine.line_start_offset(target));
            }
            "matchingBracket" => {
                let Some(target) = motion::matching_bracket(engine, &text, cursors.primary().head)
                else {
                    return Ok(ActionResult::noop());
                };
                apply(cursors, extend, |_| target);
            }
            "paragraphForward" => apply(cursors, extend, |o| {
                let line = motion::paragraph_forward(engine, engine.offset_to_point(o).line, count);
                engine.line_start_offset(line)
            }),
            "paragraphBackward" => apply(cursors, extend, |o| {
                let line = motion::paragraph_backward(engine, engine.offset_to_point(o).line, count);
                engine.line_start_offset(line)
            }),
            "sentenceForward" => {
                apply(cursors, extend, |o| motion::sentence_forward(&text, o, count))
            }
            "sentenceBackward" => {
                apply(cursors, extend, |o| motion::sentence_backward(&text, o, count))
            }
            "screenTop" | "screenMiddle" | "screenBottom" => {
                let target = screen_target_line(local, visible, engine.line_count());
                apply(cursors, extend, |_| engine.line_start_offset(target));
            }
            other => {
                return Err(ActionError::InvalidAction(format!(
                    "cursor: unknown motion {other}"
                )));
            }
        }

        let after = cursors.primary().head;
        trace!(target: "handlers.cursor", motion = local, from = before, to = after, count, "motion");
        Ok(ActionResult::success()
            .with_cursor_delta(after as i64 - before as i64)
            .with_redraw())
    }
}

/// `H` / `M` / `L` target line from the visible range, with line-count
/// fallbacks when no renderer is installed.
fn screen_target_line(local: &str, visible: Option<(u32, u32)>, line_count: u32) -> u32 {
    let last = line_count.saturating_sub(1);
    match visible {
        Some((first, last_visible)) => {
            let last_visible = last_visible.min(last);
            match local {
                "screenTop" => first.min(last),
                "screenMiddle" => (first + (last_visible.saturating_sub(first)) / 2).min(last),
                _ => last_visible,
            }
        }
        None => match local {
            "screenTop" => 0,
            "screenMiddle" => line_count / 2,
            _ => last,
        },
    }
}

fn apply(cursors: &mut CursorSet, extend: bool, target: impl Fn(ByteOffset) -> ByteOffset) {
    cursors.map_in_place(|sel| {
        let new_head = target(sel.head);
        if extend {
            sel.extend(new_head);
        } else {
            sel.move_to(new_head);
        }
    });
}

impl ActionHandler for CursorHandler {
    fn handle(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult {
        match self.run(action, ctx) {
            Ok(result) => result,
            Err(e) => ActionResult::error(e),
        }
    }
}

impl NamespaceHandler for CursorHandler {
    fn namespace(&self) -> &str {
        "cursor"
    }

    fn can_handle(&self, action_name: &str) -> bool {
        core_actions::split_name(action_name).0 == "cursor"
            && LOCALS.contains(&core_actions::split_name(action_name).1)
    }
}

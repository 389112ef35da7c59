//! Hooks the core ships with: count clamping, repeat-last tracking, an edit
//! change journal, logging, and action validation.

use std::collections::VecDeque;
use std::sync::Mutex;

use core_actions::{Action, ActionResult, Edit, split_name};
use tracing::{debug, trace};

use crate::hooks::Hook;
use crate::ExecutionContext;

/// Pre-hook clamping the effective count to a maximum. Always permits.
pub struct CountLimitHook {
    max: u32,
}

impl CountLimitHook {
    pub fn new(max: u32) -> Self {
        Self { max }
    }
}

impl Hook for CountLimitHook {
    fn name(&self) -> &str {
        "count-limit"
    }

    fn is_pre(&self) -> bool {
        true
    }

    fn before(&self, action: &mut Action, ctx: &mut ExecutionContext<'_>) -> bool {
        if self.max > 0 && ctx.count > self.max {
            trace!(target: "dispatch.hooks", action = %action.name, from = ctx.count, to = self.max, "count clamped");
            ctx.count = self.max;
            if action.count > self.max as i32 {
                action.count = self.max as i32;
            }
        }
        true
    }
}

/// Post-hook remembering the last repeatable action.
///
/// Repeatable: namespace `editor` or `mode`, excluding `mode.normal` (leaving
/// a mode is not something `.` should replay).
pub struct RepeatLastHook {
    last: Mutex<Option<Action>>,
}

impl Default for RepeatLastHook {
    fn default() -> Self {
        Self::new()
    }
}

impl RepeatLastHook {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub fn is_repeatable(action: &Action) -> bool {
        let (ns, _) = split_name(&action.name);
        match ns {
            "editor" => true,
            "mode" => action.name != "mode.normal",
            _ => false,
        }
    }

    /// The most recent repeatable action, if any.
    pub fn last_action(&self) -> Option<Action> {
        self.last.lock().expect("repeat-last lock poisoned").clone()
    }
}

impl Hook for RepeatLastHook {
    fn name(&self) -> &str {
        "repeat-last"
    }

    fn is_post(&self) -> bool {
        true
    }

    fn after(&self, action: &Action, _ctx: &mut ExecutionContext<'_>, result: &mut ActionResult) {
        if result.is_error() || !Self::is_repeatable(action) {
            return;
        }
        *self.last.lock().expect("repeat-last lock poisoned") = Some(action.clone());
    }
}

/// One recorded edit with the action that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub action: String,
    pub edit: Edit,
}

/// Post-hook appending result edits to a bounded ring buffer for downstream
/// inspection (AI change feeds, diff gutters, ...).
pub struct ChangeJournalHook {
    cap: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
}

impl ChangeJournalHook {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Journal contents, oldest first.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl Hook for ChangeJournalHook {
    fn name(&self) -> &str {
        "change-journal"
    }

    fn is_post(&self) -> bool {
        true
    }

    fn after(&self, action: &Action, _ctx: &mut ExecutionContext<'_>, result: &mut ActionResult) {
        if result.edits.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().expect("journal lock poisoned");
        for edit in &result.edits {
            entries.push_back(JournalEntry {
                action: action.name.clone(),
                edit: edit.clone(),
            });
            while entries.len() > self.cap {
                entries.pop_front();
            }
        }
    }
}

/// Trivial observability adapter: traces every dispatch entering and leaving.
#[derive(Default)]
pub struct LoggingHook;

impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn priority(&self) -> i32 {
        // Highest priority: observes both phases before anything else runs.
        i32::MAX
    }

    fn is_pre(&self) -> bool {
        true
    }

    fn is_post(&self) -> bool {
        true
    }

    fn before(&self, action: &mut Action, ctx: &mut ExecutionContext<'_>) -> bool {
        trace!(target: "dispatch.hooks", action = %action.name, count = ctx.count, "dispatching");
        true
    }

    fn after(&self, action: &Action, _ctx: &mut ExecutionContext<'_>, result: &mut ActionResult) {
        trace!(target: "dispatch.hooks", action = %action.name, status = ?result.status, edits = result.edits.len(), "dispatched");
    }
}

/// Pre-hook rejecting malformed actions: empty names, negative counts, or a
/// namespace that is not an identifier.
#[derive(Default)]
pub struct ValidationHook;

fn valid_namespace(ns: &str) -> bool {
    let mut chars = ns.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Hook for ValidationHook {
    fn name(&self) -> &str {
        "validation"
    }

    fn is_pre(&self) -> bool {
        true
    }

    fn before(&self, action: &mut Action, _ctx: &mut ExecutionContext<'_>) -> bool {
        if action.name.is_empty() || action.count < 0 {
            debug!(target: "dispatch.hooks", action = %action.name, count = action.count, "rejected malformed action");
            return false;
        }
        let (ns, local) = split_name(&action.name);
        if !ns.is_empty() && (!valid_namespace(ns) || local.is_empty()) {
            debug!(target: "dispatch.hooks", action = %action.name, "rejected malformed name");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subsystems;
    use core_text::Range;

    fn ctx_harness() -> Subsystems {
        Subsystems::default()
    }

    #[test]
    fn count_limit_clamps_context_and_action() {
        let hook = CountLimitHook::new(100);
        let mut subsystems = ctx_harness();
        let mut ctx = ExecutionContext::new(&mut subsystems);
        ctx.count = 5000;
        let mut action = Action::new("cursor.moveDown").with_count(5000);
        assert!(hook.before(&mut action, &mut ctx));
        assert_eq!(ctx.count, 100);
        assert_eq!(action.count, 100);
    }

    #[test]
    fn count_limit_zero_is_disabled() {
        let hook = CountLimitHook::new(0);
        let mut subsystems = ctx_harness();
        let mut ctx = ExecutionContext::new(&mut subsystems);
        ctx.count = 5000;
        let mut action = Action::new("cursor.moveDown");
        assert!(hook.before(&mut action, &mut ctx));
        assert_eq!(ctx.count, 5000);
    }

    #[test]
    fn repeat_last_predicate_is_exact() {
        assert!(RepeatLastHook::is_repeatable(&Action::new(
            "editor.deleteWord"
        )));
        assert!(RepeatLastHook::is_repeatable(&Action::new("mode.openBelow")));
        assert!(!RepeatLastHook::is_repeatable(&Action::new("mode.normal")));
        assert!(!RepeatLastHook::is_repeatable(&Action::new(
            "cursor.moveDown"
        )));
        assert!(!RepeatLastHook::is_repeatable(&Action::new(
            "search.forward"
        )));
        assert!(!RepeatLastHook::is_repeatable(&Action::new("simple")));
    }

    #[test]
    fn repeat_last_records_and_skips_errors() {
        let hook = RepeatLastHook::new();
        let mut subsystems = ctx_harness();
        let mut ctx = ExecutionContext::new(&mut subsystems);

        let action = Action::new("editor.insertText").with_text("x");
        let mut ok = ActionResult::success();
        hook.after(&action, &mut ctx, &mut ok);
        assert_eq!(hook.last_action(), Some(action.clone()));

        let failed = Action::new("editor.deleteLine");
        let mut err =
            ActionResult::error(core_actions::ActionError::InvalidAction("x".into()));
        hook.after(&failed, &mut ctx, &mut err);
        assert_eq!(hook.last_action(), Some(action), "errors must not overwrite");
    }

    #[test]
    fn change_journal_is_bounded() {
        let hook = ChangeJournalHook::new(2);
        let mut subsystems = ctx_harness();
        let mut ctx = ExecutionContext::new(&mut subsystems);
        for i in 0..4u32 {
            let action = Action::new("editor.insertText");
            let mut result = ActionResult::success().with_edit(Edit::new(
                Range::new(i as usize, i as usize),
                "x",
                "",
            ));
            hook.after(&action, &mut ctx, &mut result);
        }
        let entries = hook.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].edit.range, Range::new(2, 2));
        assert_eq!(entries[1].edit.range, Range::new(3, 3));
    }

    #[test]
    fn validation_rejects_malformed() {
        let hook = ValidationHook;
        let mut subsystems = ctx_harness();
        let mut ctx = ExecutionContext::new(&mut subsystems);
        let ok = |name: &str| {
            let mut a = Action::new(name);
            hook.before(&mut a, &mut ExecutionContext::new(&mut Subsystems::default()))
        };
        assert!(ok("cursor.moveDown"));
        assert!(ok("simple"));
        assert!(ok(".leading"));
        assert!(!ok(""));
        assert!(!ok("9bad.name"));
        assert!(!ok("cursor."));
        let mut negative = Action::new("cursor.moveDown").with_count(-1);
        assert!(!hook.before(&mut negative, &mut ctx));
    }
}

//! History (undo grouping) contract and a recording journal implementation.
//!
//! The core drives grouping only: composite multi-cursor edits are bracketed
//! in a named group so the host's undo engine treats them as one step. The
//! journal records what was asked of it, which is all the dispatch tests need.

use tracing::trace;

/// History contract the handlers bracket composite edits with.
pub trait History {
    fn begin_group(&mut self, name: &str);
    fn end_group(&mut self);
    fn cancel_group(&mut self);
    fn is_grouping(&self) -> bool;
    fn can_undo(&self) -> bool;
    fn can_redo(&self) -> bool;
}

/// A closed undo group as recorded by [`UndoJournal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub name: String,
    pub edits: u32,
}

struct OpenGroup {
    name: String,
    depth: u32,
    edits: u32,
}

/// Group-tracking history journal.
///
/// Nested `begin_group` calls are counted and collapse on the matching
/// `end_group`; `cancel_group` discards the open group entirely.
#[derive(Default)]
pub struct UndoJournal {
    open: Option<OpenGroup>,
    records: Vec<GroupRecord>,
    redo_available: bool,
}

impl UndoJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an edit against the open group, if any.
    pub fn note_edit(&mut self) {
        if let Some(open) = &mut self.open {
            open.edits += 1;
        }
    }

    /// Closed groups, oldest first.
    pub fn records(&self) -> &[GroupRecord] {
        &self.records
    }
}

impl History for UndoJournal {
    fn begin_group(&mut self, name: &str) {
        match &mut self.open {
            Some(open) => open.depth += 1,
            None => {
                trace!(target: "state.history", group = name, "begin_group");
                self.open = Some(OpenGroup {
                    name: name.to_string(),
                    depth: 1,
                    edits: 0,
                });
            }
        }
    }

    fn end_group(&mut self) {
        let Some(open) = &mut self.open else {
            return;
        };
        open.depth -= 1;
        if open.depth == 0 {
            let open = self.open.take().expect("checked above");
            trace!(target: "state.history", group = %open.name, edits = open.edits, "end_group");
            self.records.push(GroupRecord {
                name: open.name,
                edits: open.edits,
            });
            self.redo_available = false;
        }
    }

    fn cancel_group(&mut self) {
        if self.open.take().is_some() {
            trace!(target: "state.history", "cancel_group");
        }
    }

    fn is_grouping(&self) -> bool {
        self.open.is_some()
    }

    fn can_undo(&self) -> bool {
        !self.records.is_empty()
    }

    fn can_redo(&self) -> bool {
        self.redo_available
    }
}

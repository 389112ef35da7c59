//! Dispatch outcome value and its fluent builders.

use std::collections::HashMap;

use crate::{ActionError, Edit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionStatus {
    #[default]
    Ok,
    NoOp,
    Error,
    Async,
    Cancelled,
}

/// Scroll request addressed to the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTo {
    pub line: u32,
    pub column: u32,
    pub center: bool,
}

/// What the presenter must repaint after this dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub scroll_to: Option<ScrollTo>,
    pub center_line: Option<u32>,
    pub redraw: bool,
    pub redraw_lines: Vec<u32>,
}

/// Typed slot for the result data map. Handlers report counts and small
/// facts here; anything structural belongs in dedicated result fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
}

/// Outcome of one dispatch. Constructed by handlers via the `with_…`
/// builders; each builder consumes and returns the value, so results never
/// alias each other's edit or redraw vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub error: Option<ActionError>,
    pub message: Option<String>,
    pub edits: Vec<Edit>,
    /// Signed movement of the primary cursor's head, in bytes.
    pub cursor_delta: i64,
    /// Mode to switch to, applied by the dispatcher's result projection.
    pub mode_change: Option<String>,
    pub view_update: ViewUpdate,
    pub data: HashMap<String, Value>,
}

impl ActionResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn noop() -> Self {
        Self {
            status: ActionStatus::NoOp,
            ..Self::default()
        }
    }

    pub fn error(error: ActionError) -> Self {
        Self {
            status: ActionStatus::Error,
            message: Some(error.to_string()),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Cancelled,
            message: Some(message.into()),
            error: Some(ActionError::HandlerCancelled),
            ..Self::default()
        }
    }

    pub fn pending() -> Self {
        Self {
            status: ActionStatus::Async,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ActionStatus::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ActionStatus::Error)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_redraw(mut self) -> Self {
        self.view_update.redraw = true;
        self
    }

    pub fn with_redraw_lines(mut self, lines: impl IntoIterator<Item = u32>) -> Self {
        self.view_update.redraw_lines.extend(lines);
        self
    }

    pub fn with_scroll_to(mut self, line: u32, column: u32, center: bool) -> Self {
        self.view_update.scroll_to = Some(ScrollTo {
            line,
            column,
            center,
        });
        self
    }

    pub fn with_center_line(mut self, line: u32) -> Self {
        self.view_update.center_line = Some(line);
        self
    }

    pub fn with_mode_change(mut self, mode: impl Into<String>) -> Self {
        self.mode_change = Some(mode.into());
        self
    }

    pub fn with_edit(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn with_edits(mut self, edits: impl IntoIterator<Item = Edit>) -> Self {
        self.edits.extend(edits);
        self
    }

    pub fn with_cursor_delta(mut self, delta: i64) -> Self {
        self.cursor_delta = delta;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

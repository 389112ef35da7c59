//! Per-dispatch view over the editor subsystems, plus the string-keyed data
//! bag handlers thread state through.
//!
//! The context borrows the dispatcher's installed subsystems for exactly one
//! dispatch (pre-hooks through post-hooks). The data bag it exposes lives in
//! the persistent subsystem state, which is how search state written by one
//! dispatch is visible to the next.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use core_actions::{ActionError, Value};
use core_state::{CursorSet, History, ModeManager, Renderer};
use core_text::{Engine, Point};
use regex::Regex;

/// Well-known bag key for the active search state.
pub const SEARCH_STATE_KEY: &str = "_search_state";
/// Well-known bag key for the unnamed yank register.
pub const REGISTER_KEY: &str = "_register";

/// Active search parameters, persisted across dispatches so `search.next`
/// can continue what `search.forward` started.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub pattern: String,
    pub compiled: Regex,
    pub forward: bool,
    pub case_sensitive: bool,
}

/// A tagged slot in the data bag: the known kinds the built-in handlers use,
/// plus an escape hatch for extension handlers with their own state.
#[derive(Clone)]
pub enum Slot {
    Search(SearchState),
    Value(Value),
    Dyn(Arc<dyn Any + Send + Sync>),
}

/// String-keyed slot map shared by every dispatch against the same
/// dispatcher.
#[derive(Default)]
pub struct DataBag {
    slots: HashMap<String, Slot>,
}

impl DataBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.slots.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, slot: Slot) {
        self.slots.insert(key.into(), slot);
    }

    pub fn remove(&mut self, key: &str) -> Option<Slot> {
        self.slots.remove(key)
    }

    pub fn search_state(&self) -> Option<&SearchState> {
        match self.slots.get(SEARCH_STATE_KEY) {
            Some(Slot::Search(state)) => Some(state),
            _ => None,
        }
    }

    pub fn set_search_state(&mut self, state: SearchState) {
        self.slots
            .insert(SEARCH_STATE_KEY.to_string(), Slot::Search(state));
    }

    pub fn clear_search_state(&mut self) {
        self.slots.remove(SEARCH_STATE_KEY);
    }

    pub fn register_text(&self) -> Option<&str> {
        match self.slots.get(REGISTER_KEY) {
            Some(Slot::Value(Value::Text(text))) => Some(text),
            _ => None,
        }
    }

    pub fn set_register_text(&mut self, text: impl Into<String>) {
        self.slots
            .insert(REGISTER_KEY.to_string(), Slot::Value(Value::Text(text.into())));
    }
}

/// Read/write facade over the subsystems for a single dispatch.
///
/// Accessors return `ActionError::MissingSubsystem` for anything not
/// installed, so handlers can propagate with `?` and the caller sees a
/// typed error kind rather than a panic.
pub struct ExecutionContext<'a> {
    engine: Option<&'a mut (dyn Engine + Send + Sync)>,
    cursors: Option<&'a mut CursorSet>,
    mode: Option<&'a mut (dyn ModeManager + Send + Sync)>,
    history: Option<&'a mut (dyn History + Send + Sync)>,
    renderer: Option<&'a mut (dyn Renderer + Send + Sync)>,
    data: &'a mut DataBag,
    /// Effective repeat count; defaults to 1 when the action left it
    /// unspecified.
    pub count: u32,
    /// Mode name reported by the input layer for this dispatch, if any.
    pub input_mode: Option<String>,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(subsystems: &'a mut crate::Subsystems) -> Self {
        let crate::Subsystems {
            engine,
            cursors,
            mode,
            history,
            renderer,
            data,
        } = subsystems;
        Self {
            engine: match engine {
                Some(b) => Some(b.as_mut()),
                None => None,
            },
            cursors: cursors.as_mut(),
            mode: match mode {
                Some(b) => Some(b.as_mut()),
                None => None,
            },
            history: match history {
                Some(b) => Some(b.as_mut()),
                None => None,
            },
            renderer: match renderer {
                Some(b) => Some(b.as_mut()),
                None => None,
            },
            data,
            count: 1,
            input_mode: None,
        }
    }

    pub fn engine(&self) -> Result<&(dyn Engine + Send + Sync), ActionError> {
        self.engine
            .as_deref()
            .ok_or(ActionError::MissingSubsystem("engine"))
    }

    pub fn engine_mut(&mut self) -> Result<&mut (dyn Engine + Send + Sync), ActionError> {
        match &mut self.engine {
            Some(b) => Ok(&mut **b),
            None => Err(ActionError::MissingSubsystem("engine")),
        }
    }

    pub fn cursors(&self) -> Result<&CursorSet, ActionError> {
        self.cursors
            .as_deref()
            .ok_or(ActionError::MissingSubsystem("cursors"))
    }

    pub fn cursors_mut(&mut self) -> Result<&mut CursorSet, ActionError> {
        self.cursors
            .as_deref_mut()
            .ok_or(ActionError::MissingSubsystem("cursors"))
    }

    pub fn mode(&self) -> Result<&(dyn ModeManager + Send + Sync), ActionError> {
        self.mode
            .as_deref()
            .ok_or(ActionError::MissingSubsystem("mode"))
    }

    pub fn mode_mut(&mut self) -> Result<&mut (dyn ModeManager + Send + Sync), ActionError> {
        match &mut self.mode {
            Some(b) => Ok(&mut **b),
            None => Err(ActionError::MissingSubsystem("mode")),
        }
    }

    /// History is optional by design; handlers bracket groups only when one
    /// is installed.
    pub fn history_mut(&mut self) -> Option<&mut (dyn History + Send + Sync)> {
        match &mut self.history {
            Some(b) => Some(&mut **b),
            None => None,
        }
    }

    pub fn renderer(&self) -> Option<&(dyn Renderer + Send + Sync)> {
        self.renderer.as_deref()
    }

    pub fn renderer_mut(&mut self) -> Option<&mut (dyn Renderer + Send + Sync)> {
        match &mut self.renderer {
            Some(b) => Some(&mut **b),
            None => None,
        }
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn data(&self) -> &DataBag {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut DataBag {
        self.data
    }

    /// True when any cursor carries a non-empty selection (visual semantics).
    pub fn has_selection(&self) -> bool {
        self.cursors
            .as_deref()
            .map(CursorSet::has_selection)
            .unwrap_or(false)
    }

    /// Engine (read) and cursors (write) together — the shape every motion
    /// handler needs.
    pub fn motion_parts(
        &mut self,
    ) -> Result<(&(dyn Engine + Send + Sync), &mut CursorSet), ActionError> {
        let Self {
            engine, cursors, ..
        } = self;
        let engine = engine
            .as_deref()
            .ok_or(ActionError::MissingSubsystem("engine"))?;
        let cursors = cursors
            .as_deref_mut()
            .ok_or(ActionError::MissingSubsystem("cursors"))?;
        Ok((engine, cursors))
    }

    /// Engine and cursors both writable, plus the optional history — the
    /// shape every editing handler needs.
    #[allow(clippy::type_complexity)]
    pub fn edit_parts(
        &mut self,
    ) -> Result<
        (
            &mut (dyn Engine + Send + Sync),
            &mut CursorSet,
            Option<&mut (dyn History + Send + Sync)>,
        ),
        ActionError,
    > {
        let Self {
            engine,
            cursors,
            history,
            ..
        } = self;
        let engine: &mut (dyn Engine + Send + Sync) = match engine {
            Some(b) => &mut **b,
            None => return Err(ActionError::MissingSubsystem("engine")),
        };
        let cursors = cursors
            .as_deref_mut()
            .ok_or(ActionError::MissingSubsystem("cursors"))?;
        let history: Option<&mut (dyn History + Send + Sync)> = match history {
            Some(b) => Some(&mut **b),
            None => None,
        };
        Ok((engine, cursors, history))
    }

    /// Point of the primary cursor's head, when engine and cursors are both
    /// installed.
    pub fn primary_point(&self) -> Option<Point> {
        let engine = self.engine.as_deref()?;
        let cursors = self.cursors.as_deref()?;
        Some(engine.offset_to_point(cursors.primary().head))
    }
}

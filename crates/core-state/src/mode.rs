//! Mode manager contract and the shipped stack implementation.

use tracing::debug;

/// Canonical mode names. Handlers pass these as plain strings so hosts can
/// add modes without touching this crate; the constants just prevent typos.
pub const NORMAL: &str = "normal";
pub const INSERT: &str = "insert";
pub const VISUAL: &str = "visual";
pub const VISUAL_LINE: &str = "visual-line";
pub const VISUAL_BLOCK: &str = "visual-block";
pub const COMMAND: &str = "command";
pub const REPLACE: &str = "replace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    UnknownMode(String),
    IllegalTransition { from: String, to: String },
    StackFloor,
}

impl std::fmt::Display for ModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeError::UnknownMode(name) => write!(f, "unknown mode: {name}"),
            ModeError::IllegalTransition { from, to } => {
                write!(f, "illegal mode transition: {from} -> {to}")
            }
            ModeError::StackFloor => write!(f, "cannot pop the base mode"),
        }
    }
}

impl std::error::Error for ModeError {}

/// Mode manager contract. The dispatcher applies `Result.mode_change` through
/// `switch` and ignores failures (the mode handlers validate up front; a host
/// manager may still refuse).
pub trait ModeManager {
    fn current_name(&self) -> &str;
    fn switch(&mut self, name: &str) -> Result<(), ModeError>;
    fn push(&mut self, name: &str) -> Result<(), ModeError>;
    fn pop(&mut self) -> Result<(), ModeError>;
    fn is_mode(&self, name: &str) -> bool {
        self.current_name() == name
    }
    fn is_any_mode(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.current_name() == *n)
    }
}

/// Stack-based mode manager enforcing the modal edge set:
/// `normal` reaches every mode, every mode reaches `normal`, and nothing
/// else. `normal` is the permanent stack floor.
pub struct ModeStack {
    stack: Vec<String>,
}

impl Default for ModeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeStack {
    pub fn new() -> Self {
        Self {
            stack: vec![NORMAL.to_string()],
        }
    }

    fn is_known(name: &str) -> bool {
        matches!(
            name,
            NORMAL | INSERT | VISUAL | VISUAL_LINE | VISUAL_BLOCK | COMMAND | REPLACE
        )
    }

    fn check_edge(&self, to: &str) -> Result<(), ModeError> {
        if !Self::is_known(to) {
            return Err(ModeError::UnknownMode(to.to_string()));
        }
        let from = self.current_name();
        if from == to || from == NORMAL || to == NORMAL {
            Ok(())
        } else {
            Err(ModeError::IllegalTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl ModeManager for ModeStack {
    fn current_name(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or(NORMAL)
    }

    fn switch(&mut self, name: &str) -> Result<(), ModeError> {
        if let Err(e) = self.check_edge(name) {
            debug!(target: "state.mode", from = self.current_name(), to = name, %e, "switch rejected");
            return Err(e);
        }
        if name == NORMAL {
            // Returning to normal unwinds the whole stack.
            self.stack.truncate(1);
        } else if self.stack.len() == 1 {
            self.stack.push(name.to_string());
        } else {
            *self.stack.last_mut().expect("stack is never empty") = name.to_string();
        }
        Ok(())
    }

    fn push(&mut self, name: &str) -> Result<(), ModeError> {
        if !Self::is_known(name) {
            return Err(ModeError::UnknownMode(name.to_string()));
        }
        self.stack.push(name.to_string());
        Ok(())
    }

    fn pop(&mut self) -> Result<(), ModeError> {
        if self.stack.len() == 1 {
            return Err(ModeError::StackFloor);
        }
        self.stack.pop();
        Ok(())
    }
}

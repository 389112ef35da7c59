//! Exact-name handler table.
//!
//! Multiple entries per action name are permitted; `get` returns the
//! highest-priority one and equal priorities resolve to the earliest
//! registration. Reads take a shared lock so concurrent lookups never
//! contend with each other; registration takes the write side.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::handler::{ActionHandler, HandlerEntry};

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, Vec<HandlerEntry>>,
    next_seq: u64,
}

#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with the default priority of 0.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.register_with_priority(name, handler, 0);
    }

    pub fn register_with_priority(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
        priority: i32,
    ) {
        let name = name.into();
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let list = inner.entries.entry(name.clone()).or_default();
        list.push(HandlerEntry {
            handler,
            priority,
            seq,
        });
        // Descending priority; seq keeps equal priorities in insertion order.
        list.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        debug!(target: "dispatch.registry", action = %name, priority, "handler registered");
    }

    /// Remove every entry for `name`.
    pub fn unregister(&self, name: &str) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.entries.remove(name);
    }

    /// Remove the first entry for `name` whose handler identity matches.
    pub fn unregister_handler(&self, name: &str, handler: &Arc<dyn ActionHandler>) -> bool {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let Some(list) = inner.entries.get_mut(name) else {
            return false;
        };
        let Some(idx) = list
            .iter()
            .position(|e| Arc::ptr_eq(&e.handler, handler))
        else {
            return false;
        };
        list.remove(idx);
        if list.is_empty() {
            inner.entries.remove(name);
        }
        true
    }

    /// Highest-priority handler for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .entries
            .get(name)
            .and_then(|list| list.first())
            .map(|e| Arc::clone(&e.handler))
    }

    /// All entries for `name`, highest priority first.
    pub fn get_all(&self, name: &str) -> Vec<HandlerEntry> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.get(name).cloned().unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.contains_key(name)
    }

    /// Registered action names, sorted.
    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut names: Vec<String> = inner.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered action names.
    pub fn count(&self) -> usize {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.entries.clear();
    }
}

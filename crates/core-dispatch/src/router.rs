//! Namespace-prefix handler table with an optional fallback.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use core_actions::split_name;
use tracing::debug;

use crate::handler::{ActionHandler, NamespaceHandler};

#[derive(Default)]
struct RouterInner {
    namespaces: HashMap<String, Arc<dyn NamespaceHandler>>,
    fallback: Option<Arc<dyn ActionHandler>>,
}

/// Routes an action name to the handler owning its namespace prefix.
///
/// Resolution: extract the prefix before the first dot, look up its handler,
/// and ask it `can_handle(name)`. A claiming namespace handler wins; a
/// non-claiming one defers to the fallback. An empty namespace consults the
/// fallback only — exact-name resolution is the registry's job.
#[derive(Default)]
pub struct Router {
    inner: RwLock<RouterInner>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for its namespace, replacing any prior handler.
    pub fn register_namespace(&self, handler: Arc<dyn NamespaceHandler>) {
        let ns = handler.namespace().to_string();
        let mut inner = self.inner.write().expect("router lock poisoned");
        debug!(target: "dispatch.router", namespace = %ns, "namespace registered");
        inner.namespaces.insert(ns, handler);
    }

    pub fn set_fallback(&self, handler: Arc<dyn ActionHandler>) {
        let mut inner = self.inner.write().expect("router lock poisoned");
        inner.fallback = Some(handler);
    }

    /// Resolve `action_name` to a handler, or none.
    pub fn route(&self, action_name: &str) -> Option<Arc<dyn ActionHandler>> {
        let (ns, _) = split_name(action_name);
        let inner = self.inner.read().expect("router lock poisoned");
        if ns.is_empty() {
            return inner.fallback.clone();
        }
        match inner.namespaces.get(ns) {
            Some(handler) if handler.can_handle(action_name) => {
                Some(Arc::clone(handler) as Arc<dyn ActionHandler>)
            }
            _ => inner.fallback.clone(),
        }
    }

    pub fn has_namespace(&self, ns: &str) -> bool {
        let inner = self.inner.read().expect("router lock poisoned");
        inner.namespaces.contains_key(ns)
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let inner = self.inner.read().expect("router lock poisoned");
        let mut names: Vec<String> = inner.namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_namespace_handler(&self, ns: &str) -> Option<Arc<dyn NamespaceHandler>> {
        let inner = self.inner.read().expect("router lock poisoned");
        inner.namespaces.get(ns).cloned()
    }
}

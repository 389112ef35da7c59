//! Priority-ordered pre/post interception chains.
//!
//! Pre-hooks run before resolution and may veto the dispatch or mutate the
//! action; post-hooks observe (and may augment) the computed result but never
//! veto. Both chains run highest priority first, ties in registration order.

pub mod builtin;

use std::sync::{Arc, RwLock};

use core_actions::{Action, ActionResult};
use tracing::{debug, trace};

use crate::ExecutionContext;

pub use builtin::{
    ChangeJournalHook, CountLimitHook, JournalEntry, LoggingHook, RepeatLastHook, ValidationHook,
};

/// A named interceptor. `is_pre`/`is_post` advertise capabilities so
/// [`HookManager::register`] can route the hook; a hook may be both.
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    fn is_pre(&self) -> bool {
        false
    }

    fn is_post(&self) -> bool {
        false
    }

    /// Pre-phase. Returning false aborts the dispatch; the action may be
    /// mutated (e.g. clamping its count).
    fn before(&self, _action: &mut Action, _ctx: &mut ExecutionContext<'_>) -> bool {
        true
    }

    /// Post-phase. Receives the already-computed result by reference.
    fn after(&self, _action: &Action, _ctx: &mut ExecutionContext<'_>, _result: &mut ActionResult) {
    }
}

#[derive(Clone)]
struct HookEntry {
    hook: Arc<dyn Hook>,
    seq: u64,
}

#[derive(Default)]
struct Chains {
    pre: Vec<HookEntry>,
    post: Vec<HookEntry>,
    next_seq: u64,
}

#[derive(Default)]
pub struct HookManager {
    chains: RwLock<Chains>,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register by capability: pre, post, or both.
    pub fn register(&self, hook: Arc<dyn Hook>) {
        let pre = hook.is_pre();
        let post = hook.is_post();
        let mut chains = self.chains.write().expect("hook lock poisoned");
        let seq = chains.next_seq;
        chains.next_seq += 1;
        if pre {
            push_sorted(&mut chains.pre, hook.clone(), seq);
        }
        if post {
            push_sorted(&mut chains.post, hook.clone(), seq);
        }
        debug!(target: "dispatch.hooks", hook = hook.name(), pre, post, "hook registered");
    }

    /// Force registration into the pre chain regardless of capability flags.
    pub fn register_pre(&self, hook: Arc<dyn Hook>) {
        let mut chains = self.chains.write().expect("hook lock poisoned");
        let seq = chains.next_seq;
        chains.next_seq += 1;
        push_sorted(&mut chains.pre, hook, seq);
    }

    /// Force registration into the post chain regardless of capability flags.
    pub fn register_post(&self, hook: Arc<dyn Hook>) {
        let mut chains = self.chains.write().expect("hook lock poisoned");
        let seq = chains.next_seq;
        chains.next_seq += 1;
        push_sorted(&mut chains.post, hook, seq);
    }

    /// Remove `name` from both chains. True when anything was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut chains = self.chains.write().expect("hook lock poisoned");
        let before = chains.pre.len() + chains.post.len();
        chains.pre.retain(|e| e.hook.name() != name);
        chains.post.retain(|e| e.hook.name() != name);
        before != chains.pre.len() + chains.post.len()
    }

    /// Run the pre chain. False as soon as any hook vetoes.
    pub(crate) fn run_pre(&self, action: &mut Action, ctx: &mut ExecutionContext<'_>) -> bool {
        let hooks = self.snapshot_pre();
        for hook in hooks {
            if !hook.before(action, ctx) {
                trace!(target: "dispatch.hooks", hook = hook.name(), action = %action.name, "pre-hook cancelled dispatch");
                return false;
            }
        }
        true
    }

    pub(crate) fn run_post(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext<'_>,
        result: &mut ActionResult,
    ) {
        let hooks = self.snapshot_post();
        for hook in hooks {
            hook.after(action, ctx, result);
        }
    }

    // Chains are cloned out of the lock so hook bodies never run under it.
    fn snapshot_pre(&self) -> Vec<Arc<dyn Hook>> {
        let chains = self.chains.read().expect("hook lock poisoned");
        chains.pre.iter().map(|e| e.hook.clone()).collect()
    }

    fn snapshot_post(&self) -> Vec<Arc<dyn Hook>> {
        let chains = self.chains.read().expect("hook lock poisoned");
        chains.post.iter().map(|e| e.hook.clone()).collect()
    }
}

fn push_sorted(chain: &mut Vec<HookEntry>, hook: Arc<dyn Hook>, seq: u64) {
    chain.push(HookEntry { hook, seq });
    chain.sort_by(|a, b| {
        b.hook
            .priority()
            .cmp(&a.hook.priority())
            .then(a.seq.cmp(&b.seq))
    });
}

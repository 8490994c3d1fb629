use std::collections::{HashMap, HashSet};

use profiles::WindowId;
use selector::Selection;
use tracing::debug;

use crate::host::TransitionKind;

/// A selection waiting for the host's next transition-start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
    pub selection: Selection,
    pub kind: TransitionKind,
}

/// One-shot per-window interception table plus the removals deferred while
/// a window animates.
#[derive(Debug, Default)]
pub struct TransitionInterceptor {
    pending: HashMap<WindowId, PendingTransition>,
    animating: HashSet<WindowId>,
    deferred_removals: HashSet<WindowId>,
}

impl TransitionInterceptor {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms interception of the next transition start for `window`. Returns
    /// false and keeps the existing entry if one is already pending.
    pub fn arm(&mut self, window: WindowId, pending: PendingTransition) -> bool {
        if self.pending.contains_key(&window) {
            debug!(%window, "interception already pending");
            return false;
        }
        self.pending.insert(window, pending);
        true
    }

    /// Takes the pending interception, disarming it.
    pub fn disarm(&mut self, window: WindowId) -> Option<PendingTransition> {
        self.pending.remove(&window)
    }

    /// Whether an interception is pending for `window`.
    pub fn is_armed(&self, window: WindowId) -> bool {
        self.pending.contains_key(&window)
    }

    /// The interception armed for `window`, if any.
    pub fn pending(&self, window: WindowId) -> Option<&PendingTransition> {
        self.pending.get(&window)
    }

    /// Records that `window` now runs a shader transition.
    pub fn mark_animating(&mut self, window: WindowId) {
        self.animating.insert(window);
    }

    /// Whether `window` runs a shader transition.
    pub fn is_animating(&self, window: WindowId) -> bool {
        self.animating.contains(&window)
    }

    /// Queues removal bookkeeping until the animation ends. Returns false
    /// when `window` is not animating and removal should happen now.
    pub fn defer_removal(&mut self, window: WindowId) -> bool {
        if !self.animating.contains(&window) {
            return false;
        }
        self.deferred_removals.insert(window);
        true
    }

    /// Marks the animation of `window` as over. Returns whether a removal
    /// was deferred and must run now.
    pub fn finish_animating(&mut self, window: WindowId) -> bool {
        self.animating.remove(&window);
        self.deferred_removals.remove(&window)
    }

    /// Drops every pending interception; deferred removals stay queued.
    pub fn disarm_all(&mut self) {
        self.pending.clear();
    }
}

//! Lazy structure nodes.
//!
//! A lazy node defers building its target until the first dereference and
//! caches the result, so the thunk runs at most once. The hash is computed
//! from the identifier at construction time and never forces the thunk,
//! which keeps hashing of self-referencing schemas finite.
//!
//! A lazy node may carry overlay flags (for example an optional field
//! pointing at a registered type). The overlay is applied to the target on
//! dereference, so marking a lazy optional or nullable never forces it.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::hash::{ContentHasher, lazy_hash};
use super::{Flags, StructureNode};

type Thunk = Box<dyn FnOnce() -> StructureNode + Send>;

enum LazyState {
    Pending(Thunk),
    Ready(StructureNode),
    Released,
}

struct LazyCell {
    id: String,
    hash: String,
    state: Mutex<LazyState>,
}

/// A node whose target is computed on first use.
#[derive(Clone)]
pub struct LazyNode {
    cell: Arc<LazyCell>,
    overlay: Flags,
    hash: String,
}

impl LazyNode {
    /// Create a lazy node identified by `id`.
    ///
    /// Two lazy nodes with the same id hash equal, so ids must be unique per
    /// target within one invocation (for example `"default:document:book"`).
    pub fn new(id: impl Into<String>, thunk: impl FnOnce() -> StructureNode + Send + 'static) -> Self {
        let id = id.into();
        let hash = lazy_hash(&id);
        Self {
            cell: Arc::new(LazyCell {
                id,
                hash: hash.clone(),
                state: Mutex::new(LazyState::Pending(Box::new(thunk))),
            }),
            overlay: Flags::REQUIRED,
            hash,
        }
    }

    pub fn id(&self) -> &str {
        &self.cell.id
    }

    /// Hash of this node, including its overlay flags.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Hash of the bare lazy, ignoring overlay flags.
    pub fn base_hash(&self) -> &str {
        &self.cell.hash
    }

    pub fn overlay(&self) -> Flags {
        self.overlay
    }

    /// The same lazy target with `extra` ORed into the overlay flags.
    pub fn with_overlay(&self, extra: Flags) -> Self {
        let overlay = self.overlay.union(extra);
        let hash = if overlay == Flags::REQUIRED {
            self.cell.hash.clone()
        } else {
            ContentHasher::new("lazy")
                .str(&self.cell.id)
                .flags(overlay)
                .finish()
        };
        Self {
            cell: Arc::clone(&self.cell),
            overlay,
            hash,
        }
    }

    /// Whether both nodes share the same target cell.
    pub fn same_target(&self, other: &LazyNode) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Dereference the node, running the thunk if this is the first access.
    ///
    /// The thunk runs while the cell is locked: concurrent callers wait for
    /// the single evaluation instead of repeating it. A released node
    /// dereferences to `Unknown`. Overlay flags are added to the target.
    pub fn get(&self) -> StructureNode {
        let target = self.target();
        if self.overlay == Flags::REQUIRED {
            target
        } else {
            target.with_added_flags(self.overlay)
        }
    }

    fn target(&self) -> StructureNode {
        let mut state = self.cell.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let LazyState::Ready(node) = &*state {
            return node.clone();
        }
        match std::mem::replace(&mut *state, LazyState::Released) {
            LazyState::Pending(thunk) => {
                let node = thunk();
                *state = LazyState::Ready(node.clone());
                node
            }
            LazyState::Ready(_) | LazyState::Released => StructureNode::Unknown,
        }
    }

    /// Whether the thunk has already run.
    pub fn is_evaluated(&self) -> bool {
        let state = self.cell.state.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(&*state, LazyState::Ready(_))
    }

    /// Drop the cached target and the pending thunk.
    ///
    /// Lazy graphs of cyclic schemas hold strong references to themselves;
    /// the owner releases them when it is dropped.
    pub(crate) fn release(&self) {
        let mut state = self.cell.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = LazyState::Released;
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overlay == Flags::REQUIRED {
            f.debug_tuple("Lazy").field(&self.cell.id).finish()
        } else {
            f.debug_tuple("Lazy")
                .field(&self.cell.id)
                .field(&self.overlay)
                .finish()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_thunk_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = LazyNode::new("test:type:a", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            StructureNode::string(None, Flags::default())
        });

        assert!(!lazy.is_evaluated());
        let first = lazy.get();
        let second = lazy.get();
        assert_eq!(first.hash(), second.hash());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_evaluated());
    }

    #[test]
    fn test_released_node_is_unknown() {
        let lazy = LazyNode::new("test:type:b", || {
            StructureNode::boolean(None, Flags::default())
        });
        lazy.release();
        assert!(matches!(lazy.get(), StructureNode::Unknown));
    }

    #[test]
    fn test_hash_does_not_force() {
        let lazy = LazyNode::new("test:type:c", || StructureNode::Unknown);
        let _ = lazy.hash();
        assert!(!lazy.is_evaluated());
    }

    #[test]
    fn test_overlay_applies_on_get() {
        let lazy = LazyNode::new("test:type:d", || StructureNode::number(None, Flags::REQUIRED));
        let optional = lazy.with_overlay(Flags::optional());

        assert!(!lazy.is_evaluated());
        assert_ne!(optional.hash(), lazy.hash());
        assert_eq!(optional.base_hash(), lazy.hash());
        assert!(optional.same_target(&lazy));
        assert_eq!(optional.get().flags(), Flags::optional());
        assert_eq!(lazy.get().flags(), Flags::REQUIRED);
    }
}

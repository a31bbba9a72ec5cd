//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. A memo starts stale. The first read runs its computation and caches
//!    the result.
//!
//! 2. While fresh, reads return the cached value without running anything.
//!
//! 3. The computation runs under the memo's invalidator subscriber, so every
//!    cell it reads registers the invalidator.
//!
//! 4. When any of those cells changes, the invalidator marks the memo stale
//!    and notifies whatever has read the memo in turn.
//!
//! 5. The next read recomputes, rebuilding the dependency set.
//!
//! Staleness propagates eagerly (even inside a batch) but recomputation is
//! lazy: a memo nobody reads never runs its computation again.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberKind};
use crate::error::{ReactiveError, Result};
use crate::graph::{DependencyNode, NodeId};

/// Lifecycle state of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Fresh,

    /// An input changed (or the memo was never read).
    Stale,

    /// The computation is running right now.
    Computing,
}

struct MemoInner<T> {
    runtime: Runtime,
    node: Rc<DependencyNode>,
    compute: Box<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    state: Cell<MemoState>,
    invalidator: Rc<Subscriber>,
}

impl<T> MemoInner<T>
where
    T: Clone + 'static,
{
    /// Called by the invalidator, which already runs inside the writer's batch.
    fn invalidate(&self) {
        self.state.set(MemoState::Stale);
        self.node.notify(&self.runtime);
    }

    fn recompute(&self) -> T {
        let computing = ComputingGuard::enter(&self.state);
        let _tracking = self.invalidator.begin_tracking();
        let _frame = self.runtime.context().enter(Rc::clone(&self.invalidator));

        let value = (self.compute)();
        *self.value.borrow_mut() = Some(value.clone());

        computing.finish();
        self.invalidator.record_run();
        value
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        self.invalidator.dispose();
    }
}

/// Marks a memo as computing; falls back to stale if the computation unwinds.
struct ComputingGuard<'a> {
    state: &'a Cell<MemoState>,
}

impl<'a> ComputingGuard<'a> {
    fn enter(state: &'a Cell<MemoState>) -> Self {
        state.set(MemoState::Computing);
        Self { state }
    }

    /// Mark the value fresh, unless it was invalidated while computing.
    fn finish(&self) {
        if self.state.get() == MemoState::Computing {
            self.state.set(MemoState::Fresh);
        }
    }
}

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        if self.state.get() == MemoState::Computing {
            self.state.set(MemoState::Stale);
        }
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use singular_core::Runtime;
///
/// let rt = Runtime::new();
/// let (count, set_count) = rt.create_state(2);
/// let doubled = rt.create_computed(move || count.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// set_count.set(3);
/// assert_eq!(doubled.get(), 6);
/// ```
pub struct Memo<T>
where
    T: Clone + 'static,
{
    inner: Rc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<MemoInner<T>>| {
            let weak = weak.clone();
            let invalidator = Subscriber::new(SubscriberKind::Invalidator, move || {
                if let Some(memo) = weak.upgrade() {
                    memo.invalidate();
                }
            });

            MemoInner {
                runtime: runtime.clone(),
                node: DependencyNode::new(),
                compute: Box::new(compute),
                value: RefCell::new(None),
                state: Cell::new(MemoState::Stale),
                invalidator,
            }
        });

        Self { inner }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.node.id()
    }

    /// Get the current value, recomputing if stale.
    ///
    /// # Panics
    ///
    /// Panics if the memo's own computation reads it. Use [`Memo::try_get`]
    /// to get an error instead.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, recomputing if stale.
    ///
    /// Returns [`ReactiveError::CyclicComputed`] if called from inside this
    /// memo's own computation.
    pub fn try_get(&self) -> Result<T> {
        let inner = &self.inner;

        let cached = match inner.state.get() {
            MemoState::Computing => {
                return Err(ReactiveError::CyclicComputed {
                    id: inner.node.id().raw(),
                })
            }
            MemoState::Fresh => inner.value.borrow().clone(),
            MemoState::Stale => None,
        };

        let value = match cached {
            Some(value) => value,
            None => inner.recompute(),
        };

        inner.node.track(&inner.runtime);
        Ok(value)
    }

    /// Get the current value without tracking the read.
    pub fn get_untracked(&self) -> T {
        self.inner.runtime.untrack(|| self.get())
    }

    /// Mark the memo stale and notify its readers, as if an input changed.
    ///
    /// Calling it from inside the memo's own computation keeps the memo stale
    /// once the computation finishes.
    pub fn invalidate(&self) {
        let inner = &self.inner;
        inner.state.set(MemoState::Stale);
        inner.runtime.propagate(&inner.node);
    }

    /// Get the current state.
    pub fn state(&self) -> MemoState {
        self.inner.state.get()
    }

    /// Check if the next read will recompute.
    pub fn is_stale(&self) -> bool {
        self.state() == MemoState::Stale
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Number of cells read by the most recent computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.invalidator.dependency_count()
    }

    /// Number of subscribers that read this memo.
    pub fn subscriber_count(&self) -> usize {
        self.inner.node.subscriber_count()
    }

    /// Number of times the computation has completed.
    pub fn compute_count(&self) -> usize {
        self.inner.invalidator.run_count()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Batch Scheduler
//!
//! The scheduler defers effect runs while a batch is open.
//!
//! # Algorithm
//!
//! 1. Opening a batch increments the batch depth. Nested batches only bump the
//!    depth, so they flatten into the outermost one.
//! 2. While the depth is non-zero, every effect notified by a write is
//!    recorded in an insertion-ordered set. An effect notified twice keeps
//!    its first position.
//! 3. When the outermost batch closes, the runtime drains the set and runs
//!    each effect exactly once, in first-notified order.
//!
//! Memo invalidation is never deferred; only effects pass through here.
//! Every cell write opens a batch of its own, so memos downstream of the
//! write are all marked stale before the first effect runs.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::warn;

use crate::reactive::{Subscriber, SubscriberId};

/// Batch depth plus the effects waiting for the outermost batch to close.
pub struct BatchScheduler {
    depth: Cell<usize>,
    pending: RefCell<IndexMap<SubscriberId, Weak<Subscriber>>>,
}

impl BatchScheduler {
    /// Create a scheduler with no open batch.
    pub fn new() -> Self {
        Self {
            depth: Cell::new(0),
            pending: RefCell::new(IndexMap::new()),
        }
    }

    /// Open a batch.
    ///
    /// Call [`BatchGuard::close`] once the batched work returned. A guard
    /// that is dropped without being closed marks the batch as aborted.
    pub fn enter(&self) -> BatchGuard<'_> {
        self.depth.set(self.depth.get() + 1);
        BatchGuard {
            scheduler: self,
            closed: false,
        }
    }

    /// Check if a batch is open.
    pub fn is_batching(&self) -> bool {
        self.depth.get() > 0
    }

    /// Current nesting depth of open batches.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Defer a subscriber until the outermost batch closes.
    ///
    /// Returns `false` if it was already queued.
    pub fn enqueue(&self, subscriber: &Rc<Subscriber>) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.contains_key(&subscriber.id()) {
            return false;
        }
        pending.insert(subscriber.id(), Rc::downgrade(subscriber));
        true
    }

    /// Remove and return every queued subscriber in first-notified order.
    ///
    /// Effects dropped while they were queued are skipped.
    pub fn take_pending(&self) -> Vec<Rc<Subscriber>> {
        self.pending
            .borrow_mut()
            .drain(..)
            .filter_map(|(_, s)| s.upgrade())
            .collect()
    }

    /// Get the number of queued subscribers.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one open batch.
///
/// If the outermost batch is dropped without [`close`](Self::close), the
/// batched work did not return (it panicked), and the queued effects are
/// discarded so the scheduler is left empty.
pub struct BatchGuard<'a> {
    scheduler: &'a BatchScheduler,
    closed: bool,
}

impl BatchGuard<'_> {
    /// Close the batch after its work returned normally.
    pub fn close(mut self) {
        self.closed = true;
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = self.scheduler.depth.get().saturating_sub(1);
        self.scheduler.depth.set(depth);

        if depth == 0 && !self.closed {
            let dropped = self.scheduler.pending.borrow_mut().drain(..).count();
            if dropped > 0 {
                warn!(dropped, "batch aborted, discarding deferred effects");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::SubscriberKind;

    fn noop() -> Rc<Subscriber> {
        Subscriber::new(SubscriberKind::Effect, || {})
    }

    #[test]
    fn guard_tracks_depth() {
        let scheduler = BatchScheduler::new();
        assert!(!scheduler.is_batching());

        let outer = scheduler.enter();
        assert_eq!(scheduler.depth(), 1);
        let inner = scheduler.enter();
        assert_eq!(scheduler.depth(), 2);
        inner.close();
        assert_eq!(scheduler.depth(), 1);
        outer.close();

        assert!(!scheduler.is_batching());
    }

    #[test]
    fn enqueue_dedupes_and_keeps_first_position() {
        let scheduler = BatchScheduler::new();
        let a = noop();
        let b = noop();

        assert!(scheduler.enqueue(&a));
        assert!(scheduler.enqueue(&b));
        assert!(!scheduler.enqueue(&a));
        assert_eq!(scheduler.pending_count(), 2);

        let drained: Vec<_> = scheduler.take_pending().iter().map(|s| s.id()).collect();
        assert_eq!(drained, vec![a.id(), b.id()]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn panic_inside_batch_discards_pending() {
        let scheduler = BatchScheduler::new();
        let subscriber = noop();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = scheduler.enter();
            scheduler.enqueue(&subscriber);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!scheduler.is_batching());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn closed_batch_keeps_pending_during_unrelated_unwind() {
        struct BatchOnDrop<'a> {
            scheduler: &'a BatchScheduler,
            subscriber: Rc<Subscriber>,
        }

        impl Drop for BatchOnDrop<'_> {
            fn drop(&mut self) {
                let guard = self.scheduler.enter();
                self.scheduler.enqueue(&self.subscriber);
                guard.close();
            }
        }

        let scheduler = BatchScheduler::new();
        let subscriber = noop();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _on_drop = BatchOnDrop {
                scheduler: &scheduler,
                subscriber: Rc::clone(&subscriber),
            };
            panic!("unrelated");
        }));

        assert!(result.is_err());
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn dropped_subscribers_are_skipped() {
        let scheduler = BatchScheduler::new();
        let kept = noop();
        let dropped = noop();

        scheduler.enqueue(&dropped);
        scheduler.enqueue(&kept);
        drop(dropped);

        let drained: Vec<_> = scheduler.take_pending().iter().map(|s| s.id()).collect();
        assert_eq!(drained, vec![kept.id()]);
    }
}

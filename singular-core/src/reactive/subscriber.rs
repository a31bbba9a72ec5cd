//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values:
//! effects, and the invalidators that memos use to learn their inputs changed.
//!
//! Cells only hold subscribers weakly. Whoever created a subscriber (an
//! `Effect` handle, an `Owner`, a memo) keeps it alive; once the last strong
//! reference goes, the subscriber removes itself from every cell it read.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::graph::{DependencyNode, NodeId};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency nodes key their
/// subscriber sets by this ID, so the same subscriber is never registered
/// twice on one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// How a subscriber reacts to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberKind {
    /// Re-runs its whole body. Deferred while a batch is open.
    Effect,

    /// Marks a memo stale and forwards the notification. Never deferred.
    Invalidator,
}

type Sources = SmallVec<[(NodeId, Weak<DependencyNode>); 4]>;

/// A subscriber to reactive values.
pub struct Subscriber {
    id: SubscriberId,
    kind: SubscriberKind,

    /// `None` once disposed. Cloned out before each call so a subscriber can
    /// dispose itself mid-run.
    callback: RefCell<Option<Rc<dyn Fn()>>>,

    /// Nodes read during the current (or most recent) run.
    sources: RefCell<Sources>,

    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl Subscriber {
    /// Create a new subscriber with the given callback.
    pub fn new<F>(kind: SubscriberKind, callback: F) -> Rc<Self>
    where
        F: Fn() + 'static,
    {
        Rc::new(Self {
            id: SubscriberId::new(),
            kind,
            callback: RefCell::new(Some(Rc::new(callback))),
            sources: RefCell::new(SmallVec::new()),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
        })
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Get the subscriber's kind.
    pub fn kind(&self) -> SubscriberKind {
        self.kind
    }

    /// Check if the subscriber has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Number of cells read during the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.sources.borrow().len()
    }

    pub(crate) fn callback(&self) -> Option<Rc<dyn Fn()>> {
        self.callback.borrow().clone()
    }

    pub(crate) fn record_run(&self) {
        self.run_count.set(self.run_count.get() + 1);
    }

    /// Remember that this subscriber read `node` during the current run.
    pub(crate) fn add_source(&self, node: &Rc<DependencyNode>) {
        let mut sources = self.sources.borrow_mut();
        if sources.iter().any(|(id, _)| *id == node.id()) {
            return;
        }
        sources.push((node.id(), Rc::downgrade(node)));
    }

    /// Start collecting a fresh dependency set.
    ///
    /// The previous set is held by the returned scope. When the scope drops,
    /// the subscriber is removed from every previous source it did not read
    /// again; sources it kept reading keep their subscriber position.
    pub(crate) fn begin_tracking(self: &Rc<Self>) -> TrackingScope {
        let previous = std::mem::take(&mut *self.sources.borrow_mut());
        TrackingScope {
            subscriber: Rc::clone(self),
            previous,
        }
    }

    /// Stop all future runs and unsubscribe from every source.
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let callback = self.callback.borrow_mut().take();
        drop(callback);
        self.release_sources();
    }

    fn release_sources(&self) {
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for (_, node) in sources {
            if let Some(node) = node.upgrade() {
                node.unsubscribe(self.id);
            }
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.release_sources();
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Prunes stale subscriptions when a run finishes, including by panic.
pub(crate) struct TrackingScope {
    subscriber: Rc<Subscriber>,
    previous: Sources,
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        let current = self.subscriber.sources.borrow();
        for (id, node) in self.previous.drain(..) {
            if current.iter().any(|(kept, _)| *kept == id) {
                continue;
            }
            if let Some(node) = node.upgrade() {
                node.unsubscribe(self.subscriber.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn add_source_dedupes_by_node() {
        let subscriber = Subscriber::new(SubscriberKind::Effect, || {});
        let node = DependencyNode::new();

        subscriber.add_source(&node);
        subscriber.add_source(&node);
        assert_eq!(subscriber.dependency_count(), 1);
    }

    #[test]
    fn tracking_scope_unsubscribes_sources_not_read_again() {
        let subscriber = Subscriber::new(SubscriberKind::Effect, || {});
        let kept = DependencyNode::new();
        let dropped = DependencyNode::new();

        for node in [&kept, &dropped] {
            node.subscribe(&subscriber);
            subscriber.add_source(node);
        }

        {
            let _scope = subscriber.begin_tracking();
            subscriber.add_source(&kept);
        }

        assert!(kept.is_subscribed(subscriber.id()));
        assert!(!dropped.is_subscribed(subscriber.id()));
        assert_eq!(subscriber.dependency_count(), 1);
    }

    #[test]
    fn dropping_subscriber_unsubscribes_from_sources() {
        let node = DependencyNode::new();
        let subscriber = Subscriber::new(SubscriberKind::Effect, || {});
        node.subscribe(&subscriber);
        subscriber.add_source(&node);
        assert_eq!(node.subscriber_count(), 1);

        drop(subscriber);
        assert_eq!(node.subscriber_count(), 0);
    }

    #[test]
    fn dispose_unsubscribes_and_drops_callback() {
        let subscriber = Subscriber::new(SubscriberKind::Effect, || {});
        let node = DependencyNode::new();
        node.subscribe(&subscriber);
        subscriber.add_source(&node);

        subscriber.dispose();

        assert!(subscriber.is_disposed());
        assert!(subscriber.callback().is_none());
        assert_eq!(node.subscriber_count(), 0);
        assert_eq!(subscriber.dependency_count(), 0);
    }
}

//! Dependency Nodes
//!
//! A `DependencyNode` is the per-cell subscriber list. Signals and memos each
//! own one.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::reactive::{Runtime, Subscriber, SubscriberId};

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber bookkeeping for a single reactive cell.
pub struct DependencyNode {
    id: NodeId,

    /// Subscribers in registration order. Held weakly: a cell never keeps
    /// the computations that read it alive.
    subscribers: RefCell<IndexMap<SubscriberId, Weak<Subscriber>>>,
}

impl DependencyNode {
    /// Create a new node with no subscribers.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            id: NodeId::new(),
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Register a subscriber.
    ///
    /// Returns `true` if the subscriber was not registered before. A
    /// subscriber that is already present keeps its original position.
    pub fn subscribe(&self, subscriber: &Rc<Subscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), Rc::downgrade(subscriber));
        true
    }

    /// Remove a subscriber, preserving the order of the others.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow_mut().shift_remove(&id).is_some()
    }

    /// Check whether a subscriber is registered.
    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Register the runtime's current subscriber, if any, as a dependent.
    ///
    /// Called by cells when they are read.
    pub fn track(self: &Rc<Self>, runtime: &Runtime) {
        let Some(subscriber) = runtime.context().current() else {
            return;
        };
        if subscriber.is_disposed() {
            return;
        }
        self.subscribe(&subscriber);
        subscriber.add_source(self);
    }

    /// Notify every subscriber that this node's value changed.
    ///
    /// The subscriber list is snapshotted first: subscribers re-register
    /// themselves while they run. Effects run on the spot unless a batch is
    /// open; cell writes go through `Runtime::propagate`, which opens one.
    pub fn notify(&self, runtime: &Runtime) {
        let subscribers: SmallVec<[Rc<Subscriber>; 4]> = self
            .subscribers
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect();

        if subscribers.is_empty() {
            return;
        }

        trace!(node = self.id.raw(), subscribers = subscribers.len(), "notify");

        for subscriber in subscribers {
            runtime.dispatch(&subscriber);
        }
    }
}

impl std::fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyNode")
            .field("id", &self.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

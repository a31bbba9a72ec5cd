//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the execution context and the batch scheduler, and every
//! primitive is created from (and keeps a handle to) a runtime.
//!
//! # How It Works
//!
//! 1. A signal read calls `DependencyNode::track`, which asks the runtime's
//!    context for the current subscriber and registers it.
//!
//! 2. A signal write calls `Runtime::propagate`, which opens a batch and has
//!    the signal's node hand every subscriber to `Runtime::dispatch`:
//!    a. Memo invalidators run immediately, mark their memo stale and
//!       forward the notification to the memo's own readers
//!    b. Effects are queued, each one once
//!
//!    When the batch closes, the queued effects run in first-notified order.
//!    Every memo downstream of the write is already stale by then, so an
//!    effect never reads a memo's cached value from before the write.
//!
//! 3. Before any run, the runtime skips subscribers that are already on the
//!    active stack. This is what keeps self-writing effects from recursing.
//!
//! # Threading
//!
//! A runtime is single-threaded. Handles are `Rc`-based and cannot leave the
//! thread that created them. Independent runtimes do not share any state.

use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::context::ExecutionContext;
use super::effect::Effect;
use super::memo::Memo;
use super::owner::Owner;
use super::signal::{ReadSignal, Signal, WriteSignal};
use super::subscriber::{Subscriber, SubscriberId, SubscriberKind};
use crate::graph::{BatchScheduler, DependencyNode};

/// Tuning knobs for a runtime.
///
/// Deserializable so hosts can embed it in their own configuration files.
/// Missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of nested subscriber runs.
    ///
    /// A run that would go deeper is skipped and logged at `warn` level.
    /// `None` leaves propagation depth bounded only by the thread's stack.
    pub max_depth: Option<usize>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    context: ExecutionContext,
    scheduler: BatchScheduler,
}

/// Handle to a reactive runtime.
///
/// Cloning is cheap and yields a handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: ExecutionContext::new(),
                scheduler: BatchScheduler::new(),
            }),
        }
    }

    /// Get the runtime's configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Get the execution context.
    pub fn context(&self) -> &ExecutionContext {
        &self.inner.context
    }

    /// Check whether two handles point at the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a cell and return its getter and setter halves.
    pub fn create_state<T>(&self, initial: T) -> (ReadSignal<T>, WriteSignal<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        Signal::new(self, initial).split()
    }

    /// Create a cell as a single read/write handle.
    pub fn signal<T>(&self, initial: T) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Signal::new(self, initial)
    }

    /// Create a lazily evaluated derived cell.
    ///
    /// `compute` may read other cells but must not write them.
    pub fn create_computed<T, F>(&self, compute: F) -> Memo<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        Memo::new(self, compute)
    }

    /// Create an effect and run it once to capture its dependencies.
    ///
    /// The effect stays alive while the returned handle or the current owner
    /// does.
    pub fn create_effect<F>(&self, run: F) -> Effect
    where
        F: Fn() + 'static,
    {
        Effect::new(self, run)
    }

    /// Run `f` with effect notifications deferred.
    ///
    /// Every effect notified by writes inside `f` runs exactly once after the
    /// outermost batch returns, in the order it was first notified. Nested
    /// calls flatten into the outermost batch. If `f` panics, the deferred
    /// effects of the outermost batch are dropped.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = self.inner.scheduler.enter();
        let result = f();
        guard.close();

        if !self.inner.scheduler.is_batching() {
            self.flush_batch();
        }

        result
    }

    /// Check if a batch is open.
    pub fn is_batching(&self) -> bool {
        self.inner.scheduler.is_batching()
    }

    /// Create an owner. If an owner is current, the new one becomes its
    /// child and is disposed along with it.
    pub fn create_owner(&self) -> Owner {
        let owner = Owner::new();
        if let Some(parent) = self.inner.context.owner() {
            parent.adopt_child(&owner);
        }
        owner
    }

    /// Run `f` with `owner` as the current owner.
    ///
    /// Effects created inside `f` are owned by `owner`. The previous owner is
    /// restored afterwards, also when `f` panics.
    pub fn run_with_owner<R>(&self, owner: &Owner, f: impl FnOnce() -> R) -> R {
        let _frame = self.inner.context.with_owner(owner.clone());
        f()
    }

    /// Get the current owner, if any.
    pub fn owner(&self) -> Option<Owner> {
        self.inner.context.owner()
    }

    /// Register `f` to run when the current owner is disposed.
    ///
    /// Returns `false`, dropping `f` without running it, if there is no
    /// current owner.
    pub fn on_cleanup<F>(&self, f: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        match self.inner.context.owner() {
            Some(owner) => {
                owner.on_cleanup(f);
                true
            }
            None => {
                debug!("on_cleanup called without an owner");
                false
            }
        }
    }

    /// Run `f` without registering any reads.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _frame = self.inner.context.untracked();
        f()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    /// Get the subscriber currently tracking reads, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current_id()
    }

    /// Notify a changed node's subscribers.
    ///
    /// Runs inside a batch so that every memo downstream of the change is
    /// invalidated before any effect re-runs.
    pub(crate) fn propagate(&self, node: &DependencyNode) {
        self.batch(|| node.notify(self));
    }

    /// Route a notification to a subscriber.
    pub(crate) fn dispatch(&self, subscriber: &Rc<Subscriber>) {
        if subscriber.is_disposed() {
            return;
        }

        match subscriber.kind() {
            SubscriberKind::Invalidator => self.run_invalidator(subscriber),
            SubscriberKind::Effect if self.inner.scheduler.is_batching() => {
                if self.inner.scheduler.enqueue(subscriber) {
                    trace!(subscriber = subscriber.id().raw(), "deferred until batch ends");
                }
            }
            SubscriberKind::Effect => self.run_effect(subscriber),
        }
    }

    /// Run an effect body, rebuilding its dependency set.
    pub(crate) fn run_effect(&self, subscriber: &Rc<Subscriber>) {
        if !self.admit(subscriber) || !self.within_depth(subscriber) {
            return;
        }
        let Some(callback) = subscriber.callback() else {
            return;
        };

        let _tracking = subscriber.begin_tracking();
        let _frame = self.inner.context.enter(Rc::clone(subscriber));
        callback();
        subscriber.record_run();
    }

    /// Invalidators read nothing, so they run without a frame and keep their
    /// subscriptions until their memo recomputes. They add no nesting and are
    /// exempt from the depth limit.
    fn run_invalidator(&self, subscriber: &Rc<Subscriber>) {
        if !self.admit(subscriber) {
            return;
        }
        if let Some(callback) = subscriber.callback() {
            callback();
        }
    }

    /// Disposal and re-entrancy checks shared by every run.
    fn admit(&self, subscriber: &Subscriber) -> bool {
        if subscriber.is_disposed() {
            return false;
        }

        if self.inner.context.is_running(subscriber.id()) {
            trace!(subscriber = subscriber.id().raw(), "skipping re-entrant run");
            return false;
        }

        true
    }

    fn within_depth(&self, subscriber: &Subscriber) -> bool {
        if let Some(max_depth) = self.inner.config.max_depth {
            if self.inner.context.depth() >= max_depth {
                warn!(
                    subscriber = subscriber.id().raw(),
                    max_depth, "propagation depth limit reached, skipping run"
                );
                return false;
            }
        }

        true
    }

    fn flush_batch(&self) {
        let pending = self.inner.scheduler.take_pending();
        if pending.is_empty() {
            return;
        }

        debug!(effects = pending.len(), "flushing batched effects");

        for subscriber in pending {
            self.run_effect(&subscriber);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("context", &self.inner.context)
            .field("batch_depth", &self.inner.scheduler.depth())
            .field("pending", &self.inner.scheduler.pending_count())
            .finish()
    }
}

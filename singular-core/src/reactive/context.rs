//! Execution Context
//!
//! The execution context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a cell is read, we can
//! register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each `Runtime` owns one context. It holds two pieces of state:
//!
//! - the current subscriber, which cell reads attribute themselves to
//! - the active stack, the ids of every subscriber whose body is on the call
//!   stack right now, used to skip re-entrant notifications
//!
//! Entering returns a `ContextFrame` guard. Dropping the frame restores the
//! previous state, so the context stays balanced even when user code panics.
//!
//! The context also carries the current [`Owner`], which effects attach
//! themselves to when they are created. It is switched the same way, through
//! an `OwnerFrame` guard.

use std::cell::RefCell;
use std::rc::Rc;

use super::owner::Owner;
use super::subscriber::{Subscriber, SubscriberId};

/// Current-subscriber pointer plus the re-entrancy stack.
pub struct ExecutionContext {
    current: RefCell<Option<Rc<Subscriber>>>,
    stack: RefCell<Vec<SubscriberId>>,
    owner: RefCell<Option<Owner>>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            current: RefCell::new(None),
            stack: RefCell::new(Vec::new()),
            owner: RefCell::new(None),
        }
    }

    /// Enter a new tracking frame for the given subscriber.
    ///
    /// While the frame is alive, cell reads register `subscriber` as a
    /// dependent and the subscriber counts as running.
    pub fn enter(&self, subscriber: Rc<Subscriber>) -> ContextFrame<'_> {
        let id = subscriber.id();
        self.stack.borrow_mut().push(id);
        let previous = self.current.replace(Some(subscriber));

        ContextFrame {
            context: self,
            previous,
            pushed: Some(id),
        }
    }

    /// Enter a frame with no current subscriber.
    ///
    /// Reads inside are not tracked. The active stack is left as is, so
    /// re-entrancy protection for enclosing subscribers still applies.
    pub fn untracked(&self) -> ContextFrame<'_> {
        let previous = self.current.replace(None);

        ContextFrame {
            context: self,
            previous,
            pushed: None,
        }
    }

    /// Check if a subscriber is currently tracking reads.
    pub fn is_active(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Get the current subscriber, if any.
    pub fn current(&self) -> Option<Rc<Subscriber>> {
        self.current.borrow().clone()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_id(&self) -> Option<SubscriberId> {
        self.current.borrow().as_ref().map(|s| s.id())
    }

    /// Check whether a subscriber's body is already executing.
    pub fn is_running(&self, id: SubscriberId) -> bool {
        self.stack.borrow().contains(&id)
    }

    /// Number of subscriber bodies on the call stack.
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Get the current owner, if any.
    pub fn owner(&self) -> Option<Owner> {
        self.owner.borrow().clone()
    }

    /// Make `owner` current until the returned frame is dropped.
    pub fn with_owner(&self, owner: Owner) -> OwnerFrame<'_> {
        let previous = self.owner.replace(Some(owner));
        OwnerFrame {
            context: self,
            previous,
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("current", &self.current_id())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Guard that restores the previous context when dropped.
pub struct ContextFrame<'a> {
    context: &'a ExecutionContext,
    previous: Option<Rc<Subscriber>>,
    pushed: Option<SubscriberId>,
}

impl Drop for ContextFrame<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.pushed {
            let popped = self.context.stack.borrow_mut().pop();

            // Frames are strictly nested; anything else is a bug in the runtime.
            debug_assert_eq!(
                popped,
                Some(id),
                "ExecutionContext mismatch: expected {:?}, got {:?}",
                id,
                popped
            );
        }
        let replaced = self.context.current.replace(self.previous.take());
        drop(replaced);
    }
}

/// Guard that restores the previous owner when dropped.
pub struct OwnerFrame<'a> {
    context: &'a ExecutionContext,
    previous: Option<Owner>,
}

impl Drop for OwnerFrame<'_> {
    fn drop(&mut self) {
        let replaced = self.context.owner.replace(self.previous.take());
        drop(replaced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::SubscriberKind;

    fn subscriber() -> Rc<Subscriber> {
        Subscriber::new(SubscriberKind::Effect, || {})
    }

    #[test]
    fn context_tracks_subscriber() {
        let context = ExecutionContext::new();
        let sub = subscriber();

        assert!(!context.is_active());
        assert!(context.current_id().is_none());

        {
            let _frame = context.enter(sub.clone());

            assert!(context.is_active());
            assert_eq!(context.current_id(), Some(sub.id()));
            assert!(context.is_running(sub.id()));
        }

        // Context should be cleaned up after drop
        assert!(!context.is_active());
        assert!(!context.is_running(sub.id()));
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn nested_frames_restore_outer() {
        let context = ExecutionContext::new();
        let outer = subscriber();
        let inner = subscriber();

        {
            let _outer = context.enter(outer.clone());
            {
                let _inner = context.enter(inner.clone());
                assert_eq!(context.current_id(), Some(inner.id()));
                assert_eq!(context.depth(), 2);
            }

            // After inner frame drops, outer should be current
            assert_eq!(context.current_id(), Some(outer.id()));
            assert!(!context.is_running(inner.id()));
        }

        assert!(context.current_id().is_none());
    }

    #[test]
    fn untracked_frame_hides_current_but_keeps_stack() {
        let context = ExecutionContext::new();
        let sub = subscriber();

        let _frame = context.enter(sub.clone());
        {
            let _untracked = context.untracked();
            assert!(!context.is_active());
            assert!(context.is_running(sub.id()));
        }
        assert_eq!(context.current_id(), Some(sub.id()));
    }

    #[test]
    fn frame_unwinds_on_panic() {
        let context = ExecutionContext::new();
        let sub = subscriber();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _frame = context.enter(sub.clone());
            panic!("user code failed");
        }));

        assert!(result.is_err());
        assert!(!context.is_active());
        assert_eq!(context.depth(), 0);
    }
}

//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal is written with a value different from the current one,
//!    all subscribers are notified. Writing an equal value does nothing.
//!
//! 3. Notifications re-run dependent effects synchronously, after every memo
//!    reading the signal has been marked stale. Inside a batch, the effects
//!    wait for the batch to close.
//!
//! Equality is `PartialEq`. For collections that means a write is only
//! suppressed when the new contents compare equal to the old ones.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::runtime::Runtime;
use crate::graph::{DependencyNode, NodeId};

struct SignalInner<T> {
    runtime: Runtime,
    node: Rc<DependencyNode>,
    value: RefCell<T>,
}

/// A reactive cell holding a value of type T.
///
/// # Example
///
/// ```rust
/// use singular_core::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                runtime: runtime.clone(),
                node: DependencyNode::new(),
                value: RefCell::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.node.id()
    }

    /// Get the current value.
    ///
    /// If called within a tracking context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.inner.node.track(&self.inner.runtime);
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, tracking the read.
    ///
    /// `f` must not write this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.node.track(&self.inner.runtime);
        self.with_untracked(f)
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store a new value and notify subscribers if it changed.
    ///
    /// Returns the value held once propagation finishes. Effects triggered by
    /// this write may have written the signal again.
    pub fn set(&self, value: T) -> T {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };

        if changed {
            self.inner.runtime.propagate(&self.inner.node);
        }

        self.get_untracked()
    }

    /// Update the value using a function of the current value.
    ///
    /// The current value is read without tracking.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with_untracked(f);
        self.set(next)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.node.subscriber_count()
    }

    /// Split into read and write halves sharing this cell.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (
            ReadSignal {
                signal: self.clone(),
            },
            WriteSignal { signal: self },
        )
    }

    /// Get a read-only handle to this cell.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// The getter half of a cell.
pub struct ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    pub fn id(&self) -> NodeId {
        self.signal.id()
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

/// The setter half of a cell.
pub struct WriteSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    signal: Signal<T>,
}

impl<T> WriteSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Store a new value; see [`Signal::set`].
    pub fn set(&self, value: T) -> T {
        self.signal.set(value)
    }

    /// Update from the current value; see [`Signal::update`].
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        self.signal.update(f)
    }
}

impl<T> Clone for WriteSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> Debug for WriteSignal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WriteSignal").field(&self.signal).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

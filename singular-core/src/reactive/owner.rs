//! Owner Scopes
//!
//! An Owner groups effects and cleanup callbacks so they can be torn down
//! together, typically when the UI component that created them unmounts.
//!
//! # How Owners Work
//!
//! 1. `Runtime::run_with_owner` makes an owner current for the duration of a
//!    closure. The previous owner is restored when the closure returns or
//!    unwinds.
//!
//! 2. Every effect created while an owner is current is kept alive by that
//!    owner, even after its `Effect` handle is dropped.
//!
//! 3. Owners created while another owner is current become its children.
//!
//! 4. `Owner::dispose` disposes the children, then the owned effects, then
//!    runs the cleanups in registration order. It only does so once.
//!
//! Dropping the last handle to an owner disposes it.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use tracing::debug;

use super::effect::Effect;

type Cleanup = Box<dyn FnOnce()>;

#[derive(Default)]
struct OwnerInner {
    effects: RefCell<Vec<Effect>>,
    cleanups: RefCell<Vec<Cleanup>>,
    children: RefCell<Vec<Owner>>,
    disposed: Cell<bool>,
}

impl OwnerInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        let effects = std::mem::take(&mut *self.effects.borrow_mut());
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());

        debug!(
            children = children.len(),
            effects = effects.len(),
            cleanups = cleanups.len(),
            "disposing owner"
        );

        for child in &children {
            child.dispose();
        }
        for effect in &effects {
            effect.dispose();
        }
        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl Drop for OwnerInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A disposal scope for effects and cleanup callbacks.
///
/// # Example
///
/// ```rust
/// use singular_core::Runtime;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let rt = Runtime::new();
/// let (count, set_count) = rt.create_state(0);
/// let runs = Rc::new(Cell::new(0));
///
/// let owner = rt.create_owner();
/// rt.run_with_owner(&owner, || {
///     let runs = runs.clone();
///     // The owner keeps the effect alive after the handle is dropped.
///     let _ = rt.create_effect(move || {
///         count.get();
///         runs.set(runs.get() + 1);
///     });
/// });
///
/// set_count.set(1);
/// assert_eq!(runs.get(), 2);
///
/// owner.dispose();
/// set_count.set(2);
/// assert_eq!(runs.get(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Owner {
    inner: Rc<OwnerInner>,
}

impl Owner {
    /// Create a detached owner with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback to run when the owner is disposed.
    ///
    /// If the owner is already disposed, `f` runs immediately.
    pub fn on_cleanup<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        if self.is_disposed() {
            f();
            return;
        }
        self.inner.cleanups.borrow_mut().push(Box::new(f));
    }

    /// Dispose owned children and effects, then run the cleanups.
    ///
    /// Calling it again does nothing.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the owner has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of live effects owned directly by this owner.
    pub fn effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Number of pending cleanup callbacks.
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }

    /// Check whether two handles point at the same owner.
    pub fn ptr_eq(&self, other: &Owner) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Take ownership of an effect. A disposed owner disposes it right away.
    pub(crate) fn adopt(&self, effect: &Effect) {
        if self.is_disposed() {
            effect.dispose();
            return;
        }
        self.inner.effects.borrow_mut().push(effect.clone());
    }

    /// Attach a child owner. A disposed owner disposes it right away.
    pub(crate) fn adopt_child(&self, child: &Owner) {
        if self.is_disposed() {
            child.dispose();
            return;
        }
        self.inner.children.borrow_mut().push(child.clone());
    }
}

impl Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner")
            .field("effects", &self.effect_count())
            .field("cleanups", &self.cleanup_count())
            .field("children", &self.inner.children.borrow().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;

    #[test]
    fn dispose_runs_cleanups_once_in_order() {
        let owner = Owner::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second"] {
            let order = order.clone();
            owner.on_cleanup(move || order.borrow_mut().push(name));
        }
        assert_eq!(owner.cleanup_count(), 2);

        owner.dispose();
        owner.dispose();

        assert!(owner.is_disposed());
        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert_eq!(owner.cleanup_count(), 0);
    }

    #[test]
    fn cleanup_on_disposed_owner_runs_immediately() {
        let owner = Owner::new();
        owner.dispose();

        let ran = Rc::new(Cell::new(false));
        owner.on_cleanup({
            let ran = ran.clone();
            move || ran.set(true)
        });
        assert!(ran.get());
    }

    #[test]
    fn run_with_owner_restores_previous_owner() {
        let rt = Runtime::new();
        let outer = rt.create_owner();
        let inner = rt.create_owner();
        assert!(rt.owner().is_none());

        rt.run_with_owner(&outer, || {
            assert!(rt.owner().is_some_and(|o| o.ptr_eq(&outer)));
            rt.run_with_owner(&inner, || {
                assert!(rt.owner().is_some_and(|o| o.ptr_eq(&inner)));
            });
            assert!(rt.owner().is_some_and(|o| o.ptr_eq(&outer)));
        });

        assert!(rt.owner().is_none());
    }

    #[test]
    fn run_with_owner_restores_on_panic() {
        let rt = Runtime::new();
        let owner = rt.create_owner();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.run_with_owner(&owner, || panic!("boom"))
        }));

        assert!(result.is_err());
        assert!(rt.owner().is_none());
    }

    #[test]
    fn owner_keeps_effects_alive_until_disposed() {
        let rt = Runtime::new();
        let (count, set_count) = rt.create_state(0);
        let runs = Rc::new(Cell::new(0));
        let owner = rt.create_owner();

        rt.run_with_owner(&owner, || {
            let runs = runs.clone();
            let effect = rt.create_effect(move || {
                count.get();
                runs.set(runs.get() + 1);
            });
            drop(effect);
        });
        assert_eq!(owner.effect_count(), 1);

        set_count.set(1);
        assert_eq!(runs.get(), 2);

        owner.dispose();
        set_count.set(2);
        assert_eq!(runs.get(), 2);
        assert_eq!(owner.effect_count(), 0);
    }

    #[test]
    fn disposing_parent_disposes_children() {
        let rt = Runtime::new();
        let parent = rt.create_owner();
        let child = rt.run_with_owner(&parent, || rt.create_owner());
        let cleaned = Rc::new(Cell::new(false));

        child.on_cleanup({
            let cleaned = cleaned.clone();
            move || cleaned.set(true)
        });

        parent.dispose();
        assert!(child.is_disposed());
        assert!(cleaned.get());
    }

    #[test]
    fn effects_created_under_disposed_owner_never_run() {
        let rt = Runtime::new();
        let owner = rt.create_owner();
        owner.dispose();

        let runs = Rc::new(Cell::new(0));
        let effect = rt.run_with_owner(&owner, || {
            let runs = runs.clone();
            rt.create_effect(move || runs.set(runs.get() + 1))
        });

        assert!(effect.is_disposed());
        assert_eq!(runs.get(), 0);
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let cleaned = Rc::new(Cell::new(false));
        {
            let owner = Owner::new();
            let cleaned = cleaned.clone();
            owner.on_cleanup(move || cleaned.set(true));
        }
        assert!(cleaned.get());
    }
}

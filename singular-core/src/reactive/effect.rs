//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any cell read during the most recent run changes, the whole
//!    function runs again from the top.
//!
//! 3. Each run rebuilds the dependency set. Cells the function stopped
//!    reading no longer trigger it.
//!
//! # Re-entrancy
//!
//! If a run writes a cell that the effect itself depends on, the resulting
//! notification reaches an effect that is still on the active stack and is
//! skipped. This is a liveness safeguard, not an error: the write lands, the
//! effect just does not observe it until the next external trigger.
//!
//! # Lifetime
//!
//! Cells hold their subscribers weakly. An effect stays alive while any
//! `Effect` handle to it exists or while the [`Owner`](super::Owner) it was
//! created under is alive. Once neither holds it, the effect is freed, along
//! with everything its closure captured, and unsubscribes from every cell.
//! Call [`Effect::dispose`] to stop it earlier.

use std::rc::Rc;

use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberId, SubscriberKind};

/// Handle to a side-effecting computation.
///
/// # Example
///
/// ```rust
/// use singular_core::Runtime;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let rt = Runtime::new();
/// let (theme, set_theme) = rt.create_state("light");
/// let history = Rc::new(RefCell::new(Vec::new()));
///
/// let effect = rt.create_effect({
///     let history = history.clone();
///     move || history.borrow_mut().push(theme.get())
/// });
///
/// set_theme.set("dark");
/// effect.dispose();
/// set_theme.set("light");
/// assert_eq!(*history.borrow(), vec!["light", "dark"]);
/// ```
#[must_use = "an effect stops once its last handle is dropped, unless an owner holds it"]
pub struct Effect {
    runtime: Runtime,
    subscriber: Rc<Subscriber>,
}

impl Effect {
    /// Create a new effect and run it immediately.
    ///
    /// The first run happens even inside a batch. If an owner is current, the
    /// owner takes a handle to the effect; a disposed owner disposes it
    /// before it ever runs.
    pub fn new<F>(runtime: &Runtime, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self {
            runtime: runtime.clone(),
            subscriber: Subscriber::new(SubscriberKind::Effect, run),
        };

        if let Some(owner) = runtime.owner() {
            owner.adopt(&effect);
        }

        effect.execute();
        effect
    }

    /// Get the effect's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Run the effect now, as if a dependency had changed.
    ///
    /// Does nothing if the effect is disposed or already running.
    pub fn execute(&self) {
        self.runtime.run_effect(&self.subscriber);
    }

    /// Dispose of the effect.
    ///
    /// After disposal the effect is unsubscribed from every cell and will
    /// not run again. A run in progress finishes normally.
    pub fn dispose(&self) {
        self.subscriber.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.subscriber.is_disposed()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.subscriber.run_count()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.subscriber.dependency_count()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            subscriber: Rc::clone(&self.subscriber),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
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
    use std::cell::{Cell, RefCell};

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();

        let effect = rt.create_effect(move || runs_clone.set(runs_clone.get() + 1));

        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let rt = Runtime::new();
        let (count, set_count) = rt.create_state(1);
        let log = Rc::new(RefCell::new(Vec::new()));

        let _effect = rt.create_effect({
            let log = log.clone();
            move || log.borrow_mut().push(count.get())
        });
        assert_eq!(*log.borrow(), vec![1]);

        set_count.set(2);
        assert_eq!(*log.borrow(), vec![1, 2]);

        // Same value: no-op
        set_count.set(2);
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn execute_reruns_manually() {
        let rt = Runtime::new();
        let effect = rt.create_effect(|| {});

        effect.execute();
        effect.execute();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let rt = Runtime::new();
        let (count, set_count) = rt.create_state(0);
        let runs = Rc::new(Cell::new(0));

        let effect = rt.create_effect({
            let runs = runs.clone();
            let count = count.clone();
            move || {
                count.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(count.subscriber_count(), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(count.subscriber_count(), 0);

        set_count.set(1);
        effect.execute();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_can_dispose_itself_mid_run() {
        let rt = Runtime::new();
        let (count, set_count) = rt.create_state(0);
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let log = Rc::new(RefCell::new(Vec::new()));

        let effect = rt.create_effect({
            let slot = slot.clone();
            let log = log.clone();
            move || {
                let value = count.get();
                log.borrow_mut().push(value);
                if value >= 2 {
                    if let Some(me) = slot.borrow().as_ref() {
                        me.dispose();
                    }
                }
            }
        });
        *slot.borrow_mut() = Some(effect.clone());

        set_count.set(1);
        set_count.set(2);
        set_count.set(3);

        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(effect.is_disposed());
        slot.borrow_mut().take();
    }

    #[test]
    fn effect_tracks_only_latest_dependencies() {
        let rt = Runtime::new();
        let (show, set_show) = rt.create_state(true);
        let (detail, set_detail) = rt.create_state(0);
        let runs = Rc::new(Cell::new(0));

        let effect = rt.create_effect({
            let runs = runs.clone();
            let detail = detail.clone();
            move || {
                runs.set(runs.get() + 1);
                if show.get() {
                    detail.get();
                }
            }
        });
        assert_eq!(effect.dependency_count(), 2);

        set_show.set(false);
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(detail.subscriber_count(), 0);

        set_detail.set(5);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dependency_keeps_subscriber_position_across_runs() {
        let rt = Runtime::new();
        let (source, set_source) = rt.create_state(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let _effects: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|name| {
                let source = source.clone();
                let order = order.clone();
                rt.create_effect(move || {
                    source.get();
                    order.borrow_mut().push(name);
                })
            })
            .collect();

        order.borrow_mut().clear();
        set_source.set(1);
        set_source.set(2);
        assert_eq!(*order.borrow(), vec!["first", "second", "first", "second"]);
    }

    #[test]
    fn dropping_last_handle_stops_effect() {
        let rt = Runtime::new();
        let (count, set_count) = rt.create_state(0);
        let runs = Rc::new(Cell::new(0));

        let effect = rt.create_effect({
            let runs = runs.clone();
            let count = count.clone();
            move || {
                count.get();
                runs.set(runs.get() + 1);
            }
        });
        let clone = effect.clone();

        drop(effect);
        set_count.set(1);
        assert_eq!(runs.get(), 2);

        drop(clone);
        assert_eq!(count.subscriber_count(), 0);
        set_count.set(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn dropping_every_handle_frees_captured_state() {
        struct DropFlag(Rc<Cell<bool>>);

        impl DropFlag {
            fn touch(&self) {}
        }

        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        {
            let rt = Runtime::new();
            let (count, set_count) = rt.create_state(0);
            let flag = DropFlag(dropped.clone());

            let _effect = rt.create_effect(move || {
                flag.touch();
                count.get();
            });
            set_count.set(1);
            assert!(!dropped.get());
        }

        assert!(dropped.get());
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = rt.create_effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}

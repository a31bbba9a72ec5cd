//! Writable stores.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::ops::Deref;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::middleware::{StoreAction, StoreMiddleware};
use crate::reactive::{Effect, Memo, ReadSignal, Readable, Runtime, Signal};

type Callback<T> = Rc<dyn Fn(&T)>;
type Subscribers<T> = RefCell<IndexMap<u64, Callback<T>>>;

struct StoreInner<T>
where
    T: Clone + PartialEq + 'static,
{
    runtime: Runtime,
    signal: Signal<T>,
    initial: T,
    subscribers: Rc<Subscribers<T>>,
    next_subscription: Cell<u64>,
    middleware: RefCell<Vec<Rc<dyn StoreMiddleware<T>>>>,

    /// Calls subscribers after every change.
    watcher: Effect,
}

impl<T> Drop for StoreInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn drop(&mut self) {
        self.watcher.dispose();
    }
}

/// A writable value with callback subscribers.
///
/// Reading a store inside an effect or memo tracks it like any signal.
///
/// # Example
///
/// ```rust
/// use singular_core::Runtime;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let rt = Runtime::new();
/// let count = rt.create_store(0);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let subscription = count.subscribe({
///     let seen = seen.clone();
///     move |v: &i32| seen.borrow_mut().push(*v)
/// });
///
/// count.set(1);
/// count.update(|v| v + 1);
/// subscription.unsubscribe();
/// count.reset();
///
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// assert_eq!(count.get(), 0);
/// ```
pub struct Store<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<StoreInner<T>>,
}

impl<T> Store<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a store holding `initial`.
    pub fn new(runtime: &Runtime, initial: T) -> Self {
        let signal = runtime.signal(initial.clone());
        let subscribers: Rc<Subscribers<T>> = Rc::new(RefCell::new(IndexMap::new()));

        let watcher = runtime.create_effect({
            let runtime = runtime.clone();
            let signal = signal.clone();
            let subscribers = Rc::clone(&subscribers);
            move || {
                let value = signal.get();
                let callbacks: SmallVec<[Callback<T>; 4]> =
                    subscribers.borrow().values().cloned().collect();
                runtime.untrack(|| {
                    for callback in &callbacks {
                        callback(&value);
                    }
                });
            }
        });

        Self {
            inner: Rc::new(StoreInner {
                runtime: runtime.clone(),
                signal,
                initial,
                subscribers,
                next_subscription: Cell::new(0),
                middleware: RefCell::new(Vec::new()),
                watcher,
            }),
        }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.inner.signal.get()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.signal.get_untracked()
    }

    /// Write a new value through the middleware chain.
    pub fn set(&self, value: T) {
        self.dispatch(StoreAction::Set, value);
    }

    /// Write a value computed from the current one.
    ///
    /// The current value is read without tracking.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.inner.signal.with_untracked(f);
        self.dispatch(StoreAction::Update, next);
    }

    /// Restore the value the store was created with.
    pub fn reset(&self) {
        self.dispatch(StoreAction::Reset, self.inner.initial.clone());
    }

    /// Call `f` with the new value after every change.
    ///
    /// `f` is not called for the current value, and its reads are not
    /// tracked.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = self.inner.next_subscription.get();
        self.inner.next_subscription.set(id + 1);
        self.inner.subscribers.borrow_mut().insert(id, Rc::new(f));

        let subscribers = Rc::downgrade(&self.inner.subscribers);
        Subscription {
            cancel: Box::new(move || match subscribers.upgrade() {
                Some(subscribers) => {
                    let removed = subscribers.borrow_mut().shift_remove(&id);
                    removed.is_some()
                }
                None => false,
            }),
        }
    }

    /// Get the number of callback subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Append a middleware to the write chain.
    ///
    /// The first middleware applied is the outermost.
    pub fn apply_middleware<M>(&self, middleware: M) -> &Self
    where
        M: StoreMiddleware<T> + 'static,
    {
        self.inner.middleware.borrow_mut().push(Rc::new(middleware));
        self
    }

    /// Create a memo derived from this store's value.
    pub fn derived<U, F>(&self, f: F) -> Memo<U>
    where
        U: Clone + 'static,
        F: Fn(&T) -> U + 'static,
    {
        let signal = self.inner.signal.clone();
        self.inner
            .runtime
            .create_computed(move || signal.with(|value| f(value)))
    }

    /// Get a read-only handle to the underlying cell.
    pub fn read_only(&self) -> ReadSignal<T> {
        self.inner.signal.read_only()
    }

    /// Bind a set of action handlers to this store.
    ///
    /// `build` receives a handle to the store and returns the handlers,
    /// usually a struct of closures calling `set`, `update` and `get`. The
    /// result dereferences to the handlers and keeps the store reachable.
    pub fn actions<A, F>(&self, build: F) -> Actions<T, A>
    where
        F: FnOnce(Store<T>) -> A,
    {
        Actions {
            handlers: build(self.clone()),
            store: self.clone(),
        }
    }

    fn dispatch(&self, action: StoreAction, value: T) {
        let chain = self.inner.middleware.borrow().clone();
        self.run_chain(&chain, action, value);
    }

    fn run_chain(&self, chain: &[Rc<dyn StoreMiddleware<T>>], action: StoreAction, value: T) {
        match chain.split_first() {
            Some((first, rest)) => {
                first.handle(action, value, &|next| self.run_chain(rest, action, next))
            }
            None => {
                self.inner.signal.set(value);
            }
        }
    }
}

impl<T> Clone for Store<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Store<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .field("middleware", &self.inner.middleware.borrow().len())
            .finish()
    }
}

impl<T> Readable<T> for Store<T>
where
    T: Clone + PartialEq + 'static,
{
    fn get(&self) -> T {
        Store::get(self)
    }

    fn get_untracked(&self) -> T {
        Store::get_untracked(self)
    }
}

/// Handle returned by [`Store::subscribe`].
///
/// Dropping it leaves the callback registered.
pub struct Subscription {
    cancel: Box<dyn FnOnce() -> bool>,
}

impl Subscription {
    /// Remove the callback. Returns `false` if the store is already gone.
    pub fn unsubscribe(self) -> bool {
        (self.cancel)()
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Action handlers bound to a store, returned by [`Store::actions`].
pub struct Actions<T, A>
where
    T: Clone + PartialEq + 'static,
{
    store: Store<T>,
    handlers: A,
}

impl<T, A> Actions<T, A>
where
    T: Clone + PartialEq + 'static,
{
    /// Get the store the handlers act on.
    pub fn store(&self) -> &Store<T> {
        &self.store
    }

    /// Unwrap the handlers.
    pub fn into_handlers(self) -> A {
        self.handlers
    }
}

impl<T, A> Deref for Actions<T, A>
where
    T: Clone + PartialEq + 'static,
{
    type Target = A;

    fn deref(&self) -> &A {
        &self.handlers
    }
}

impl<T, A> Debug for Actions<T, A>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actions")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Combine two reactive sources into a memo.
pub fn derived2<A, B, U, RA, RB, F>(runtime: &Runtime, a: RA, b: RB, f: F) -> Memo<U>
where
    RA: Readable<A> + 'static,
    RB: Readable<B> + 'static,
    U: Clone + 'static,
    F: Fn(A, B) -> U + 'static,
{
    runtime.create_computed(move || f(a.get(), b.get()))
}

impl Runtime {
    /// Create a writable store.
    pub fn create_store<T>(&self, initial: T) -> Store<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Store::new(self, initial)
    }

    /// Create a cell that can only be read.
    pub fn readable<T>(&self, value: T) -> ReadSignal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        self.signal(value).read_only()
    }
}

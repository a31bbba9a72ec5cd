//! Singular Core
//!
//! This crate provides the reactivity engine for the Singular UI library.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Batched notification
//! - Owner scopes that dispose groups of effects
//! - A writable store layer built on top of the primitives
//!
//! The engine is single-threaded and synchronous: a write to a signal re-runs
//! every dependent effect on the caller's stack before `set` returns. Memos
//! downstream of the write are marked stale first, so each effect runs once
//! and sees consistent values.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Runtime, execution context and the signal/memo/effect primitives
//! - `graph`: Per-cell dependency nodes and the batch scheduler
//! - `store`: Svelte-style stores with subscribers and middleware
//!
//! # Example
//!
//! ```rust
//! use singular_core::Runtime;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let (count, set_count) = rt.create_state(0);
//!
//! // Create a derived value
//! let doubled = rt.create_computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let _effect = rt.create_effect({
//!     let seen = seen.clone();
//!     move || seen.borrow_mut().push((count.get(), doubled.get()))
//! });
//!
//! // Update the signal
//! set_count.set(5);
//! assert_eq!(*seen.borrow(), vec![(0, 0), (5, 10)]);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod store;

pub use error::{ReactiveError, Result};
pub use reactive::{
    Effect, ExecutionContext, Memo, Owner, ReadSignal, Readable, Runtime, RuntimeConfig, Signal,
    SubscriberId, WriteSignal,
};
pub use store::{Actions, Store, StoreAction, StoreMiddleware, Subscription, TracingMiddleware};

//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of Singular's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changed and someone reads it.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems,
//! such as updating the DOM or logging.
//!
//! ## Batches
//!
//! A batch defers effect runs until a group of writes has finished, so each
//! affected effect runs once.
//!
//! ## Owners
//!
//! An Owner keeps the effects created under it alive and tears them down,
//! together with registered cleanup callbacks, when it is disposed.
//!
//! # Implementation Notes
//!
//! There is no global state. Each `Runtime` owns an `ExecutionContext` holding
//! the currently running subscriber and the stack of active subscribers, and
//! every primitive keeps a handle to the runtime that created it.

mod context;
mod effect;
mod memo;
mod owner;
mod readable;
mod runtime;
mod signal;
mod subscriber;

pub use context::{ContextFrame, ExecutionContext, OwnerFrame};
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use owner::Owner;
pub use readable::Readable;
pub use runtime::{Runtime, RuntimeConfig};
pub use signal::{ReadSignal, Signal, WriteSignal};
pub use subscriber::{Subscriber, SubscriberId, SubscriberKind};

//! Stores
//!
//! A store is a writable cell with an explicit subscriber list, for code that
//! prefers callbacks over effects. It is built entirely from the reactive
//! primitives: a signal holds the value and an internal effect fans changes
//! out to subscribers.
//!
//! Writes can be routed through a middleware chain (see [`StoreMiddleware`]),
//! which is how logging is attached.

mod middleware;
#[allow(clippy::module_inception)]
mod store;

pub use middleware::{StoreAction, StoreMiddleware, TracingMiddleware};
pub use store::{derived2, Actions, Store, Subscription};

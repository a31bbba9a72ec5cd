//! Store middleware.

use std::fmt::Debug;

use tracing::debug;

/// The store operation that produced a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    Set,
    Update,
    Reset,
}

impl StoreAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreAction::Set => "SET",
            StoreAction::Update => "UPDATE",
            StoreAction::Reset => "RESET",
        }
    }
}

/// A link in a store's write chain.
///
/// Middleware receives every value about to be written and decides what, if
/// anything, to pass to `next`. Not calling `next` drops the write.
/// Middleware applied first runs outermost.
pub trait StoreMiddleware<T> {
    fn handle(&self, action: StoreAction, value: T, next: &dyn Fn(T));
}

impl<T, F> StoreMiddleware<T> for F
where
    F: Fn(StoreAction, T, &dyn Fn(T)),
{
    fn handle(&self, action: StoreAction, value: T, next: &dyn Fn(T)) {
        self(action, value, next)
    }
}

/// Logs every store write at `debug` level.
#[derive(Debug, Clone)]
pub struct TracingMiddleware {
    name: String,
}

impl TracingMiddleware {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new("store")
    }
}

impl<T> StoreMiddleware<T> for TracingMiddleware
where
    T: Debug,
{
    fn handle(&self, action: StoreAction, value: T, next: &dyn Fn(T)) {
        debug!(store = %self.name, action = action.as_str(), value = ?value, "store action");
        next(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn closures_are_middleware() {
        let seen = RefCell::new(Vec::new());
        let double = |action: StoreAction, value: i32, next: &dyn Fn(i32)| {
            assert_eq!(action, StoreAction::Set);
            next(value * 2)
        };

        double.handle(StoreAction::Set, 4, &|v| seen.borrow_mut().push(v));
        assert_eq!(*seen.borrow(), vec![8]);
    }

    #[test]
    fn tracing_middleware_passes_value_through() {
        let seen: RefCell<Option<i32>> = RefCell::new(None);
        let logger = TracingMiddleware::new("counter");

        logger.handle(StoreAction::Update, 3, &|v| *seen.borrow_mut() = Some(v));
        assert_eq!(*seen.borrow(), Some(3));
        assert_eq!(logger.name(), "counter");
    }

    #[test]
    fn action_names() {
        assert_eq!(StoreAction::Set.as_str(), "SET");
        assert_eq!(StoreAction::Update.as_str(), "UPDATE");
        assert_eq!(StoreAction::Reset.as_str(), "RESET");
    }
}

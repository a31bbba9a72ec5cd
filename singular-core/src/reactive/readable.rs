//! Common read interface for reactive values.

use super::memo::Memo;
use super::signal::{ReadSignal, Signal};

/// Anything that can be read reactively.
///
/// Lets helpers such as [`crate::store::derived2`] accept signals, memos and
/// stores interchangeably.
pub trait Readable<T> {
    /// Read the value, registering the current subscriber.
    fn get(&self) -> T;

    /// Read the value without registering anything.
    fn get_untracked(&self) -> T;
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }
}

impl<T> Readable<T> for ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn get(&self) -> T {
        ReadSignal::get(self)
    }

    fn get_untracked(&self) -> T {
        ReadSignal::get_untracked(self)
    }
}

impl<T> Readable<T> for Memo<T>
where
    T: Clone + 'static,
{
    fn get(&self) -> T {
        Memo::get(self)
    }

    fn get_untracked(&self) -> T {
        Memo::get_untracked(self)
    }
}

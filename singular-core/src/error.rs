//! Error types for the reactive core.
//!
//! Most misuse of the engine is either harmless (re-entrant notifications are
//! skipped) or undefined by contract (writing from inside a memo). The errors
//! here cover the cases that can be detected without slowing down reads.

use thiserror::Error;

/// Errors reported by the checked (`try_*`) entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A memo was read while its own function was still evaluating.
    #[error("memo {id} read itself while recomputing")]
    CyclicComputed {
        /// Raw id of the memo's dependency node.
        id: u64,
    },
}

pub type Result<T> = std::result::Result<T, ReactiveError>;

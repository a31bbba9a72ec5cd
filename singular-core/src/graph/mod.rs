//! Dependency Graph
//!
//! This module implements the bookkeeping that connects reactive cells to the
//! computations that read them.
//!
//! # Overview
//!
//! The graph is stored in a distributed way rather than as one central map:
//!
//! - Each cell (signal or memo) owns a `DependencyNode` listing its subscribers
//! - Each subscriber keeps weak back-references to the nodes it read on its
//!   most recent run, so it can unsubscribe from the ones it stopped reading
//!
//! When a cell changes, its node notifies every subscriber in registration
//! order inside a batch. Memo invalidators run immediately; effects are
//! parked in the `BatchScheduler` and run once the outermost batch closes.
//!
//! # Design Decisions
//!
//! 1. Subscriber sets are `IndexMap`s keyed by `SubscriberId`, which gives
//!    identity-based membership and stable insertion-order iteration.
//!
//! 2. Nodes hold subscribers weakly and subscribers hold nodes weakly. The
//!    graph never keeps anything alive: cells live as long as their handles,
//!    effects as long as their handles or owner.
//!
//! 3. Notification is fully synchronous and recursive. Very deep chains of
//!    effects writing signals consume proportional stack space.

mod node;
mod scheduler;

pub use node::{DependencyNode, NodeId};
pub use scheduler::{BatchGuard, BatchScheduler};

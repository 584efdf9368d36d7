// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for layout operations.

use thiserror::Error;

/// Errors reported by [`LayoutEngine`](crate::LayoutEngine).
///
/// Apart from [`LayoutError::InvalidConfig`], every variant means the caller
/// reported a change that does not match the engine's tables. The engine
/// leaves its tables untouched when it returns one of these. Recovery is a
/// full [`reload`](crate::LayoutEngine::reload).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A configuration value was rejected.
    #[error("invalid layout configuration: {0}")]
    InvalidConfig(&'static str),

    /// The container of a change is neither an indexed group nor reachable
    /// through the source.
    #[error("the changed container is not a group known to the layout")]
    UnknownGroup,

    /// The item to remove has no slot in its container.
    #[error("item {index} is not present in its container")]
    ItemNotFound {
        /// Child index named by the caller.
        index: usize,
    },

    /// The engine's tables disagree with each other.
    #[error("inconsistent layout tables: {0}")]
    InconsistentTables(&'static str),
}

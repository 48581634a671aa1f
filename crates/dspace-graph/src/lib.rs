//! dSpace mount graph
//!
//! Mounting resource B into resource A adds the edge `A -> B`. The mount graph
//! is a multi-rooted forest (a multitree): a resource may be mounted in more
//! than one place, but every root reaches any node along at most one path.
//! Edges that would create a second path, or a cycle, are rejected with
//! [`GraphError::AmbiguousPath`] and leave the graph unchanged.

#![deny(unsafe_code)]

pub mod error;
pub mod multitree;

pub use error::{GraphError, Result};
pub use multitree::{ChildEdge, EdgeOutcome, MultiTree};

//! Yield policies
//!
//! A `YieldPolicy` record names a source and a target resource and a
//! condition over both. When the condition holds, every child mounted active
//! under the source and also mounted under the target is yielded by the source
//! and activated under the target.

pub mod condition;
mod engine;

pub use condition::{Condition, ConditionError, ConditionResult};
pub use engine::{policy_kind, Policy, PolicyController, PolicyEngine, PolicySpec};

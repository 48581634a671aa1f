//! dSpace Types - shared data model
//!
//! Every component of dSpace speaks in terms of the types in this crate:
//!
//! - **Kind**: group/version/name triple identifying a resource schema
//! - **NamespacedName**: the identity of a resource within the store
//! - **ResourceRef**: a resource, or one attribute inside it
//! - **AttrPath**: dotted attribute path with `\.` escapes
//! - **Document**: one resource's persisted state with path-based access
//! - **Mounts**: the mount references a resource carries at `spec.mount`

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod document;
pub mod error;
pub mod kind;
pub mod mount;
pub mod name;
pub mod path;
pub mod reference;

pub use document::Document;
pub use error::{Result, TypesError};
pub use kind::Kind;
pub use mount::{
    MountEdge, MountRef, MountStatus, Mounts, DEFAULT_MOUNT_MODE, MOUNT_ATTR_PATH,
};
pub use name::{NamespacedName, DEFAULT_NAMESPACE};
pub use path::AttrPath;
pub use reference::ResourceRef;

//! Resource store boundary
//!
//! Controllers read and write resource documents exclusively through the
//! [`ResourceStore`] trait and learn about changes through per-kind watch
//! streams. [`InMemoryStore`] backs the daemon and the tests.

#![deny(unsafe_code)]

mod error;
mod event;
mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use event::{WatchEvent, WatchEventType};
pub use memory::InMemoryStore;
pub use traits::{ResourceStore, WatchStream};

//! dSpace Daemon library
//!
//! This module provides the pieces `dspaced` is assembled from:
//! - Layered configuration
//! - Store seeding from a JSON file
//! - Server lifecycle: discovery, sync and policy controllers, shutdown

pub mod config;
pub mod error;
pub mod seed;
pub mod server;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use server::Server;

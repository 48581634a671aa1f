//! Daemon error types

use dspace_controller::ControllerError;
use dspace_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("seed error: {0}")]
    Seed(String),

    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;

//! Controller error types

use crate::policy::ConditionError;
use dspace_graph::GraphError;
use dspace_store::StoreError;
use dspace_types::TypesError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("document error: {0}")]
    Document(#[from] TypesError),

    #[error("unknown binding mode '{0}'")]
    InvalidMode(String),

    #[error("condition error: {0}")]
    Condition(#[from] ConditionError),

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("{mount} is not mounted in {target}")]
    MountNotFound { mount: String, target: String },

    #[error("watch error: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Errors that retrying the same request cannot fix
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ControllerError::InvalidMode(_)
                | ControllerError::InvalidSpec(_)
                | ControllerError::Condition(_)
                | ControllerError::Document(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;

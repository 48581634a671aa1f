use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    NodeNotFound(String),

    #[error("edge does not exist: {start}-{end}")]
    EdgeNotFound { start: String, end: String },

    #[error("node {node} already shares root {root} with the new parent")]
    AmbiguousPath { node: String, root: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;

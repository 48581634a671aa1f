//! Error types for the data model

use thiserror::Error;

/// Errors raised while parsing or manipulating resource data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid kind: {0}")]
    InvalidKind(String),

    #[error("invalid namespaced name: {0}")]
    InvalidName(String),

    #[error("invalid resource reference: {0}")]
    InvalidRef(String),

    #[error("invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("segment '{segment}' of path '{path}' is not a map")]
    NotAMap { path: String, segment: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;

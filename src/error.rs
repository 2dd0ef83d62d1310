//! Error types for schemalign

use crate::report::FailureKind;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// schemalign errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unresolved schema path: '{step}' is not a child at {type_name}/{path}")]
    UnresolvedPath {
        type_name: String,
        path: String,
        step: String,
    },

    #[error("Unresolved join key in {cell}: {message}")]
    UnresolvedJoinKey { cell: String, message: String },

    #[error("Path crosses from {container} into {nested} without a join linking them")]
    UnlinkedFeatureType { container: String, nested: String },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Unknown transformation function: {0}")]
    UnknownFunction(String),

    #[error("Function '{function}' does not support {capability} transformation")]
    UnsupportedCapability {
        function: String,
        capability: String,
    },

    #[error("Missing parameter '{parameter}' for {function}")]
    MissingParameter { function: String, parameter: String },

    #[error("Invalid parameter '{parameter}' for {function}: {message}")]
    InvalidParameter {
        function: String,
        parameter: String,
        message: String,
    },

    #[error("Invalid cell {cell}: {message}")]
    InvalidCell { cell: String, message: String },

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("No type cell establishes the target of {cell}")]
    MissingTypeCell { cell: String },

    #[error("Cell {cell} depends on failed type cell {type_cell}")]
    DependencyFailed { cell: String, type_cell: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classification used by the compile report
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::UnresolvedPath { .. } => FailureKind::UnresolvedPath,
            Error::UnresolvedJoinKey { .. } => FailureKind::UnresolvedJoinKey,
            Error::UnlinkedFeatureType { .. } => FailureKind::UnlinkedFeatureType,
            Error::UnknownType(_) => FailureKind::UnknownType,
            Error::UnknownFunction(_) | Error::UnsupportedCapability { .. } => {
                FailureKind::UnsupportedFunction
            }
            Error::MissingParameter { .. }
            | Error::InvalidParameter { .. }
            | Error::InvalidCell { .. }
            | Error::InvalidCondition(_) => FailureKind::Configuration,
            Error::MissingTypeCell { .. } => FailureKind::Ordering,
            Error::DependencyFailed { .. } => FailureKind::DependencyFailed,
            _ => FailureKind::Internal,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

use std::path::PathBuf;
use thiserror::Error;

use crate::session::InputKind;

pub type Result<T> = std::result::Result<T, PartError>;

#[derive(Debug, Error)]
pub enum PartError {
    /// Reuse requested against a part of a different concrete kind.
    #[error(
        "can only reuse parameters of model parts of the same kind: \
         '{name}' is a {kind}, '{reused}' is a {reused_kind}"
    )]
    ReuseKindMismatch {
        name: String,
        kind: &'static str,
        reused: String,
        reused_kind: &'static str,
    },

    #[error("cannot use initializers in model part '{name}' that reuses variables from '{reused}'")]
    InitializersWithReuse { name: String, reused: String },

    #[error("variable '{0}' does not exist, disallowed in reuse mode")]
    MissingVariable(String),

    #[error("variable '{0}' already exists, disallowed outside reuse mode")]
    VariableExists(String),

    #[error("shape mismatch for '{name}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("variable '{0}' is not initialized in this session")]
    Uninitialized(String),

    #[error("checkpoint {path:?} has no value for variable '{name}'")]
    NotInCheckpoint { path: PathBuf, name: String },

    #[error("input '{name}' expects {expected:?}, got {found:?}")]
    FeedKindMismatch {
        name: String,
        expected: InputKind,
        found: InputKind,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("tensor data error: {0}")]
    Tensor(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint data encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error("checkpoint index is malformed: {0}")]
    Index(#[from] serde_json::Error),
}

impl PartError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

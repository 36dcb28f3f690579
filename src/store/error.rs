use std::fmt;

use crate::model::FormatError;

/// Rejections raised before the store mutates anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    EmptyTitle,
    UnknownNode(String),
    UnknownParent(String),
    SelfLink,
    EmptyTree,
    Format(FormatError),
    /// Every node in an import document already exists.
    NothingToImport,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "node title must not be empty"),
            Self::UnknownNode(id) => write!(f, "no node with id {id}"),
            Self::UnknownParent(id) => write!(f, "parent node {id} does not exist"),
            Self::SelfLink => write!(f, "a node cannot link to itself"),
            Self::EmptyTree => write!(f, "there are no nodes to export"),
            Self::Format(error) => error.fmt(f),
            Self::NothingToImport => write!(f, "all nodes in the import already exist"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Format(error) => Some(error),
            _ => None,
        }
    }
}

impl From<FormatError> for StoreError {
    fn from(error: FormatError) -> Self {
        Self::Format(error)
    }
}

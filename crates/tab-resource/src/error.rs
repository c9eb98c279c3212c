//! Resource error types.

use std::path::PathBuf;

use tab_ecs::{EcsError, GameEntity};
use thiserror::Error;

/// Resource error type.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Reading a resource's backing file failed.
    #[error("failed to load {path}: {source}")]
    Load {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A description resolves outside the loader's root directory.
    #[error("resource path {0} escapes the loader root")]
    EscapesRoot(PathBuf),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// ECS error.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// Invalid keep-alive configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The entity is not a resource of this database.
    #[error("entity {0} is not a known resource")]
    UnknownResource(GameEntity),
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

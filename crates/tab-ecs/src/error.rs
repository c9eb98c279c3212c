//! Error types for checked ECS operations.
//!
//! The low-level API treats these conditions as programming errors and
//! only asserts on them in debug builds. Checked accessors and the
//! [`World`](crate::World) facade report them as values instead.

use thiserror::Error;

use crate::{
    component::ComponentType,
    entity::{GameEntity, GameEntityHandle},
    row::RowId,
};

/// ECS error type.
#[derive(Debug, Error)]
pub enum EcsError {
    /// No board is registered for the component type.
    #[error("component type {0} is not registered in this world")]
    UnregisteredType(ComponentType),

    /// The entity was destroyed (or never existed).
    #[error("entity {0} is not alive")]
    DeadEntity(GameEntity),

    /// The handle does not name a live entity.
    #[error("entity handle {0} does not refer to a live entity")]
    DeadHandle(GameEntityHandle),

    /// The entity has no reference to the component type.
    #[error("entity {entity} has no {component} (archetype components: {archetype})")]
    MissingComponent {
        entity: GameEntityHandle,
        component: ComponentType,
        archetype: String,
    },

    /// The board is a different family or element type than requested.
    #[error("board for {component} is not a {expected} (found a {found} board)")]
    BoardMismatch {
        component: ComponentType,
        expected: &'static str,
        found: &'static str,
    },

    /// A metadata slot points past the end of the board's storage.
    #[error("row {row} of {component} is out of range (storage holds {len} slots)")]
    RowOutOfRange {
        component: ComponentType,
        row: RowId,
        len: usize,
    },

    /// Resolving a shared component took more hops than allowed.
    #[error("indirection limit of {limit} exceeded while resolving {component} for {entity}")]
    IndirectionLimit {
        component: ComponentType,
        entity: GameEntity,
        limit: u32,
    },

    /// A restored row list names the null row, a row past `max_id`, or
    /// the same row twice.
    #[error("cannot restore row {row} into rows 1..={max_id}")]
    InvalidRestore { row: RowId, max_id: RowId },

    /// Snapshot data does not fit the board it is imported into.
    #[error("snapshot of {component} does not match board: {reason}")]
    SnapshotMismatch {
        component: ComponentType,
        reason: &'static str,
    },

    /// Snapshot bytes ended early or could not be read.
    #[error("snapshot decode error: {0}")]
    Decode(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for checked ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

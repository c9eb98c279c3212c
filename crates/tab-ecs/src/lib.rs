// Allow unsafe code in ECS - unchecked accessor lookups
#![allow(unsafe_code)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::float_cmp)]

//! TabEcs - board-based Entity Component System
//!
//! Component values live in per-type columnar tables ("boards") indexed by
//! row id. Entities reference rows through a per-type links column, so
//! several entities can share one reference-counted row.
//!
//! # Key Concepts
//!
//! - **GameEntity**: generational `(id, version)` reference to an entity
//! - **Board**: per-type storage; [`SingleComponentBoard`],
//!   [`BufferComponentBoard`] or [`TagComponentBoard`]
//! - **Row**: recyclable slot inside a board, freed when its last
//!   referencing entity lets go
//! - **Archetype**: interned set of component types an entity holds
//!
//! # Layers
//!
//! - [`low_level`]: free functions keeping boards, the [`EntityBoard`] and
//!   the [`ArchetypeBoard`] consistent
//! - [`World`]: typed convenience API on top, with batched archetype updates
//! - accessors ([`ComponentDataAccessor`] and friends): span-based views
//!   with checked `get` and unchecked `get_unchecked`
//! - [`snapshot`]: raw board export/import and serializer plug-ins
//!
//! ```ignore
//! let mut world = World::new();
//! let health = world.register::<Health>();
//!
//! let a = world.create_entity();
//! let b = world.create_entity();
//! world.set(a, Health(100))?;
//! world.share(health, a, b)?;        // b reads a's row
//! world.remove(a, health)?;          // row survives, b still holds it
//! world.commit_archetypes();
//! ```

#[allow(unused_extern_crates)]
extern crate self as tab_ecs;

mod accessor;
mod archetype;
mod board;
mod component;
mod config;
mod entity;
mod entity_board;
mod error;
pub mod low_level;
mod query;
mod registry;
mod row;
pub mod snapshot;
mod world;

pub use accessor::{
    BufferMut, ComponentBufferAccessor, ComponentBufferAccessorMut, ComponentDataAccessor,
    ComponentDataAccessorMut,
};
pub use archetype::{Archetype, ArchetypeBoard, EntityArchetype, Signature};
pub use board::{
    BoardCore, BufferComponentBoard, ComponentBoard, SingleComponentBoard, TagComponentBoard,
};
pub use component::{
    BoardKind, BufferComponent, Component, ComponentReference, ComponentType, ComponentTypeInfo,
    TagComponent,
};
pub use config::EngineConfig;
pub use entity::{GameEntity, GameEntityHandle};
pub use entity_board::{ComponentMetadata, EntityBoard, MetadataFlags};
pub use error::{EcsError, EcsResult};
pub use query::{Query, QueryBuilder, QueryRow, QueryTerm, TermAccess};
pub use registry::ComponentTypeRegistry;
pub use row::{NULL_ROW, RowAllocator, RowId};
pub use tab_ecs_derive::{BufferComponent, Component, TagComponent};
pub use world::{World, WorldPartsMut};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BufferComponent, Component, ComponentType, EcsError, EcsResult, GameEntity,
        GameEntityHandle, TagComponent, World,
    };
}

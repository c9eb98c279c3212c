//! Entity identifiers with generational versions.
//!
//! Entities use a generational index pattern to safely reuse ids
//! while detecting use-after-free scenarios. Hot per-type columns use
//! the version-less [`GameEntityHandle`] instead.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// A unique identifier for an entity in the world.
///
/// Entities are represented as a combination of:
/// - `id`: Index into the entity board (never 0 for a live entity)
/// - `version`: Bumped every time the id is recycled
///
/// Two entities are equal only if both fields match, so a handle captured
/// before disposal never aliases the entity that later reuses its id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable)]
#[repr(C)]
pub struct GameEntity {
    id: u32,
    version: u32,
}

impl GameEntity {
    /// The null entity. Id 0 is never issued by the entity board.
    pub const NULL: GameEntity = GameEntity { id: 0, version: 0 };

    /// Create an entity from its raw parts.
    #[must_use]
    pub const fn new(id: u32, version: u32) -> Self {
        Self { id, version }
    }

    /// Get the entity's index.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// Get the entity's version.
    #[must_use]
    pub const fn version(self) -> u32 {
        self.version
    }

    /// Drop the version, keeping only the fast column index.
    #[must_use]
    pub const fn handle(self) -> GameEntityHandle {
        GameEntityHandle { id: self.id }
    }

    /// Check if this is the null entity.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.id == 0
    }

    /// Pack entity into a single u64 for efficient storage/transmission.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.version as u64) << 32) | (self.id as u64)
    }

    /// Unpack entity from a u64.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            id: bits as u32,
            version: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for GameEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameEntity({}v{})", self.id, self.version)
    }
}

impl fmt::Display for GameEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.version)
    }
}

/// Version-less entity reference used to index per-type columns.
///
/// A handle is never a source of liveness truth: the entity it names may
/// have been destroyed and its id reused. Upgrade it through
/// [`EntityBoard::entity`](crate::EntityBoard::entity) when liveness matters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct GameEntityHandle {
    id: u32,
}

impl GameEntityHandle {
    /// Create a handle from a raw id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self { id }
    }

    /// Get the raw id.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// The id as a column index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.id as usize
    }
}

impl From<GameEntity> for GameEntityHandle {
    fn from(entity: GameEntity) -> Self {
        entity.handle()
    }
}

impl fmt::Debug for GameEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameEntityHandle({})", self.id)
    }
}

impl fmt::Display for GameEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

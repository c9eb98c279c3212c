//! Component type interning and metadata.
//!
//! Every Rust type used as a component is interned once per process into a
//! dense [`ComponentType`] id. Storage and query paths index plain arrays
//! by that integer instead of hashing `TypeId`s.

use std::{
    any::TypeId,
    fmt,
    sync::LazyLock,
};

use bytemuck::Pod;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::row::RowId;

/// Fixed-size, blittable component stored in a
/// [`SingleComponentBoard`](crate::SingleComponentBoard).
///
/// Usually implemented with `#[derive(Component)]` next to
/// `#[derive(Pod, Zeroable)]`.
pub trait Component: Pod + Send + Sync + 'static {}

/// Element type of a variable-length component stored in a
/// [`BufferComponentBoard`](crate::BufferComponentBoard).
pub trait BufferComponent: Pod + Send + Sync + 'static {}

/// Zero-size marker stored in a [`TagComponentBoard`](crate::TagComponentBoard).
pub trait TagComponent: Send + Sync + 'static {}

/// Which board family stores a component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoardKind {
    /// One fixed-size value per row.
    Single,
    /// One growable list per row.
    Buffer,
    /// No data, rows only carry ownership and refcounts.
    Tag,
}

impl BoardKind {
    /// Human-readable name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Buffer => "buffer",
            Self::Tag => "tag",
        }
    }

    /// Stable wire tag.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Single => 0,
            Self::Buffer => 1,
            Self::Tag => 2,
        }
    }

    /// Decode a wire tag.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Single),
            1 => Some(Self::Buffer),
            2 => Some(Self::Tag),
            _ => None,
        }
    }
}

/// Dense, process-wide identifier for a component type.
///
/// Id 0 is reserved and never assigned to a type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ComponentType(u32);

impl ComponentType {
    /// The reserved invalid type.
    pub const NONE: Self = Self(0);

    /// Intern a fixed-size component type.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        intern::<T>(BoardKind::Single)
    }

    /// Intern a buffer component element type.
    #[must_use]
    pub fn of_buffer<T: BufferComponent>() -> Self {
        intern::<T>(BoardKind::Buffer)
    }

    /// Intern a tag component type.
    #[must_use]
    pub fn of_tag<T: TagComponent>() -> Self {
        intern::<T>(BoardKind::Tag)
    }

    /// Look up the id of a type without interning it.
    #[must_use]
    pub fn lookup<T: 'static>() -> Option<Self> {
        TYPE_TABLE.read().by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Create a component type from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// The id as an array index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the reserved invalid type.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Runtime information recorded when the type was interned.
    #[must_use]
    pub fn info(self) -> Option<ComponentTypeInfo> {
        let idx = (self.0 as usize).checked_sub(1)?;
        TYPE_TABLE.read().infos.get(idx).copied()
    }

    /// Short type name, for diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().map_or("<unknown>", |info| info.name)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({}:{})", self.0, self.name())
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime information about an interned component type.
#[derive(Clone, Copy, Debug)]
pub struct ComponentTypeInfo {
    /// Interned id.
    pub id: ComponentType,
    /// Type name without module path.
    pub name: &'static str,
    /// Full type name.
    pub full_name: &'static str,
    /// Board family the type was interned for.
    pub kind: BoardKind,
    /// Size of one value (one list element for buffers).
    pub element_size: usize,
    /// Alignment of one value.
    pub align: usize,
    /// Rust TypeId for type checking.
    pub type_id: TypeId,
}

/// One physical slot inside one board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentReference {
    /// Board the slot lives in.
    pub component_type: ComponentType,
    /// Row inside that board.
    pub row: RowId,
}

impl ComponentReference {
    /// Create a reference to `row` of the board for `component_type`.
    #[must_use]
    pub const fn new(component_type: ComponentType, row: RowId) -> Self {
        Self {
            component_type,
            row,
        }
    }
}

#[derive(Default)]
struct TypeTable {
    by_type: FxHashMap<TypeId, ComponentType>,
    /// Indexed by `id - 1`.
    infos: Vec<ComponentTypeInfo>,
}

static TYPE_TABLE: LazyLock<RwLock<TypeTable>> =
    LazyLock::new(|| RwLock::new(TypeTable::default()));

fn intern<T: 'static>(kind: BoardKind) -> ComponentType {
    let type_id = TypeId::of::<T>();

    let existing = TYPE_TABLE.read().by_type.get(&type_id).copied();
    if let Some(id) = existing {
        debug_assert_kind(id, kind);
        return id;
    }

    let mut table = TYPE_TABLE.write();
    // Another thread may have interned it between the two locks
    if let Some(&id) = table.by_type.get(&type_id) {
        drop(table);
        debug_assert_kind(id, kind);
        return id;
    }

    let id = ComponentType(table.infos.len() as u32 + 1);
    let full_name = std::any::type_name::<T>();
    table.infos.push(ComponentTypeInfo {
        id,
        name: short_name(full_name),
        full_name,
        kind,
        element_size: std::mem::size_of::<T>(),
        align: std::mem::align_of::<T>(),
        type_id,
    });
    table.by_type.insert(type_id, id);
    id
}

fn debug_assert_kind(id: ComponentType, kind: BoardKind) {
    if cfg!(debug_assertions) {
        let interned = id.info().map(|info| info.kind);
        debug_assert_eq!(
            interned,
            Some(kind),
            "{} was interned as a {} component, not {}",
            id.name(),
            interned.map_or("<unknown>", BoardKind::name),
            kind.name()
        );
    }
}

/// Strip the module path, keeping generic arguments intact.
fn short_name(full: &'static str) -> &'static str {
    let base_end = full.find('<').unwrap_or(full.len());
    let start = full[..base_end].rfind("::").map_or(0, |idx| idx + 2);
    &full[start..]
}

#[cfg(test)]
mod tests {
    use bytemuck::{Pod, Zeroable};

    use super::*;

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, Pod, Zeroable)]
    #[repr(C)]
    struct Velocity {
        x: f32,
        y: f32,
    }
    impl Component for Velocity {}

    struct Frozen;
    impl TagComponent for Frozen {}

    #[test]
    fn test_interning_is_idempotent() {
        let a = ComponentType::of::<Position>();
        let b = ComponentType::of::<Position>();

        assert_eq!(a, b);
        assert!(!a.is_none());
        assert_eq!(ComponentType::lookup::<Position>(), Some(a));
    }

    #[test]
    fn test_distinct_types_get_distinct_ids() {
        let pos = ComponentType::of::<Position>();
        let vel = ComponentType::of::<Velocity>();
        let frozen = ComponentType::of_tag::<Frozen>();

        assert_ne!(pos, vel);
        assert_ne!(pos, frozen);
        assert_ne!(vel, frozen);
    }

    #[test]
    fn test_component_info() {
        let pos = ComponentType::of::<Position>();
        let info = pos.info().unwrap();

        assert_eq!(info.name, "Position");
        assert_eq!(info.kind, BoardKind::Single);
        assert_eq!(info.element_size, std::mem::size_of::<Position>());
        assert_eq!(info.type_id, TypeId::of::<Position>());

        let frozen = ComponentType::of_tag::<Frozen>().info().unwrap();
        assert_eq!(frozen.kind, BoardKind::Tag);
        assert_eq!(frozen.element_size, 0);
    }

    #[test]
    fn test_short_name_keeps_generics() {
        assert_eq!(short_name("a::b::Health"), "Health");
        assert_eq!(short_name("a::Tag<b::c::Texture>"), "Tag<b::c::Texture>");
        assert_eq!(short_name("u8"), "u8");
    }

    #[test]
    fn test_none_has_no_info() {
        assert!(ComponentType::NONE.info().is_none());
        assert_eq!(ComponentType::NONE.name(), "<unknown>");
    }
}

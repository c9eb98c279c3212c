//! Raw board export/import and serializer plug-ins.
//!
//! Boards are exported row by row as raw bytes together with the
//! bookkeeping needed to rebuild them (live rows, owners and reference
//! counts). Different component types never share memory, so exports can
//! fan out across threads with `rayon` while the world is not being
//! mutated.
//!
//! # Wire format
//!
//! All integers are little-endian. The raw-copy encoding of one board:
//!
//! ```text
//! u32 component type | u8 kind | u32 element size | u32 max row id | u32 row count
//! per row: u32 row | u64 owner | u32 refcount | u32 byte length | bytes
//! ```

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    World,
    board::{BoardInternals, ComponentBoard},
    component::{BoardKind, ComponentType},
    entity::GameEntity,
    error::{EcsError, EcsResult},
    registry::ComponentTypeRegistry,
    row::RowId,
};

/// Raw copy of one board's live rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardExport {
    pub component_type: ComponentType,
    pub kind: BoardKind,
    pub element_size: usize,
    pub max_id: RowId,
    /// Live rows, ascending.
    pub rows: Vec<RowId>,
    /// Owner of each row in `rows`.
    pub owners: Vec<GameEntity>,
    /// Reference count of each row in `rows`.
    pub ref_counts: Vec<u32>,
    /// Byte length of each row's data.
    pub lengths: Vec<u32>,
    /// Row data, concatenated in `rows` order.
    pub data: Vec<u8>,
}

impl BoardExport {
    /// Iterate over `(row, bytes)` pairs.
    pub fn row_data(&self) -> impl Iterator<Item = (RowId, &[u8])> {
        let mut offset = 0;
        self.rows.iter().zip(&self.lengths).map(move |(&row, &len)| {
            let start = offset;
            offset += len as usize;
            (row, &self.data[start..offset])
        })
    }

    fn validate(&self) -> EcsResult<()> {
        let mismatch = |reason| EcsError::SnapshotMismatch {
            component: self.component_type,
            reason,
        };
        let count = self.rows.len();
        if self.owners.len() != count
            || self.ref_counts.len() != count
            || self.lengths.len() != count
        {
            return Err(mismatch("column lengths differ"));
        }
        let total: usize = self.lengths.iter().map(|&len| len as usize).sum();
        if total != self.data.len() {
            return Err(mismatch("row lengths do not cover the data"));
        }
        if self.rows.iter().any(|&row| row == 0 || row > self.max_id) {
            return Err(mismatch("row id outside the live range"));
        }
        if self.rows.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(mismatch("rows are not strictly ascending"));
        }
        if self.ref_counts.contains(&0) {
            return Err(mismatch("live row without references"));
        }
        Ok(())
    }

    /// Check every row length against the board family before anything
    /// is written.
    fn check_lengths(&self) -> EcsResult<()> {
        let size = self.element_size as u32;
        let fits = |len: u32| match self.kind {
            BoardKind::Single => len == size,
            BoardKind::Buffer if size == 0 => len == 0,
            BoardKind::Buffer => len % size == 0,
            BoardKind::Tag => len == 0,
        };
        if self.lengths.iter().all(|&len| fits(len)) {
            Ok(())
        } else {
            Err(EcsError::SnapshotMismatch {
                component: self.component_type,
                reason: "row data does not fit the element type",
            })
        }
    }
}

/// Copy every live row of a board.
#[must_use]
pub fn export_board(board: &dyn ComponentBoard) -> BoardExport {
    let core = board.core();
    let mut rows = core.rows().used_rows().to_vec();
    rows.sort_unstable();

    let mut owners = Vec::with_capacity(rows.len());
    let mut ref_counts = Vec::with_capacity(rows.len());
    let mut lengths = Vec::with_capacity(rows.len());
    let mut data = Vec::with_capacity(rows.len() * board.element_size());

    for &row in &rows {
        let bytes = board.row_bytes(row).unwrap_or_default();
        owners.push(core.owner(row));
        ref_counts.push(core.reference_count(row));
        lengths.push(bytes.len() as u32);
        data.extend_from_slice(bytes);
    }

    BoardExport {
        component_type: board.component_type(),
        kind: board.kind(),
        element_size: board.element_size(),
        max_id: core.max_id(),
        rows,
        owners,
        ref_counts,
        lengths,
        data,
    }
}

/// Rebuild a board from an export.
///
/// Values currently stored in the board are discarded. The export is
/// checked in full first, so a rejected export leaves the board as it was.
pub fn import_board(board: &mut dyn ComponentBoard, export: &BoardExport) -> EcsResult<()> {
    let component = board.component_type();
    let mismatch = |reason| EcsError::SnapshotMismatch { component, reason };
    if export.component_type != component {
        return Err(mismatch("component type differs"));
    }
    if export.kind != board.kind() {
        return Err(mismatch("board kind differs"));
    }
    if export.element_size != board.element_size() {
        return Err(mismatch("element size differs"));
    }
    export.validate()?;
    export.check_lengths()?;

    let stale = board.core().rows().used_rows().to_vec();
    board
        .core_mut()
        .restore(export.max_id, &export.rows, &export.owners, &export.ref_counts)?;
    let capacity = board.core().capacity();
    board.resize_storage(capacity);
    for row in stale {
        board.clear_row(row);
    }

    for (row, bytes) in export.row_data() {
        if !board.write_row_bytes(row, bytes) {
            return Err(mismatch("row data does not fit the element type"));
        }
    }
    Ok(())
}

/// The entity-to-row links column of a type, as raw bytes.
#[must_use]
pub fn links_bytes(world: &World, component_type: ComponentType) -> &[u8] {
    bytemuck::cast_slice(world.entities().links(component_type))
}

/// Export every registered board, one board per task.
#[must_use]
pub fn export_boards_parallel(registry: &ComponentTypeRegistry) -> Vec<BoardExport> {
    registry
        .types()
        .par_iter()
        .filter_map(|&ty| registry.board(ty))
        .map(export_board)
        .collect()
}

/// Follow ownership from `entity` to the entity whose row data is
/// authoritative for `component_type`.
///
/// Fails with [`EcsError::IndirectionLimit`] after `max_depth` hops.
pub fn resolve_indirection(
    world: &World,
    component_type: ComponentType,
    entity: GameEntity,
    max_depth: u32,
) -> EcsResult<GameEntity> {
    let board = world
        .registry()
        .board(component_type)
        .ok_or(EcsError::UnregisteredType(component_type))?;

    let mut current = entity;
    let mut hops = 0;
    loop {
        if !world.is_alive(current) {
            return Err(EcsError::DeadEntity(current));
        }
        let meta = world.entities().metadata(component_type, current.handle());
        if meta.is_null() {
            return Err(EcsError::MissingComponent {
                entity: current.handle(),
                component: component_type,
                archetype: world
                    .archetypes()
                    .describe(world.entities().archetype(current.handle())),
            });
        }

        let owner = board.core().owner(meta.id());
        if owner.is_null() || owner == current {
            return Ok(current);
        }

        hops += 1;
        if hops > max_depth {
            return Err(EcsError::IndirectionLimit {
                component: component_type,
                entity,
                limit: max_depth,
            });
        }
        current = owner;
    }
}

/// Per-type serialization strategy.
pub trait BoardSerializer: Send + Sync {
    /// Check if this serializer handles the board.
    fn can_serialize(&self, board: &dyn ComponentBoard) -> bool;

    /// Append the encoded board to `out`.
    fn serialize_board(
        &self,
        world: &World,
        board: &dyn ComponentBoard,
        out: &mut Vec<u8>,
    ) -> EcsResult<()>;
}

/// Default strategy: every live row copied as raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCopySerializer;

impl RawCopySerializer {
    /// Encode an export.
    pub fn write_export(export: &BoardExport, out: &mut impl Write) -> EcsResult<()> {
        out.write_u32::<LittleEndian>(export.component_type.as_raw())?;
        out.write_u8(export.kind.to_raw())?;
        out.write_u32::<LittleEndian>(export.element_size as u32)?;
        out.write_u32::<LittleEndian>(export.max_id)?;
        out.write_u32::<LittleEndian>(export.rows.len() as u32)?;

        for (i, (row, bytes)) in export.row_data().enumerate() {
            out.write_u32::<LittleEndian>(row)?;
            out.write_u64::<LittleEndian>(export.owners[i].to_bits())?;
            out.write_u32::<LittleEndian>(export.ref_counts[i])?;
            out.write_u32::<LittleEndian>(bytes.len() as u32)?;
            out.write_all(bytes)?;
        }
        Ok(())
    }
}

impl BoardSerializer for RawCopySerializer {
    fn can_serialize(&self, _board: &dyn ComponentBoard) -> bool {
        true
    }

    fn serialize_board(
        &self,
        _world: &World,
        board: &dyn ComponentBoard,
        out: &mut Vec<u8>,
    ) -> EcsResult<()> {
        Self::write_export(&export_board(board), out)
    }
}

/// Upper bound on rows reserved from a header before any row is read.
const MAX_PREALLOC_ROWS: usize = 4096;

/// Decode one board written by [`RawCopySerializer`].
///
/// Header counts are not trusted for allocation: columns grow with the
/// rows actually present in the input.
pub fn read_raw_board(input: &mut impl Read) -> EcsResult<BoardExport> {
    let component_type = ComponentType::from_raw(input.read_u32::<LittleEndian>()?);
    let kind = BoardKind::from_raw(input.read_u8()?).ok_or(EcsError::SnapshotMismatch {
        component: component_type,
        reason: "unknown board kind",
    })?;
    let element_size = input.read_u32::<LittleEndian>()? as usize;
    let max_id = input.read_u32::<LittleEndian>()?;
    let count = input.read_u32::<LittleEndian>()? as usize;
    let reserve = count.min(MAX_PREALLOC_ROWS);

    let mut export = BoardExport {
        component_type,
        kind,
        element_size,
        max_id,
        rows: Vec::with_capacity(reserve),
        owners: Vec::with_capacity(reserve),
        ref_counts: Vec::with_capacity(reserve),
        lengths: Vec::with_capacity(reserve),
        data: Vec::new(),
    };

    for _ in 0..count {
        export.rows.push(input.read_u32::<LittleEndian>()?);
        export
            .owners
            .push(GameEntity::from_bits(input.read_u64::<LittleEndian>()?));
        export.ref_counts.push(input.read_u32::<LittleEndian>()?);
        let len = input.read_u32::<LittleEndian>()?;
        export.lengths.push(len);

        let read = (&mut *input)
            .take(u64::from(len))
            .read_to_end(&mut export.data)?;
        if read != len as usize {
            return Err(EcsError::Decode(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("row data ended after {read} of {len} bytes"),
            )));
        }
    }

    export.validate()?;
    Ok(export)
}

/// Entry tag: the entity owns the row and carries its bytes.
pub const ENTRY_DATA: u8 = 0;
/// Entry tag: the entity shares another entity's row.
pub const ENTRY_REFERENCE: u8 = 1;

/// Writes each row once, for its owner; sharers only carry a reference
/// to the owning entity.
///
/// ```text
/// u32 component type | u32 entry count
/// per entry: u64 entity | u8 tag
///   tag 0: u32 byte length | bytes
///   tag 1: u64 owner
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedIndirectionSerializer;

impl BoardSerializer for SharedIndirectionSerializer {
    fn can_serialize(&self, board: &dyn ComponentBoard) -> bool {
        board.kind() != BoardKind::Tag
    }

    fn serialize_board(
        &self,
        world: &World,
        board: &dyn ComponentBoard,
        out: &mut Vec<u8>,
    ) -> EcsResult<()> {
        let component_type = board.component_type();
        let max_depth = world.config().max_indirection_depth;
        let links = world.entities().links(component_type);

        let mut holders: Vec<_> = world
            .entities()
            .alive()
            .filter_map(|entity| {
                let meta = links.get(entity.handle().index())?;
                (!meta.is_null()).then_some((entity, meta.id()))
            })
            .collect();
        holders.sort_unstable();

        out.write_u32::<LittleEndian>(component_type.as_raw())?;
        out.write_u32::<LittleEndian>(holders.len() as u32)?;

        for (entity, row) in holders {
            let owner = resolve_indirection(world, component_type, entity, max_depth)?;
            out.write_u64::<LittleEndian>(entity.to_bits())?;
            if owner == entity {
                let bytes = board.row_bytes(row).unwrap_or_default();
                out.write_u8(ENTRY_DATA)?;
                out.write_u32::<LittleEndian>(bytes.len() as u32)?;
                out.write_all(bytes)?;
            } else {
                out.write_u8(ENTRY_REFERENCE)?;
                out.write_u64::<LittleEndian>(owner.to_bits())?;
            }
        }
        Ok(())
    }
}

/// Serializes boards, choosing a plug-in per component type and falling
/// back to [`RawCopySerializer`].
#[derive(Default)]
pub struct SnapshotWriter {
    plugins: FxHashMap<ComponentType, Box<dyn BoardSerializer>>,
    fallback: RawCopySerializer,
}

impl SnapshotWriter {
    /// Create a writer with no plug-ins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `serializer` for boards of `component_type`.
    pub fn register(
        &mut self,
        component_type: ComponentType,
        serializer: Box<dyn BoardSerializer>,
    ) -> &mut Self {
        self.plugins.insert(component_type, serializer);
        self
    }

    /// Serialize one board.
    pub fn write_board(
        &self,
        world: &World,
        component_type: ComponentType,
        out: &mut Vec<u8>,
    ) -> EcsResult<()> {
        let board = world
            .registry()
            .board(component_type)
            .ok_or(EcsError::UnregisteredType(component_type))?;

        match self.plugins.get(&component_type) {
            Some(plugin) if plugin.can_serialize(board) => {
                plugin.serialize_board(world, board, out)
            }
            _ => self.fallback.serialize_board(world, board, out),
        }
    }

    /// Serialize every registered board in parallel.
    ///
    /// The first failing board aborts the whole snapshot.
    pub fn write_all(&self, world: &World) -> EcsResult<Vec<(ComponentType, Vec<u8>)>> {
        world
            .registry()
            .types()
            .par_iter()
            .map(|&ty| -> EcsResult<(ComponentType, Vec<u8>)> {
                let mut out = Vec::new();
                self.write_board(world, ty, &mut out)?;
                Ok((ty, out))
            })
            .collect()
    }
}

impl std::fmt::Debug for SnapshotWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotWriter")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytemuck::{Pod, Zeroable};

    use super::*;
    use crate::{
        board::{BufferComponentBoard, SingleComponentBoard},
        component::{BufferComponent, Component},
        config::EngineConfig,
    };

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Transform {
        x: f32,
        y: f32,
        angle: f32,
    }
    impl Component for Transform {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Glyph(u16);
    impl BufferComponent for Glyph {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Team(u32);
    impl Component for Team {}

    #[test]
    fn test_raw_copy_round_trip() {
        let mut world = World::new();
        let transform = world.register::<Transform>();
        let entities = world.create_entities(40);
        for (i, &e) in entities.iter().enumerate() {
            let v = i as f32;
            world.set(e, Transform { x: v, y: -v, angle: v * 0.5 }).unwrap();
        }
        for &e in entities.iter().step_by(3) {
            world.destroy_entity(e);
        }

        let mut bytes = Vec::new();
        SnapshotWriter::new()
            .write_board(&world, transform, &mut bytes)
            .unwrap();
        let decoded = read_raw_board(&mut Cursor::new(bytes)).unwrap();

        let mut restored = SingleComponentBoard::<Transform>::new(1);
        import_board(&mut restored, &decoded).unwrap();

        let original = world
            .registry()
            .typed::<SingleComponentBoard<Transform>>(transform)
            .unwrap();
        for &row in original.core().rows().used_rows() {
            let a = bytemuck::bytes_of(original.get(row).unwrap());
            let b = bytemuck::bytes_of(restored.get(row).unwrap());
            assert_eq!(a, b);
            assert_eq!(original.core().owner(row), restored.core().owner(row));
        }
        assert_eq!(restored.core().len(), original.core().len());
        assert_eq!(restored.core().max_id(), original.core().max_id());
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut world = World::new();
        let glyph = world.register_buffer::<Glyph>();
        let e = world.create_entity();
        world
            .add_buffer::<Glyph>(e)
            .unwrap()
            .extend([Glyph(1), Glyph(2), Glyph(3)]);

        let export = export_board(world.registry().board(glyph).unwrap());
        let mut restored = BufferComponentBoard::<Glyph>::new(1);
        import_board(&mut restored, &export).unwrap();

        let row = world.entities().metadata(glyph, e.handle()).id();
        assert_eq!(restored.list(row), Some(&[Glyph(1), Glyph(2), Glyph(3)][..]));
    }

    #[test]
    fn test_import_rejects_other_type() {
        let mut world = World::new();
        let transform = world.register::<Transform>();
        let export = export_board(world.registry().board(transform).unwrap());

        let mut other = SingleComponentBoard::<Team>::new(1);
        assert!(matches!(
            import_board(&mut other, &export),
            Err(EcsError::SnapshotMismatch { .. })
        ));
    }

    /// Board of two teams owned by live entities, plus its export.
    fn team_board() -> (SingleComponentBoard<Team>, BoardExport) {
        let mut world = World::new();
        let team = world.register::<Team>();
        for value in [4, 9] {
            let e = world.create_entity();
            world.set(e, Team(value)).unwrap();
        }
        let export = export_board(world.registry().board(team).unwrap());

        let mut board = SingleComponentBoard::<Team>::new(1);
        import_board(&mut board, &export).unwrap();
        (board, export)
    }

    fn assert_rejected(board: &mut SingleComponentBoard<Team>, bad: &BoardExport) {
        let before = export_board(&*board);
        assert!(matches!(
            import_board(&mut *board, bad),
            Err(EcsError::SnapshotMismatch { .. })
        ));
        assert_eq!(export_board(&*board), before);
    }

    #[test]
    fn test_import_rejects_duplicate_rows() {
        let (mut board, export) = team_board();
        let mut bad = export;
        bad.rows = vec![1, 1];
        assert_rejected(&mut board, &bad);

        bad.rows = vec![2, 1];
        assert_rejected(&mut board, &bad);
    }

    #[test]
    fn test_import_rejects_wrong_row_length() {
        let (mut board, export) = team_board();
        let mut bad = export;
        bad.lengths = vec![3, 5];
        assert_rejected(&mut board, &bad);

        bad.lengths = vec![8, 0];
        assert_rejected(&mut board, &bad);
    }

    #[test]
    fn test_import_rejects_unreferenced_live_row() {
        let (mut board, export) = team_board();
        let mut bad = export;
        bad.ref_counts[1] = 0;
        assert_rejected(&mut board, &bad);
    }

    #[test]
    fn test_import_rejects_ragged_buffer_row() {
        let mut world = World::new();
        let glyph = world.register_buffer::<Glyph>();
        let e = world.create_entity();
        world.add_buffer::<Glyph>(e).unwrap().extend([Glyph(1), Glyph(2)]);
        let export = export_board(world.registry().board(glyph).unwrap());

        let mut board = BufferComponentBoard::<Glyph>::new(1);
        import_board(&mut board, &export).unwrap();
        let before = export_board(&board);

        let mut bad = export;
        bad.lengths = vec![3];
        bad.data.truncate(3);
        assert!(import_board(&mut board, &bad).is_err());
        assert_eq!(export_board(&board), before);
    }

    #[test]
    fn test_oversized_row_count_is_a_decode_error() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u8(BoardKind::Single.to_raw()).unwrap();
        bytes.write_u32::<LittleEndian>(4).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();

        assert!(matches!(
            read_raw_board(&mut Cursor::new(bytes)),
            Err(EcsError::Decode(_))
        ));
    }

    #[test]
    fn test_short_row_payload_is_a_decode_error() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u8(BoardKind::Single.to_raw()).unwrap();
        bytes.write_u32::<LittleEndian>(4).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u64::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let err = read_raw_board(&mut Cursor::new(bytes)).unwrap_err();
        assert!(
            matches!(err, EcsError::Decode(ref error) if error.kind() == io::ErrorKind::UnexpectedEof)
        );
    }

    #[test]
    fn test_truncated_input_is_a_decode_error() {
        let mut world = World::new();
        let team = world.register::<Team>();
        let e = world.create_entity();
        world.set(e, Team(7)).unwrap();

        let mut bytes = Vec::new();
        SnapshotWriter::new().write_board(&world, team, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);

        assert!(matches!(
            read_raw_board(&mut Cursor::new(bytes)),
            Err(EcsError::Decode(_))
        ));
    }

    #[test]
    fn test_parallel_export_covers_every_board() {
        let mut world = World::new();
        world.register::<Transform>();
        world.register::<Team>();
        world.register_buffer::<Glyph>();

        let exports = export_boards_parallel(world.registry());
        assert_eq!(exports.len(), 3);

        let written = SnapshotWriter::new().write_all(&world).unwrap();
        assert_eq!(written.len(), 3);
    }

    #[test]
    fn test_shared_indirection() {
        let mut world = World::new();
        let team = world.register::<Team>();
        let owner = world.create_entity();
        let sharer = world.create_entity();
        world.set(owner, Team(3)).unwrap();
        world.share(team, owner, sharer).unwrap();

        assert_eq!(resolve_indirection(&world, team, sharer, 8).unwrap(), owner);
        assert_eq!(resolve_indirection(&world, team, owner, 0).unwrap(), owner);
        assert!(matches!(
            resolve_indirection(&world, team, sharer, 0),
            Err(EcsError::IndirectionLimit { limit: 0, .. })
        ));

        let mut writer = SnapshotWriter::new();
        writer.register(team, Box::new(SharedIndirectionSerializer));
        let mut bytes = Vec::new();
        writer.write_board(&world, team, &mut bytes).unwrap();

        let mut input = Cursor::new(bytes);
        assert_eq!(input.read_u32::<LittleEndian>().unwrap(), team.as_raw());
        assert_eq!(input.read_u32::<LittleEndian>().unwrap(), 2);

        assert_eq!(input.read_u64::<LittleEndian>().unwrap(), owner.to_bits());
        assert_eq!(input.read_u8().unwrap(), ENTRY_DATA);
        assert_eq!(input.read_u32::<LittleEndian>().unwrap(), 4);
        assert_eq!(input.read_u32::<LittleEndian>().unwrap(), 3);

        assert_eq!(input.read_u64::<LittleEndian>().unwrap(), sharer.to_bits());
        assert_eq!(input.read_u8().unwrap(), ENTRY_REFERENCE);
        assert_eq!(input.read_u64::<LittleEndian>().unwrap(), owner.to_bits());
    }

    #[test]
    fn test_indirection_limit_aborts_snapshot() {
        let mut world = World::with_config(EngineConfig {
            max_indirection_depth: 0,
            ..EngineConfig::default()
        });
        let team = world.register::<Team>();
        world.register::<Transform>();
        let owner = world.create_entity();
        let sharer = world.create_entity();
        world.set(owner, Team(1)).unwrap();
        world.share(team, owner, sharer).unwrap();

        let mut writer = SnapshotWriter::new();
        writer.register(team, Box::new(SharedIndirectionSerializer));

        assert!(matches!(
            writer.write_all(&world),
            Err(EcsError::IndirectionLimit { .. })
        ));
    }

    #[test]
    fn test_links_bytes_match_metadata() {
        let mut world = World::new();
        let team = world.register::<Team>();
        let e = world.create_entity();
        world.set(e, Team(1)).unwrap();

        let bytes = links_bytes(&world, team);
        let links: &[crate::ComponentMetadata] = bytemuck::cast_slice(bytes);
        assert_eq!(links[e.handle().index()].id(), 1);
    }
}

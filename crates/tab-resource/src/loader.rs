//! Loading resource payloads.

use std::path::{Component, Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use tab_ecs::{BufferComponent, GameEntity, World};

use crate::{
    db::{GameResourceDb, ResourceDescription, ResourceLoaded},
    error::{ResourceError, ResourceResult},
};

/// One byte of a loaded resource payload.
#[derive(BufferComponent, Pod, Zeroable, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct ResourceByte(pub u8);

/// Fills a resource entity from its description.
pub trait ResourceLoader<D> {
    /// Load `description` into `entity`.
    fn load(&self, world: &mut World, entity: GameEntity, description: &D) -> ResourceResult<()>;
}

/// Reads files below a root directory into a [`ResourceByte`] buffer.
///
/// Descriptions must be relative paths that stay below the root: absolute
/// paths and `..` segments are rejected.
#[derive(Clone, Debug)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Resolve descriptions relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory descriptions are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl<D: AsRef<Path>> ResourceLoader<D> for FileLoader {
    fn load(&self, world: &mut World, entity: GameEntity, description: &D) -> ResourceResult<()> {
        let relative = description.as_ref();
        if !stays_below_root(relative) {
            return Err(ResourceError::EscapesRoot(relative.to_path_buf()));
        }
        let path = self.root.join(relative);
        let bytes = std::fs::read(&path).map_err(|source| ResourceError::Load { path, source })?;

        world.register_buffer::<ResourceByte>();
        let mut buffer = world.add_buffer::<ResourceByte>(entity)?;
        buffer.clear();
        buffer.extend(bytes.into_iter().map(ResourceByte));
        Ok(())
    }
}

fn stays_below_root(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Outcome of [`load_pending`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Resources now tagged [`ResourceLoaded`].
    pub loaded: usize,
    /// Resources whose loader failed; they were disposed.
    pub failed: usize,
}

/// Run `loader` on every resource not yet tagged [`ResourceLoaded`].
///
/// A failing resource is logged and disposed; the rest still load.
pub fn load_pending<D, L>(world: &mut World, db: &mut GameResourceDb<D>, loader: &L) -> ResourceResult<LoadSummary>
where
    D: ResourceDescription,
    L: ResourceLoader<D> + ?Sized,
{
    let mut summary = LoadSummary::default();

    for resource in db.resources() {
        if world.has::<ResourceLoaded>(resource) {
            continue;
        }
        let Some(description) = db.description(resource).cloned() else {
            continue;
        };

        match loader.load(world, resource, &description) {
            Ok(()) => {
                world.add_tag::<ResourceLoaded>(resource)?;
                summary.loaded += 1;
            }
            Err(err) => {
                tracing::error!(%resource, ?description, %err, "failed to load resource");
                db.dispose(world, resource);
                summary.failed += 1;
            }
        }
    }

    if summary.loaded + summary.failed > 0 {
        tracing::debug!(loaded = summary.loaded, failed = summary.failed, "loaded pending resources");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_file_loader_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), b"hi!").unwrap();

        let mut world = World::new();
        let mut db = GameResourceDb::<PathBuf>::new(&mut world).unwrap();
        let hello = db.get_or_create(&mut world, "hello.txt".into()).unwrap();

        let summary = load_pending(&mut world, &mut db, &FileLoader::new(dir.path())).unwrap();

        assert_eq!(summary, LoadSummary { loaded: 1, failed: 0 });
        assert!(world.has::<ResourceLoaded>(hello));
        let bytes: Vec<u8> = world
            .buffer::<ResourceByte>(hello)
            .unwrap()
            .iter()
            .map(|b| b.0)
            .collect();
        assert_eq!(bytes, b"hi!");
    }

    #[test]
    fn test_missing_file_disposes_resource() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("present.bin"), [1u8, 2, 3]).unwrap();

        let mut world = World::new();
        let mut db = GameResourceDb::<PathBuf>::new(&mut world).unwrap();
        let present = db.get_or_create(&mut world, "present.bin".into()).unwrap();
        let missing = db.get_or_create(&mut world, "missing.bin".into()).unwrap();

        let summary = load_pending(&mut world, &mut db, &FileLoader::new(dir.path())).unwrap();

        assert_eq!(summary, LoadSummary { loaded: 1, failed: 1 });
        assert!(world.is_alive(present));
        assert!(!world.is_alive(missing));
        assert_eq!(db.try_get(&PathBuf::from("missing.bin")), None);
    }

    #[test]
    fn test_loaded_resources_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), [7u8]).unwrap();

        let mut world = World::new();
        let mut db = GameResourceDb::<PathBuf>::new(&mut world).unwrap();
        db.get_or_create(&mut world, "a.bin".into()).unwrap();
        let loader = FileLoader::new(dir.path());

        assert_eq!(load_pending(&mut world, &mut db, &loader).unwrap().loaded, 1);
        assert_eq!(load_pending(&mut world, &mut db, &loader).unwrap(), LoadSummary::default());
    }

    #[test]
    fn test_file_loader_stays_below_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("assets");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret.bin"), [9u8]).unwrap();
        fs::write(root.join("ok.bin"), [1u8]).unwrap();

        let mut world = World::new();
        let entity = world.create_entity();
        let loader = FileLoader::new(&root);

        let outside = dir.path().join("secret.bin");
        for description in [outside, PathBuf::from("../secret.bin"), PathBuf::from("sub/../../x")] {
            let err = loader.load(&mut world, entity, &description).unwrap_err();
            assert!(matches!(err, ResourceError::EscapesRoot(ref path) if *path == description));
        }
        assert!(loader.load(&mut world, entity, &PathBuf::from("./ok.bin")).is_ok());
    }

    #[test]
    fn test_escaping_description_disposes_resource() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("assets");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret.bin"), [9u8]).unwrap();

        let mut world = World::new();
        let mut db = GameResourceDb::<PathBuf>::new(&mut world).unwrap();
        let escaping = db.get_or_create(&mut world, "../secret.bin".into()).unwrap();

        let summary = load_pending(&mut world, &mut db, &FileLoader::new(&root)).unwrap();

        assert_eq!(summary, LoadSummary { loaded: 0, failed: 1 });
        assert!(!world.is_alive(escaping));
        assert!(!world.has::<ResourceLoaded>(escaping));
    }

    #[test]
    fn test_load_error_names_the_path() {
        let mut world = World::new();
        let entity = world.create_entity();
        let loader = FileLoader::new("/nonexistent-root");

        let err = loader
            .load(&mut world, entity, &PathBuf::from("x.bin"))
            .unwrap_err();
        assert!(matches!(err, ResourceError::Load { ref path, .. } if path.ends_with("x.bin")));
    }
}

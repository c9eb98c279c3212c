//! Resource layer for TabEcs.
//!
//! Resources are ordinary entities. [`GameResourceDb`] gives each distinct
//! description (a path, an id) exactly one entity, [`KeepAliveSystem`]
//! finds resources nothing references anymore, and [`load_pending`] fills
//! new resources through a [`ResourceLoader`].
//!
//! ```ignore
//! let mut textures = GameResourceDb::<PathBuf>::new(&mut world)?;
//! let grass = textures.get_or_create(&mut world, "grass.png".into())?;
//! load_pending(&mut world, &mut textures, &FileLoader::new("assets"))?;
//!
//! let mut keep_alive = KeepAliveSystem::new(KeepAliveConfig::default());
//! keep_alive.add_check(DataKeepAlive::new(|t: &Texture| Some(t.0)));
//! let unused = keep_alive.update(&world, &textures)?;
//! keep_alive.sweep(&mut world, &mut textures, &unused);
//! ```

mod db;
mod error;
mod keep_alive;
mod loader;

pub use db::{GameResourceDb, ResourceDbState, ResourceDescription, ResourceLoaded, ResourceTag};
pub use error::{ResourceError, ResourceResult};
pub use keep_alive::{
    BufferKeepAlive, DataKeepAlive, KeepAlive, KeepAliveConfig, KeepAliveSystem,
};
pub use loader::{FileLoader, LoadSummary, ResourceByte, ResourceLoader, load_pending};

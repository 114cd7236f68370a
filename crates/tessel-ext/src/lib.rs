//! Extensions: the virtual file-system they live in, their manifests, and
//! the editor blocks they contribute.

mod blocks;
mod catalog;
mod local;
mod manifest;
mod memory;
mod vfs;

pub mod error;

pub use blocks::{BlockDescriptor, BlockRegistry, enabled_blocks};
pub use catalog::{APPS_ROOT, ExtensionCatalog, INDEX_FILE, MANIFEST_FILE};
pub use error::{Error, Result};
pub use local::LocalVfs;
pub use manifest::{DisplayMode, ExtensionManifest};
pub use memory::MemoryVfs;
pub use vfs::{DirEntry, EntryKind, Vfs, VfsFile};

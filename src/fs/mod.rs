//! Read-only filesystem seam used by the cache resolver and the context assembler

mod mock;
mod real;
mod r#trait;

pub use mock::MockFileSystem;
pub use r#trait::{DirEntry, EntryKind, FileSystem};
pub use real::RealFileSystem;

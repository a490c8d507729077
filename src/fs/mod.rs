pub mod dir;
pub mod geometry;
pub mod names;
pub mod volume;

pub use dir::{DirectoryCache, RawDirEntry};
pub use geometry::Geometry;
pub use volume::Fat32Volume;

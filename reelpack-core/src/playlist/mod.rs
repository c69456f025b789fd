//! Ordered playlists with referential integrity against the catalog
mod store;

pub use store::{Playlist, PlaylistEvent, PlaylistMetadata, PlaylistStore};

//! Streaming tilesets rendered through a composite layer.
//!
//! A [`Tileset`] decides which tiles a viewport needs and loads their content on its own
//! schedule. The [`TileLayer`] loads the tileset on a worker thread, follows the tile
//! events it emits and keeps one sublayer per tile with loaded content.

pub mod layer;
pub mod tileset;

pub use layer::{
    SublayerFactory, TileCallback, TileFailCallback, TileLayer, TilesetCallback, TilesetSource,
};
pub use tileset::{
    LoadState, TileContent, TileContentKind, TileEvent, TileHeader, Tileset, TilesetLoader,
    TilesetResult,
};

use snafu::Snafu;

pub type Result<T, E = TileError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum TileError {
    #[snafu(display("Unsupported tile content {kind:?}"))]
    UnsupportedContent { kind: String },

    #[snafu(display("Failed to load {uri}: {message}"))]
    Load { uri: String, message: String },
}

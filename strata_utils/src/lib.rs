mod deck_args;
mod logging;
pub mod rect;
pub mod redraw;

pub use deck_args::DeckArgs;
pub use rect::ScreenRect;
pub use redraw::{RedrawFlag, RedrawReason};

pub use tracing;

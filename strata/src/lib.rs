//! Layered data visualization on the GPU.
//!
//! A [`Deck`] owns views, layers and effects and draws them every frame. Layers expose
//! per-instance attributes; when their data changes, attribute transitions animate the
//! GPU buffers from the old values to the new ones.

pub mod animation_loop;
pub mod attributes;
pub mod deck;
pub mod effects;
pub mod layers;
pub mod picking;
pub mod renderer;
pub mod tiles;
pub mod timeline;
pub mod transitions;
pub mod utils;
pub mod views;

pub use deck::{Deck, DeckError, DeckProps, DeckUpdate, Lifecycle};

pub use ::strata_render;
pub use ::strata_utils;
pub use ::tracing;

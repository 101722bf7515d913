//! Hit testing through color encoded picking passes.

pub mod info;
pub mod picker;

pub use info::{PickInfo, PickMode};
pub use picker::{DeckPicker, PickRequest, PickResult, pickable_layers};

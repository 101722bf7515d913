//! Layers and the manager that diffs them across frames.
//!
//! A layer descriptor is cheap and recreated by the application whenever its props
//! change. The [`LayerManager`] matches descriptors to living layers by id and hands each
//! new descriptor the [`LayerState`] of its predecessor.

pub mod context;
pub mod manager;
pub mod props;
pub mod state;

pub use context::{DrawContext, LayerContext, PickingContext};
pub use manager::{LayerKey, LayerManager, LayerRef};
pub use props::{LayerCallback, LayerProps};
pub use state::LayerState;

use crate::attributes::AttributeError;
use crate::picking::{PickInfo, PickMode};
use crate::transitions::TransitionError;
use bitflags::bitflags;
use snafu::Snafu;
use std::any::Any;

pub type Result<T, E = LayerError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum LayerError {
    #[snafu(display("Layer {layer} has an invalid transition: {source}"))]
    Transition {
        layer: String,
        source: TransitionError,
    },

    #[snafu(display("Layer {layer} failed to set an attribute: {source}"))]
    Attribute {
        layer: String,
        source: AttributeError,
    },

    #[snafu(display("Layer {layer} failed to update: {message}"))]
    Update { layer: String, message: String },
}

bitflags! {
    /// What changed for a layer since its last update.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u32 {
        const DATA_CHANGED = 1 << 0;
        const PROPS_CHANGED = 1 << 1;
        const UPDATE_TRIGGERS_CHANGED = 1 << 2;
        const VIEWPORT_CHANGED = 1 << 3;
        /// The layer asked for an update outside of any prop change.
        const STATE_CHANGED = 1 << 4;
    }
}

/// A data to geometry binding drawn by the deck.
///
/// Implementors only need to provide their props and name. Everything else has a
/// default that does nothing.
pub trait Layer: Any {
    fn props(&self) -> &LayerProps;

    /// Type name, used to tell apart layers that reuse an id.
    fn layer_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn id(&self) -> &str {
        &self.props().id
    }

    /// Composite layers render sublayers instead of drawing themselves.
    fn is_composite(&self) -> bool {
        false
    }

    /// What changed from `old`, the previous descriptor with the same id.
    ///
    /// Layers with data add [`ChangeFlags::DATA_CHANGED`] here.
    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        self.props().diff(old.props())
    }

    fn should_update_state(&self, changes: ChangeFlags) -> bool {
        changes.intersects(!ChangeFlags::VIEWPORT_CHANGED)
    }

    fn initialize_state(&mut self, _state: &mut LayerState, _context: &LayerContext) -> Result<()> {
        Ok(())
    }

    fn update_state(
        &mut self,
        _state: &mut LayerState,
        _context: &LayerContext,
        _changes: ChangeFlags,
    ) -> Result<()> {
        Ok(())
    }

    fn finalize_state(&mut self, _state: &mut LayerState) {}

    /// Whether work arrived outside of prop changes, e.g. from a loader thread.
    fn has_pending_updates(&self, state: &LayerState) -> bool {
        state.needs_update()
    }

    /// Instance count handed to the attribute manager after each update.
    fn num_instances(&self, state: &LayerState) -> usize {
        state
            .attribute_manager
            .attributes()
            .map(|attribute| attribute.num_instances())
            .max()
            .unwrap_or(0)
    }

    fn render_layers(&self, _state: &LayerState, _context: &LayerContext) -> Vec<Box<dyn Layer>> {
        Vec::new()
    }

    fn draw(&self, _state: &LayerState, _context: &mut DrawContext) {}

    fn draw_picking(&self, _state: &LayerState, _context: &mut PickingContext) {}

    /// Refines the info of a hit on this layer or one of its sublayers.
    fn get_picking_info(&self, _state: &LayerState, info: PickInfo, _mode: PickMode) -> PickInfo {
        info
    }
}

pub fn downcast_layer<T: Layer>(layer: &dyn Layer) -> Option<&T> {
    layer.as_any().downcast_ref()
}

use glamx::Vec2;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use strata_render::PickingColor;

/// Why a pick was made. Layers may shape their picking info differently per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickMode {
    Hover,
    Click,
    Query,
}

/// Result of a hit test.
#[derive(Clone, Default)]
pub struct PickInfo {
    /// The top level layer the hit belongs to.
    pub layer_id: Option<String>,
    /// The layer that drew the hit pixel. Differs from `layer_id` for sublayers.
    pub source_layer_id: Option<String>,
    /// Picked object index within the source layer.
    pub index: Option<u32>,
    pub color: Option<PickingColor>,
    pub x: f32,
    pub y: f32,
    pub viewport_id: Option<String>,
    /// The picked position in world coordinates.
    pub coordinate: Option<Vec2>,
    pub picked: bool,
    /// Payload attached by the layer.
    pub object: Option<Rc<dyn Any>>,
}

impl PickInfo {
    pub fn empty(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn object<T: Any>(&self) -> Option<&T> {
        self.object.as_ref()?.downcast_ref()
    }
}

impl Debug for PickInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickInfo")
            .field("layer_id", &self.layer_id)
            .field("source_layer_id", &self.source_layer_id)
            .field("index", &self.index)
            .field("color", &self.color)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("viewport_id", &self.viewport_id)
            .field("coordinate", &self.coordinate)
            .field("picked", &self.picked)
            .field("object", &self.object.is_some())
            .finish()
    }
}

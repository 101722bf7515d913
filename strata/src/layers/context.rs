use crate::views::Viewport;
use glamx::Vec2;
use strata_render::picking::picking_color;
use strata_render::{GpuContext, PickingColor, PickingFramebuffer};
use strata_utils::ScreenRect;
use web_time::Duration;

/// Shared state every layer sees while updating.
#[derive(Debug, Clone)]
pub struct LayerContext {
    pub gpu: GpuContext,
    /// The viewport last activated for drawing.
    pub viewport: Viewport,
    /// Timeline time of the current frame.
    pub time: Duration,
    pub frame_number: u64,
    pub mouse_position: Option<Vec2>,
}

impl LayerContext {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            gpu,
            viewport: Viewport::default(),
            time: Duration::ZERO,
            frame_number: 0,
            mouse_position: None,
        }
    }
}

/// Passed to [`Layer::draw`](crate::layers::Layer::draw).
pub struct DrawContext<'a> {
    pub gpu: &'a GpuContext,
    pub viewport: &'a Viewport,
    pub pass: &'a str,
    /// Position of the layer in this pass.
    pub layer_index: usize,
}

/// Passed to [`Layer::draw_picking`](crate::layers::Layer::draw_picking).
///
/// Shapes drawn here are tagged with the picking color of `(layer_index, object)`.
pub struct PickingContext<'a> {
    pub framebuffer: &'a mut PickingFramebuffer,
    pub viewport: &'a Viewport,
    pub layer_index: usize,
}

impl PickingContext<'_> {
    pub fn picking_color(&self, object: u32) -> PickingColor {
        picking_color(self.layer_index, object)
    }

    /// Draws a disc of `radius` pixels around a world position.
    pub fn fill_circle(&mut self, world: Vec2, radius: f32, depth: f32, object: u32) {
        let color = self.picking_color(object);
        let center = self.viewport.project(world);
        self.framebuffer
            .fill_circle(center.x, center.y, radius, depth, color);
    }

    /// Fills a rectangle given in world coordinates.
    pub fn fill_rect(&mut self, min: Vec2, max: Vec2, depth: f32, object: u32) {
        let color = self.picking_color(object);
        let a = self.viewport.project(min);
        let b = self.viewport.project(max);
        let top_left = a.min(b);
        let size = (a - b).abs();
        self.framebuffer.fill_rect(
            ScreenRect::new(top_left.x, top_left.y, size.x, size.y),
            depth,
            color,
        );
    }
}

//! Draws the visible layers of every viewport.
//!
//! The [`DeckRenderer`] walks the viewports the view manager hands out, activates each one
//! on the layer manager and draws every visible, non composite layer that passes the
//! layer filter. Effects wrap the whole pass.

use crate::effects::{EffectContext, EffectManager};
use crate::layers::{DrawContext, Layer, LayerManager, PickingContext};
use crate::picking::pickable_layers;
use crate::views::Viewport;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use strata_render::{GpuContext, PickingFramebuffer};
use strata_utils::{DeckArgs, RedrawFlag, RedrawReason};
use tracing::{instrument, trace};

pub const SCREEN_PASS: &str = "screen";
pub const PICKING_PASS: &str = "picking";

/// What a layer filter is asked about.
pub struct LayerFilterArgs<'a> {
    pub layer: &'a dyn Layer,
    pub viewport: &'a Viewport,
    pub is_picking: bool,
    pub render_pass: &'a str,
}

/// Decides per layer and viewport whether the layer takes part in a pass.
pub type LayerFilter = Rc<dyn Fn(&LayerFilterArgs) -> bool>;

pub(crate) fn passes_filter(filter: Option<&LayerFilter>, args: &LayerFilterArgs) -> bool {
    filter.is_none_or(|filter| filter(args))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub viewports: usize,
    pub layers_drawn: usize,
    pub layers_skipped: usize,
}

pub struct DeckRenderer {
    gpu: GpuContext,
    layer_filter: Option<LayerFilter>,
    draw_picking_colors: bool,
    picking_colors: PickingFramebuffer,
    needs_redraw: RedrawFlag,
    last_stats: RenderStats,
}

impl DeckRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            gpu,
            layer_filter: None,
            draw_picking_colors: DeckArgs::get().draw_picking_colors,
            picking_colors: PickingFramebuffer::new(1, 1),
            needs_redraw: RedrawFlag::default(),
            last_stats: RenderStats::default(),
        }
    }

    pub fn set_layer_filter(&mut self, layer_filter: Option<LayerFilter>) {
        let same = match (&self.layer_filter, &layer_filter) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.layer_filter = layer_filter;
            self.needs_redraw.mark("Layer filter changed");
        }
    }

    pub fn layer_filter(&self) -> Option<&LayerFilter> {
        self.layer_filter.as_ref()
    }

    /// Renders the picking pass to an inspectable framebuffer next to the screen pass.
    pub fn set_draw_picking_colors(&mut self, draw_picking_colors: bool) {
        if self.draw_picking_colors != draw_picking_colors {
            self.draw_picking_colors = draw_picking_colors;
            self.needs_redraw.mark("Picking colors toggled");
        }
    }

    /// The debug picking image of the last frame, if enabled.
    pub fn picking_colors(&self) -> Option<&PickingFramebuffer> {
        self.draw_picking_colors.then_some(&self.picking_colors)
    }

    pub fn last_stats(&self) -> RenderStats {
        self.last_stats
    }

    #[instrument(skip_all)]
    #[profiling::function]
    pub fn render_layers(
        &mut self,
        layers: &mut LayerManager,
        effects: &mut EffectManager,
        viewports: &[&Viewport],
        canvas_size: (u32, u32),
        pass: &str,
    ) -> RenderStats {
        let gpu = self.gpu.clone();
        let frame_number = layers.context().frame_number;
        let effect_context = EffectContext {
            gpu: &gpu,
            pass,
            frame_number,
        };
        effects.pre_render(&effect_context);

        let mut stats = RenderStats::default();
        if self.draw_picking_colors {
            self.picking_colors.resize(canvas_size.0.max(1), canvas_size.1.max(1));
            self.picking_colors.clear();
        }

        for viewport in viewports {
            layers.activate_viewport(viewport);
            stats.viewports += 1;

            for (layer_index, layer) in layers.get_layers(None).into_iter().enumerate() {
                let args = LayerFilterArgs {
                    layer: layer.layer,
                    viewport,
                    is_picking: false,
                    render_pass: pass,
                };
                if !layer.visible
                    || layer.layer.is_composite()
                    || !passes_filter(self.layer_filter.as_ref(), &args)
                {
                    stats.layers_skipped += 1;
                    continue;
                }

                let mut context = DrawContext {
                    gpu: &gpu,
                    viewport,
                    pass,
                    layer_index,
                };
                layer.layer.draw(layer.state, &mut context);
                stats.layers_drawn += 1;
            }

            if self.draw_picking_colors {
                self.draw_picking_colors_for(layers, viewport);
            }
        }

        effects.post_render(&effect_context);
        trace!("Rendered {stats:?}");
        self.last_stats = stats;
        stats
    }

    fn draw_picking_colors_for(&mut self, layers: &LayerManager, viewport: &Viewport) {
        self.picking_colors.set_scissor(None);
        let pickable = pickable_layers(layers, None, viewport, self.layer_filter.as_ref());
        for (layer_index, layer) in pickable.into_iter().enumerate() {
            let mut context = PickingContext {
                framebuffer: &mut self.picking_colors,
                viewport,
                layer_index,
            };
            layer.layer.draw_picking(layer.state, &mut context);
        }
    }

    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        self.needs_redraw.check(clear)
    }
}

impl Debug for DeckRenderer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckRenderer")
            .field("layer_filter", &self.layer_filter.is_some())
            .field("draw_picking_colors", &self.draw_picking_colors)
            .field("last_stats", &self.last_stats)
            .finish()
    }
}

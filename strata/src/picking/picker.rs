use crate::layers::{LayerManager, LayerRef, PickingContext};
use crate::picking::{PickInfo, PickMode};
use crate::renderer::{LayerFilter, LayerFilterArgs, PICKING_PASS, passes_filter};
use crate::views::{ViewManager, Viewport};
use bon::Builder;
use glamx::Vec2;
use itertools::Itertools;
use strata_render::picking::MAX_PICKABLE_LAYERS;
use strata_render::{PickedColor, PickingFramebuffer, PixelRect};
use strata_utils::{DeckArgs, ScreenRect};
use tracing::{instrument, trace, warn};

/// A point query.
#[derive(Debug, Clone, Builder)]
pub struct PickRequest {
    pub x: f32,
    pub y: f32,
    /// Pixels around the point that still count as a hit.
    #[builder(default = DeckArgs::default_picking_radius() as f32)]
    pub radius: f32,
    /// How many overlapping objects to return.
    #[builder(default = 1)]
    pub depth: usize,
    /// Only layers whose id starts with one of these are picked.
    pub layer_ids: Option<Vec<String>>,
    #[builder(default = PickMode::Query)]
    pub mode: PickMode,
}

#[derive(Debug, Clone, Default)]
pub struct PickResult {
    /// Hits ordered front to back, plus hover exit infos.
    pub result: Vec<PickInfo>,
    /// Info for the root handlers when nothing was hit.
    pub empty_info: PickInfo,
}

impl PickResult {
    pub fn first_picked(&self) -> Option<&PickInfo> {
        self.result.iter().find(|info| info.picked)
    }
}

/// Layers drawn into a picking pass of `viewport`, in picking index order.
pub fn pickable_layers<'a>(
    layers: &'a LayerManager,
    layer_ids: Option<&[String]>,
    viewport: &Viewport,
    filter: Option<&LayerFilter>,
) -> Vec<LayerRef<'a>> {
    let mut pickable: Vec<LayerRef<'a>> = layers
        .get_layers(layer_ids)
        .into_iter()
        .filter(|layer| {
            let args = LayerFilterArgs {
                layer: layer.layer,
                viewport,
                is_picking: true,
                render_pass: PICKING_PASS,
            };
            layer.visible
                && layer.layer.props().pickable
                && !layer.layer.is_composite()
                && passes_filter(filter, &args)
        })
        .collect();

    if pickable.len() > MAX_PICKABLE_LAYERS {
        warn!(
            "{} pickable layers, only the first {MAX_PICKABLE_LAYERS} can be picked",
            pickable.len()
        );
        pickable.truncate(MAX_PICKABLE_LAYERS);
    }
    pickable
}

/// Runs picking passes against the layers of a deck.
///
/// The framebuffer is kept at canvas size. Each pass draws the pickable layers of every
/// viewport touching the query rectangle, restricted to that rectangle by a scissor.
#[derive(Debug)]
pub struct DeckPicker {
    framebuffer: PickingFramebuffer,
    last_hovered_layer: Option<String>,
}

impl Default for DeckPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckPicker {
    pub fn new() -> Self {
        Self {
            framebuffer: PickingFramebuffer::new(1, 1),
            last_hovered_layer: None,
        }
    }

    pub fn framebuffer(&self) -> &PickingFramebuffer {
        &self.framebuffer
    }

    /// Picks the objects under a point, nearest to the point first.
    ///
    /// With `depth > 1` every further pass excludes the objects found so far, so objects
    /// hidden behind each other are returned front to back. Hover picks additionally
    /// report a hover exit for the layer that was hovered before.
    #[instrument(skip_all)]
    #[profiling::function]
    pub fn pick_object(
        &mut self,
        layers: &LayerManager,
        views: &ViewManager,
        filter: Option<&LayerFilter>,
        request: &PickRequest,
    ) -> PickResult {
        let (width, height) = views.size();
        let empty = PickResult {
            result: Vec::new(),
            empty_info: PickInfo::empty(request.x, request.y),
        };

        let inside = request.x.is_finite()
            && request.y.is_finite()
            && request.x >= 0.0
            && request.y >= 0.0
            && request.x < width as f32
            && request.y < height as f32;
        if !inside {
            trace!("Dropping pick outside the canvas at ({}, {})", request.x, request.y);
            let mut result = Vec::new();
            if request.mode == PickMode::Hover {
                self.track_hover(&mut result, request);
            }
            return PickResult { result, ..empty };
        }

        let radius = if request.radius.is_finite() {
            request.radius.max(0.0).floor()
        } else {
            0.0
        };
        let (x, y) = (request.x.floor(), request.y.floor());
        let rect = ScreenRect::around(x, y, radius);
        let Some(pixels) = PixelRect::clipped(rect, width, height) else {
            return empty;
        };

        self.framebuffer.resize(width.max(1), height.max(1));
        let mut result = Vec::new();
        for _ in 0..request.depth.max(1) {
            self.draw_pass(layers, views, filter, rect, request.layer_ids.as_deref());

            let region = self.framebuffer.read_pixels(pixels);
            let radius_sq = radius * radius;
            let nearest = region
                .drawn()
                .map(|(px, py, color)| {
                    let dx = px as f32 - x;
                    let dy = py as f32 - y;
                    (px, py, color, dx * dx + dy * dy)
                })
                .filter(|(.., distance)| *distance <= radius_sq)
                .min_by(|a, b| a.3.total_cmp(&b.3));
            let Some((px, py, color, _)) = nearest else {
                break;
            };

            self.framebuffer.exclude(color);
            let info = PickedColor::decode(color).and_then(|picked| {
                self.resolve(layers, views, filter, request, picked, Vec2::new(px as f32, py as f32))
            });
            if let Some(info) = info {
                result.push(info);
            }
        }
        self.framebuffer.clear_exclusions();
        self.framebuffer.set_scissor(None);

        if request.mode == PickMode::Hover {
            self.track_hover(&mut result, request);
        }

        PickResult {
            result,
            empty_info: empty.empty_info,
        }
    }

    /// All distinct objects inside a rectangle, in scan order.
    #[instrument(skip_all)]
    #[profiling::function]
    pub fn pick_objects(
        &mut self,
        layers: &LayerManager,
        views: &ViewManager,
        filter: Option<&LayerFilter>,
        rect: ScreenRect,
        layer_ids: Option<&[String]>,
        max_objects: Option<usize>,
    ) -> Vec<PickInfo> {
        let (width, height) = views.size();
        let Some(pixels) = PixelRect::clipped(rect, width, height) else {
            return Vec::new();
        };

        self.framebuffer.resize(width.max(1), height.max(1));
        self.draw_pass(layers, views, filter, rect, layer_ids);

        let request = PickRequest::builder()
            .x(rect.x)
            .y(rect.y)
            .mode(PickMode::Query)
            .maybe_layer_ids(layer_ids.map(<[String]>::to_vec))
            .build();

        let region = self.framebuffer.read_pixels(pixels);
        let infos = region
            .drawn()
            .unique_by(|(.., color)| *color)
            .filter_map(|(px, py, color)| {
                let picked = PickedColor::decode(color)?;
                self.resolve(layers, views, filter, &request, picked, Vec2::new(px as f32, py as f32))
            })
            .take(max_objects.unwrap_or(usize::MAX))
            .collect();
        self.framebuffer.set_scissor(None);
        infos
    }

    fn draw_pass(
        &mut self,
        layers: &LayerManager,
        views: &ViewManager,
        filter: Option<&LayerFilter>,
        rect: ScreenRect,
        layer_ids: Option<&[String]>,
    ) {
        let (width, height) = self.framebuffer.size();
        self.framebuffer.clear();

        for viewport in views.get_viewports(Some(rect)) {
            let Some(scissor) = intersection(rect, viewport.rect())
                .and_then(|area| PixelRect::clipped(area, width, height))
            else {
                continue;
            };
            self.framebuffer.set_scissor(Some(scissor));

            let pickable = pickable_layers(layers, layer_ids, viewport, filter);
            for (layer_index, layer) in pickable.into_iter().enumerate() {
                let mut context = PickingContext {
                    framebuffer: &mut self.framebuffer,
                    viewport,
                    layer_index,
                };
                layer.layer.draw_picking(layer.state, &mut context);
            }
        }
    }

    /// Turns a decoded color into a pick info, refined by the layer and its ancestors.
    fn resolve(
        &self,
        layers: &LayerManager,
        views: &ViewManager,
        filter: Option<&LayerFilter>,
        request: &PickRequest,
        picked: PickedColor,
        pixel: Vec2,
    ) -> Option<PickInfo> {
        let viewport = views.viewport_at(pixel)?;
        let pickable = pickable_layers(layers, request.layer_ids.as_deref(), viewport, filter);
        let Some(source) = pickable.get(picked.layer_index) else {
            warn!("Picked color {:?} has no layer", picked.color);
            return None;
        };

        let mut info = PickInfo {
            layer_id: None,
            source_layer_id: Some(source.id().to_string()),
            index: Some(picked.object_index),
            color: Some(picked.color),
            x: request.x,
            y: request.y,
            viewport_id: Some(viewport.id.clone()),
            coordinate: Some(viewport.unproject(Vec2::new(request.x, request.y))),
            picked: true,
            object: None,
        };
        for layer in layers.ancestors(source.key) {
            info = layer.layer.get_picking_info(layer.state, info, request.mode);
            info.layer_id = Some(layer.id().to_string());
        }
        Some(info)
    }

    fn track_hover(&mut self, result: &mut Vec<PickInfo>, request: &PickRequest) {
        let hovered = result.first().and_then(|info| info.layer_id.clone());
        if let Some(previous) = self.last_hovered_layer.take()
            && hovered.as_ref() != Some(&previous)
        {
            result.push(PickInfo {
                layer_id: Some(previous),
                ..PickInfo::empty(request.x, request.y)
            });
        }
        self.last_hovered_layer = hovered;
    }
}

fn intersection(a: ScreenRect, b: ScreenRect) -> Option<ScreenRect> {
    if !a.intersects(&b) {
        return None;
    }
    let x = a.x.max(b.x);
    let y = a.y.max(b.y);
    Some(ScreenRect::new(
        x,
        y,
        a.right().min(b.right()) - x,
        a.bottom().min(b.bottom()) - y,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_clips_to_both_rects() {
        let a = ScreenRect::new(0.0, 0.0, 10.0, 10.0);
        let b = ScreenRect::new(5.0, 8.0, 10.0, 10.0);
        assert_eq!(intersection(a, b), Some(ScreenRect::new(5.0, 8.0, 5.0, 2.0)));
        assert_eq!(intersection(a, ScreenRect::new(20.0, 0.0, 1.0, 1.0)), None);
    }

    #[test]
    fn picks_outside_the_canvas_are_dropped() {
        let layers = LayerManager::new(strata_render::GpuContext::headless());
        let views = ViewManager::new(100, 100);
        let mut picker = DeckPicker::new();

        for (x, y) in [(-1.0, 5.0), (5.0, 100.0), (f32::NAN, 5.0)] {
            let request = PickRequest::builder().x(x).y(y).build();
            let result = picker.pick_object(&layers, &views, None, &request);
            assert!(result.result.is_empty());
        }
    }
}

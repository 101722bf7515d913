//! Color encoded picking.
//!
//! Every pickable object is drawn into an offscreen [`PickingFramebuffer`] with a unique
//! color: the object index + 1 packed little endian into the RGB channels and the layer
//! index + 1 in alpha. A zero channel therefore always means "nothing was drawn here".

use std::collections::HashSet;
use strata_utils::{ScreenRect, debug_panic};

pub type PickingColor = [u8; 4];

pub const NO_PICKING_COLOR: PickingColor = [0, 0, 0, 0];
pub const MAX_PICKABLE_OBJECTS: u32 = 0x00ff_fffe;
pub const MAX_PICKABLE_LAYERS: usize = 254;

pub fn encode_picking_color(index: u32) -> [u8; 3] {
    if index > MAX_PICKABLE_OBJECTS {
        debug_panic!("Object index {index} doesn't fit into a picking color");
    }
    let value = index.saturating_add(1).min(MAX_PICKABLE_OBJECTS + 1);
    [
        (value & 0xff) as u8,
        ((value >> 8) & 0xff) as u8,
        ((value >> 16) & 0xff) as u8,
    ]
}

pub fn decode_picking_color(color: [u8; 3]) -> Option<u32> {
    let value = color[0] as u32 | (color[1] as u32) << 8 | (color[2] as u32) << 16;
    value.checked_sub(1)
}

pub fn encode_layer_index(layer: usize) -> u8 {
    if layer >= MAX_PICKABLE_LAYERS {
        debug_panic!("Layer index {layer} doesn't fit into the picking alpha channel");
    }
    (layer.min(MAX_PICKABLE_LAYERS - 1) + 1) as u8
}

pub fn decode_layer_index(alpha: u8) -> Option<usize> {
    (alpha as usize).checked_sub(1)
}

pub fn picking_color(layer: usize, object: u32) -> PickingColor {
    let [r, g, b] = encode_picking_color(object);
    [r, g, b, encode_layer_index(layer)]
}

/// The layer and object a picking color stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickedColor {
    pub layer_index: usize,
    pub object_index: u32,
    pub color: PickingColor,
}

impl PickedColor {
    pub fn decode(color: PickingColor) -> Option<Self> {
        let layer_index = decode_layer_index(color[3])?;
        let object_index = decode_picking_color([color[0], color[1], color[2]])?;
        Some(Self {
            layer_index,
            object_index,
            color,
        })
    }
}

/// Integer pixel rectangle clipped to a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Clips `rect` to a `width` x `height` target. `None` when nothing is left.
    pub fn clipped(rect: ScreenRect, width: u32, height: u32) -> Option<Self> {
        if !rect.is_finite() {
            return None;
        }
        let x0 = rect.x.floor().max(0.0);
        let y0 = rect.y.floor().max(0.0);
        let x1 = rect.right().ceil().min(width as f32);
        let y1 = rect.bottom().ceil().min(height as f32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Pixels read back from a [`PickingFramebuffer`], row major.
#[derive(Debug, Clone)]
pub struct PixelRegion {
    pub rect: PixelRect,
    pub pixels: Vec<PickingColor>,
}

impl PixelRegion {
    pub fn get(&self, x: u32, y: u32) -> PickingColor {
        if !self.rect.contains(x, y) {
            return NO_PICKING_COLOR;
        }
        let index = (y - self.rect.y) * self.rect.width + (x - self.rect.x);
        self.pixels[index as usize]
    }

    /// Every drawn pixel with its canvas coordinates.
    pub fn drawn(&self) -> impl Iterator<Item = (u32, u32, PickingColor)> + '_ {
        self.pixels.iter().enumerate().filter_map(|(i, color)| {
            if *color == NO_PICKING_COLOR {
                return None;
            }
            let i = i as u32;
            Some((
                self.rect.x + i % self.rect.width,
                self.rect.y + i / self.rect.width,
                *color,
            ))
        })
    }
}

/// Offscreen color and depth target for picking passes.
///
/// Fragments pass a less-or-equal depth test, are clipped to the scissor rectangle, and are
/// discarded when their color was excluded by an earlier pass of a multi-depth query.
#[derive(Debug)]
pub struct PickingFramebuffer {
    width: u32,
    height: u32,
    colors: Vec<PickingColor>,
    depths: Vec<f32>,
    scissor: Option<PixelRect>,
    excluded: HashSet<PickingColor>,
}

impl PickingFramebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            colors: vec![NO_PICKING_COLOR; len],
            depths: vec![f32::INFINITY; len],
            scissor: None,
            excluded: HashSet::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.size() {
            return;
        }
        let excluded = std::mem::take(&mut self.excluded);
        *self = Self::new(width, height);
        self.excluded = excluded;
    }

    pub fn clear(&mut self) {
        self.colors.fill(NO_PICKING_COLOR);
        self.depths.fill(f32::INFINITY);
    }

    pub fn set_scissor(&mut self, scissor: Option<PixelRect>) {
        self.scissor = scissor;
    }

    pub fn exclude(&mut self, color: PickingColor) {
        self.excluded.insert(color);
    }

    pub fn clear_exclusions(&mut self) {
        self.excluded.clear();
    }

    /// Writes one fragment. Returns whether it landed.
    pub fn write_fragment(&mut self, x: i64, y: i64, depth: f32, color: PickingColor) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        let (x, y) = (x as u32, y as u32);
        if self.scissor.is_some_and(|scissor| !scissor.contains(x, y)) {
            return false;
        }
        if self.excluded.contains(&color) {
            return false;
        }

        let index = (y * self.width + x) as usize;
        if depth > self.depths[index] {
            return false;
        }
        self.depths[index] = depth;
        self.colors[index] = color;
        true
    }

    /// Rasterizes a filled disc of pixel centers within `radius` of `(cx, cy)`.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, depth: f32, color: PickingColor) {
        if !(cx.is_finite() && cy.is_finite() && radius.is_finite()) || radius < 0.0 {
            return;
        }
        let x0 = (cx - radius).floor() as i64;
        let x1 = (cx + radius).ceil() as i64;
        let y0 = (cy - radius).floor() as i64;
        let y1 = (cy + radius).ceil() as i64;
        let radius_sq = radius * radius;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius_sq.max(0.5) {
                    self.write_fragment(x, y, depth, color);
                }
            }
        }
    }

    pub fn fill_rect(&mut self, rect: ScreenRect, depth: f32, color: PickingColor) {
        let Some(pixels) = PixelRect::clipped(rect, self.width, self.height) else {
            return;
        };
        for y in pixels.y..pixels.y + pixels.height {
            for x in pixels.x..pixels.x + pixels.width {
                self.write_fragment(x as i64, y as i64, depth, color);
            }
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> PickingColor {
        if x >= self.width || y >= self.height {
            return NO_PICKING_COLOR;
        }
        self.colors[(y * self.width + x) as usize]
    }

    pub fn read_pixels(&self, rect: PixelRect) -> PixelRegion {
        let mut pixels = Vec::with_capacity(rect.width as usize * rect.height as usize);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                pixels.push(self.pixel(x, y));
            }
        }
        PixelRegion { rect, pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picking_colors_skip_zero() {
        assert_eq!(encode_picking_color(0), [1, 0, 0]);
        assert_eq!(encode_picking_color(255), [0, 1, 0]);
        assert_eq!(decode_picking_color([0, 0, 0]), None);
        assert_eq!(decode_picking_color(encode_picking_color(70_000)), Some(70_000));
    }

    #[test]
    fn decodes_layer_and_object() {
        let color = picking_color(3, 41);
        let picked = PickedColor::decode(color).unwrap();
        assert_eq!(picked.layer_index, 3);
        assert_eq!(picked.object_index, 41);
        assert_eq!(PickedColor::decode(NO_PICKING_COLOR), None);
    }

    #[test]
    fn depth_test_keeps_nearest() {
        let mut fb = PickingFramebuffer::new(4, 4);
        let far = picking_color(0, 1);
        let near = picking_color(1, 2);

        assert!(fb.write_fragment(1, 1, 0.8, far));
        assert!(fb.write_fragment(1, 1, 0.2, near));
        assert!(!fb.write_fragment(1, 1, 0.5, far));
        assert_eq!(fb.pixel(1, 1), near);
    }

    #[test]
    fn scissor_and_exclusion_discard_fragments() {
        let mut fb = PickingFramebuffer::new(8, 8);
        let color = picking_color(0, 0);
        fb.set_scissor(PixelRect::clipped(ScreenRect::new(2.0, 2.0, 2.0, 2.0), 8, 8));
        assert!(!fb.write_fragment(0, 0, 0.0, color));
        assert!(fb.write_fragment(3, 3, 0.0, color));

        fb.exclude(color);
        fb.clear();
        assert!(!fb.write_fragment(3, 3, 0.0, color));
    }

    #[test]
    fn clipping_rejects_offscreen_rects() {
        assert_eq!(
            PixelRect::clipped(ScreenRect::new(-5.0, -5.0, 2.0, 2.0), 10, 10),
            None
        );
        assert_eq!(
            PixelRect::clipped(ScreenRect::new(8.0, 8.0, 5.0, 5.0), 10, 10),
            Some(PixelRect {
                x: 8,
                y: 8,
                width: 2,
                height: 2
            })
        );
    }

    #[test]
    fn region_lists_drawn_pixels() {
        let mut fb = PickingFramebuffer::new(6, 6);
        fb.fill_circle(3.0, 3.0, 1.0, 0.0, picking_color(0, 7));
        let region = fb.read_pixels(PixelRect {
            x: 0,
            y: 0,
            width: 6,
            height: 6,
        });
        let drawn: Vec<_> = region.drawn().collect();
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|(_, _, c)| *c == picking_color(0, 7)));
        assert_eq!(region.get(2, 2), picking_color(0, 7));
    }
}

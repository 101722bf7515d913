use glamx::Vec2;
use strata_utils::ScreenRect;

/// Camera of an orthographic 2D view: the world point in the center and a log2 zoom.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewState {
    pub target: Vec2,
    pub zoom: f32,
}

impl ViewState {
    pub fn new(target: Vec2, zoom: f32) -> Self {
        Self { target, zoom }
    }

    pub fn lerp(&self, other: &ViewState, t: f32) -> ViewState {
        ViewState {
            target: self.target.lerp(other.target, t),
            zoom: self.zoom + (other.zoom - self.zoom) * t,
        }
    }
}

/// A view resolved against the canvas: its pixel rectangle and camera.
///
/// Screen coordinates grow right and down from the top left corner of the canvas, world
/// coordinates share the orientation. One world unit spans `2^zoom` pixels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Viewport {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub view_state: ViewState,
}

impl Viewport {
    pub fn new(id: impl Into<String>, rect: ScreenRect, view_state: ViewState) -> Self {
        Self {
            id: id.into(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            view_state,
        }
    }

    pub fn rect(&self) -> ScreenRect {
        ScreenRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn scale(&self) -> f32 {
        self.view_state.zoom.exp2()
    }

    pub fn center(&self) -> Vec2 {
        self.rect().center()
    }

    pub fn project(&self, world: Vec2) -> Vec2 {
        self.center() + (world - self.view_state.target) * self.scale()
    }

    pub fn unproject(&self, screen: Vec2) -> Vec2 {
        self.view_state.target + (screen - self.center()) / self.scale()
    }

    /// Whether any part of `rect` overlaps this viewport.
    pub fn contains_pixel(&self, rect: &ScreenRect) -> bool {
        self.rect().intersects(rect)
    }
}

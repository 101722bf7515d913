use glamx::Vec2;

/// Axis aligned rectangle in canvas pixels, origin at the top left corner.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A one pixel rectangle around a point.
    pub fn point(x: f32, y: f32) -> Self {
        Self::new(x, y, 1.0, 1.0)
    }

    /// The square of pixels within `radius` of a point.
    pub fn around(x: f32, y: f32, radius: f32) -> Self {
        let radius = radius.max(0.0);
        Self::new(x - radius, y - radius, radius * 2.0 + 1.0, radius * 2.0 + 1.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn intersects(&self, other: &ScreenRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

use crate::views::viewport::{ViewState, Viewport};
use bon::Builder;
use std::collections::BTreeMap;
use strata_utils::ScreenRect;

/// A position or length either in pixels or relative to the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extent {
    Pixels(f32),
    Percent(f32),
}

impl Default for Extent {
    fn default() -> Self {
        Extent::Pixels(0.0)
    }
}

impl Extent {
    pub fn resolve(&self, total: f32) -> f32 {
        match self {
            Extent::Pixels(pixels) => *pixels,
            Extent::Percent(percent) => total * percent / 100.0,
        }
    }
}

/// Where a camera is placed on the canvas.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct View {
    #[builder(into)]
    pub id: String,
    #[builder(default)]
    pub x: Extent,
    #[builder(default)]
    pub y: Extent,
    #[builder(default = Extent::Percent(100.0))]
    pub width: Extent,
    #[builder(default = Extent::Percent(100.0))]
    pub height: Extent,
    /// Which view state drives this view. Defaults to the view id.
    #[builder(into)]
    pub view_state_id: Option<String>,
    /// Whether input may move this view.
    #[builder(default)]
    pub controller: bool,
}

impl View {
    pub fn view_state_id(&self) -> &str {
        self.view_state_id.as_deref().unwrap_or(&self.id)
    }

    pub fn rect(&self, width: f32, height: f32) -> ScreenRect {
        ScreenRect::new(
            self.x.resolve(width),
            self.y.resolve(height),
            self.width.resolve(width),
            self.height.resolve(height),
        )
    }

    pub fn make_viewport(&self, width: f32, height: f32, view_state: ViewState) -> Viewport {
        Viewport::new(self.id.clone(), self.rect(width, height), view_state)
    }
}

/// View states by view state id, with an optional state shared by every other view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewStates {
    shared: Option<ViewState>,
    per_view: BTreeMap<String, ViewState>,
}

impl ViewStates {
    pub fn shared(view_state: ViewState) -> Self {
        Self {
            shared: Some(view_state),
            per_view: BTreeMap::new(),
        }
    }

    pub fn with(mut self, id: impl Into<String>, view_state: ViewState) -> Self {
        self.per_view.insert(id.into(), view_state);
        self
    }

    pub fn get(&self, id: &str) -> ViewState {
        self.per_view
            .get(id)
            .copied()
            .or(self.shared)
            .unwrap_or_default()
    }

    pub fn set(&mut self, id: impl Into<String>, view_state: ViewState) {
        self.per_view.insert(id.into(), view_state);
    }
}

impl From<ViewState> for ViewStates {
    fn from(view_state: ViewState) -> Self {
        ViewStates::shared(view_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glamx::Vec2;

    #[test]
    fn resolves_percent_placement() {
        let view = View::builder()
            .id("minimap")
            .x(Extent::Percent(75.0))
            .width(Extent::Percent(25.0))
            .height(Extent::Pixels(100.0))
            .build();

        assert_eq!(
            view.rect(800.0, 600.0),
            ScreenRect::new(600.0, 0.0, 200.0, 100.0)
        );
        assert_eq!(view.view_state_id(), "minimap");
    }

    #[test]
    fn per_view_states_override_shared() {
        let shared = ViewState::new(Vec2::ZERO, 1.0);
        let minimap = ViewState::new(Vec2::ONE, -2.0);
        let states = ViewStates::shared(shared).with("minimap", minimap);

        assert_eq!(states.get("main"), shared);
        assert_eq!(states.get("minimap"), minimap);
        assert_eq!(ViewStates::default().get("main"), ViewState::default());
    }
}

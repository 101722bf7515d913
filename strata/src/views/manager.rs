use crate::transitions::{InterpolationSettings, TransitionTiming};
use crate::views::view::{View, ViewStates};
use crate::views::viewport::{ViewState, Viewport};
use glamx::Vec2;
use std::collections::BTreeMap;
use strata_utils::{RedrawFlag, RedrawReason, ScreenRect};
use tracing::{debug, trace};
use web_time::Duration;

pub const DEFAULT_VIEW_ID: &str = "default-view";

struct ViewStateTransition {
    from: ViewState,
    to: ViewState,
    timing: TransitionTiming,
}

/// Resolves views and view states into viewports.
///
/// Viewports are rebuilt whenever views, view states or the canvas size change, and
/// every rebuild that changes them marks a redraw.
pub struct ViewManager {
    views: Vec<View>,
    width: u32,
    height: u32,
    view_states: ViewStates,
    viewports: Vec<Viewport>,
    transitions: BTreeMap<String, ViewStateTransition>,
    needs_redraw: RedrawFlag,
}

impl ViewManager {
    pub fn new(width: u32, height: u32) -> Self {
        let mut manager = Self {
            views: vec![View::builder().id(DEFAULT_VIEW_ID).build()],
            width,
            height,
            view_states: ViewStates::default(),
            viewports: Vec::new(),
            transitions: BTreeMap::new(),
            needs_redraw: RedrawFlag::marked("Initial render"),
        };
        manager.rebuild_viewports();
        manager
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_views(&mut self, views: Vec<View>) {
        let views = if views.is_empty() {
            vec![View::builder().id(DEFAULT_VIEW_ID).build()]
        } else {
            views
        };
        if views == self.views {
            return;
        }
        debug!("Views changed to {:?}", views.iter().map(|v| &v.id).collect::<Vec<_>>());
        self.views = views;
        self.rebuild_viewports();
    }

    pub fn set_view_states(&mut self, view_states: ViewStates) {
        if view_states == self.view_states {
            return;
        }
        self.view_states = view_states;
        self.rebuild_viewports();
    }

    pub fn set_view_state(&mut self, view_state_id: &str, view_state: ViewState) {
        if self.view_states.get(view_state_id) == view_state {
            return;
        }
        self.view_states.set(view_state_id, view_state);
        self.rebuild_viewports();
    }

    pub fn view_states(&self) -> &ViewStates {
        &self.view_states
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.rebuild_viewports();
    }

    pub fn get_view_state(&self, view_state_id: &str) -> ViewState {
        self.view_states.get(view_state_id)
    }

    /// Viewports overlapping `rect`, or all of them.
    pub fn get_viewports(&self, rect: Option<ScreenRect>) -> Vec<&Viewport> {
        match rect {
            Some(rect) => self
                .viewports
                .iter()
                .filter(|viewport| viewport.contains_pixel(&rect))
                .collect(),
            None => self.viewports.iter().collect(),
        }
    }

    pub fn get_viewport(&self, id: &str) -> Option<&Viewport> {
        self.viewports.iter().find(|viewport| viewport.id == id)
    }

    /// The topmost viewport under a canvas position.
    pub fn viewport_at(&self, point: Vec2) -> Option<&Viewport> {
        self.viewports
            .iter()
            .rev()
            .find(|viewport| viewport.rect().contains(point))
    }

    pub fn unproject(&self, point: Vec2) -> Option<Vec2> {
        Some(self.viewport_at(point)?.unproject(point))
    }

    /// Animates a view state towards `to`. Progress is reported by
    /// [`ViewManager::update_view_states`].
    pub fn transition_view_state(
        &mut self,
        view_state_id: &str,
        to: ViewState,
        settings: InterpolationSettings,
    ) {
        let from = self.get_view_state(view_state_id);
        let mut timing = TransitionTiming::default();
        timing.start(settings.duration, settings.easing);
        self.transitions
            .insert(view_state_id.to_string(), ViewStateTransition { from, to, timing });
    }

    pub fn is_transitioning(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Advances view state transitions and returns the new states by view state id.
    ///
    /// The states are not applied here: whoever owns the view state decides.
    pub fn update_view_states(&mut self, now: Duration) -> Vec<(String, ViewState)> {
        let mut changes = Vec::new();
        self.transitions.retain(|id, transition| {
            if let Some(t) = transition.timing.tick(now) {
                changes.push((id.clone(), transition.from.lerp(&transition.to, t)));
            }
            transition.timing.is_in_progress()
        });
        if !changes.is_empty() {
            trace!("{} view states transitioning", changes.len());
        }
        changes
    }

    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        self.needs_redraw.check(clear)
    }

    pub fn finalize(&mut self) {
        self.transitions.clear();
        self.viewports.clear();
    }

    fn rebuild_viewports(&mut self) {
        let (width, height) = (self.width as f32, self.height as f32);
        let viewports: Vec<Viewport> = self
            .views
            .iter()
            .map(|view| {
                let view_state = self.view_states.get(view.view_state_id());
                view.make_viewport(width, height, view_state)
            })
            .collect();

        if viewports != self.viewports {
            self.viewports = viewports;
            self.needs_redraw.mark("Viewport changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::view::Extent;

    fn split_manager() -> ViewManager {
        let mut manager = ViewManager::new(200, 100);
        manager.set_views(vec![
            View::builder()
                .id("left")
                .width(Extent::Percent(50.0))
                .build(),
            View::builder()
                .id("right")
                .x(Extent::Percent(50.0))
                .width(Extent::Percent(50.0))
                .build(),
        ]);
        manager
    }

    #[test]
    fn filters_viewports_by_rect() {
        let manager = split_manager();
        assert_eq!(manager.get_viewports(None).len(), 2);

        let hits = manager.get_viewports(Some(ScreenRect::point(150.0, 10.0)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "right");

        let both = manager.get_viewports(Some(ScreenRect::around(100.0, 10.0, 2.0)));
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn only_real_changes_mark_redraw() {
        let mut manager = split_manager();
        assert!(manager.needs_redraw(true).is_some());

        manager.set_size(200, 100);
        manager.set_view_state("left", ViewState::default());
        assert!(manager.needs_redraw(true).is_none());

        manager.set_view_state("left", ViewState::new(Vec2::ONE, 0.0));
        assert!(manager.needs_redraw(true).is_some());
    }

    #[test]
    fn view_state_transition_reports_progress() {
        let mut manager = ViewManager::new(100, 100);
        let to = ViewState::new(Vec2::new(10.0, 0.0), 0.0);
        manager.transition_view_state(
            DEFAULT_VIEW_ID,
            to,
            InterpolationSettings::builder()
                .duration(Duration::from_millis(100))
                .build(),
        );

        assert_eq!(
            manager.update_view_states(Duration::ZERO),
            vec![(DEFAULT_VIEW_ID.to_string(), ViewState::default())]
        );
        let halfway = manager.update_view_states(Duration::from_millis(50));
        assert_eq!(halfway[0].1.target, Vec2::new(5.0, 0.0));

        let done = manager.update_view_states(Duration::from_millis(100));
        assert_eq!(done[0].1, to);
        assert!(!manager.is_transitioning());
        assert!(manager.update_view_states(Duration::from_millis(150)).is_empty());
    }
}

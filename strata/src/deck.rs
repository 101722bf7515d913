//! The top level object tying views, layers, effects, rendering and picking together.
//!
//! A [`Deck`] is driven by the host calling [`Deck::animation_frame`] once per display
//! frame. The GPU context is created on the first frame, after which every manager is
//! constructed. Pointer input is queued and serviced on the next frame.

use crate::animation_loop::{AnimationLoop, ContextSource};
use crate::effects::{Effect, EffectManager};
use crate::layers::{Layer, LayerError, LayerManager};
use crate::picking::{DeckPicker, PickInfo, PickMode, PickRequest, PickResult};
use crate::renderer::{DeckRenderer, LayerFilter, RenderStats, SCREEN_PASS};
use crate::timeline::Timeline;
use crate::transitions::InterpolationSettings;
use crate::views::{View, ViewManager, ViewState, ViewStates};
use bon::Builder;
use glamx::Vec2;
use snafu::{ResultExt, Snafu};
use std::fmt::{Debug, Formatter};
use strata_render::GpuContext;
use strata_utils::{DeckArgs, RedrawFlag, RedrawReason, ScreenRect};
use tracing::{debug, error, info, instrument, trace, warn};
use web_time::Duration;

pub type Result<T, E = DeckError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum DeckError {
    #[snafu(display("Failed to update layers: {source}"))]
    Layers { source: LayerError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    ContextReady,
    Running,
    Finalized,
}

/// Pointer state the cursor and view state callbacks are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub is_dragging: bool,
    pub is_hovering: bool,
    pub in_transition: bool,
}

#[derive(Debug, Clone)]
pub struct ViewStateChange {
    pub view_state_id: String,
    pub view_state: ViewState,
    pub interaction: InteractionState,
}

pub type PickCallback = Box<dyn FnMut(&PickInfo)>;
pub type RenderCallback = Box<dyn FnMut(&RenderStats)>;

/// Construction options of a [`Deck`].
#[derive(Builder)]
pub struct DeckProps {
    #[builder(default = 800)]
    pub width: u32,
    #[builder(default = 600)]
    pub height: u32,
    #[builder(default)]
    pub layers: Vec<Box<dyn Layer>>,
    #[builder(default)]
    pub effects: Vec<Box<dyn Effect>>,
    #[builder(default)]
    pub views: Vec<View>,
    /// Controlled view states. The application applies every change itself.
    pub view_state: Option<ViewStates>,
    /// Starting view states when the deck keeps track of them.
    pub initial_view_state: Option<ViewStates>,
    pub layer_filter: Option<LayerFilter>,
    #[builder(default = DeckArgs::default_picking_radius())]
    pub picking_radius: u32,
    #[builder(default = DeckArgs::get().animate)]
    pub animate: bool,
    #[builder(default = DeckArgs::get().draw_picking_colors)]
    pub draw_picking_colors: bool,
    #[builder(default)]
    pub context: ContextSource,

    pub on_context_initialized: Option<Box<dyn FnMut(&GpuContext)>>,
    pub on_load: Option<Box<dyn FnMut()>>,
    pub on_resize: Option<Box<dyn FnMut(u32, u32)>>,
    pub on_view_state_change: Option<Box<dyn FnMut(&ViewStateChange)>>,
    pub on_hover: Option<PickCallback>,
    pub on_click: Option<PickCallback>,
    pub on_before_render: Option<RenderCallback>,
    pub on_after_render: Option<RenderCallback>,
}

/// A partial prop update. Unset fields keep their value.
#[derive(Default, Builder)]
pub struct DeckUpdate {
    pub layers: Option<Vec<Box<dyn Layer>>>,
    pub effects: Option<Vec<Box<dyn Effect>>>,
    pub views: Option<Vec<View>>,
    pub view_state: Option<ViewStates>,
    pub layer_filter: Option<LayerFilter>,
    pub picking_radius: Option<u32>,
    pub animate: Option<bool>,
    pub draw_picking_colors: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Default)]
struct DeckCallbacks {
    on_context_initialized: Option<Box<dyn FnMut(&GpuContext)>>,
    on_load: Option<Box<dyn FnMut()>>,
    on_resize: Option<Box<dyn FnMut(u32, u32)>>,
    on_view_state_change: Option<Box<dyn FnMut(&ViewStateChange)>>,
    on_hover: Option<PickCallback>,
    on_click: Option<PickCallback>,
    on_before_render: Option<RenderCallback>,
    on_after_render: Option<RenderCallback>,
}

struct Managers {
    views: ViewManager,
    layers: LayerManager,
    effects: EffectManager,
    renderer: DeckRenderer,
    picker: DeckPicker,
}

pub struct Deck {
    lifecycle: Lifecycle,
    animation_loop: AnimationLoop,
    timeline: Timeline,
    context: Option<GpuContext>,
    managers: Option<Managers>,
    callbacks: DeckCallbacks,

    width: u32,
    height: u32,
    views: Vec<View>,
    view_state: Option<ViewStates>,
    initial_view_state: ViewStates,
    pending_layers: Option<Vec<Box<dyn Layer>>>,
    pending_effects: Option<Vec<Box<dyn Effect>>>,
    layer_filter: Option<LayerFilter>,
    picking_radius: u32,
    animate: bool,
    draw_picking_colors: bool,

    needs_redraw: RedrawFlag,
    interaction: InteractionState,
    cursor: &'static str,
    pending_hover: Option<Vec2>,
    last_pointer_down: Option<PickResult>,
    layer_error: Option<LayerError>,
}

impl Deck {
    pub fn new(props: DeckProps) -> Self {
        let DeckProps {
            width,
            height,
            layers,
            effects,
            views,
            view_state,
            initial_view_state,
            layer_filter,
            picking_radius,
            animate,
            draw_picking_colors,
            context,
            on_context_initialized,
            on_load,
            on_resize,
            on_view_state_change,
            on_hover,
            on_click,
            on_before_render,
            on_after_render,
        } = props;

        Self {
            lifecycle: Lifecycle::Uninitialized,
            animation_loop: AnimationLoop::new(context),
            timeline: Timeline::new(),
            context: None,
            managers: None,
            callbacks: DeckCallbacks {
                on_context_initialized,
                on_load,
                on_resize,
                on_view_state_change,
                on_hover,
                on_click,
                on_before_render,
                on_after_render,
            },
            width,
            height,
            views,
            view_state,
            initial_view_state: initial_view_state.unwrap_or_default(),
            pending_layers: Some(layers),
            pending_effects: Some(effects),
            layer_filter,
            picking_radius,
            animate,
            draw_picking_colors,
            needs_redraw: RedrawFlag::marked("Deck created"),
            interaction: InteractionState::default(),
            cursor: "grab",
            pending_hover: None,
            last_pointer_down: None,
            layer_error: None,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_initialized(&self) -> bool {
        self.managers.is_some()
    }

    pub fn context(&self) -> Option<&GpuContext> {
        self.context.as_ref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub fn layer_manager(&self) -> Option<&LayerManager> {
        self.managers.as_ref().map(|m| &m.layers)
    }

    pub fn view_manager(&self) -> Option<&ViewManager> {
        self.managers.as_ref().map(|m| &m.views)
    }

    pub fn effect_manager(&self) -> Option<&EffectManager> {
        self.managers.as_ref().map(|m| &m.effects)
    }

    pub fn renderer(&self) -> Option<&DeckRenderer> {
        self.managers.as_ref().map(|m| &m.renderer)
    }

    pub fn cursor(&self) -> &'static str {
        self.cursor
    }

    pub fn interaction(&self) -> InteractionState {
        self.interaction
    }

    /// Applies a partial prop update.
    ///
    /// Layers are diffed right away once the context exists. A layer that fails to update
    /// does not stop the others; the first failure is returned.
    pub fn set_props(&mut self, update: DeckUpdate) -> Result<()> {
        if self.lifecycle == Lifecycle::Finalized {
            warn!("Props set on a finalized deck");
            return Ok(());
        }

        let DeckUpdate {
            layers,
            effects,
            views,
            view_state,
            layer_filter,
            picking_radius,
            animate,
            draw_picking_colors,
            width,
            height,
        } = update;

        if let Some(width) = width {
            self.width = width;
        }
        if let Some(height) = height {
            self.height = height;
        }
        if let Some(radius) = picking_radius {
            self.picking_radius = radius;
        }
        if let Some(animate) = animate {
            self.animate = animate;
        }
        if let Some(views) = views {
            self.views = views;
            if let Some(managers) = &mut self.managers {
                managers.views.set_views(self.views.clone());
            }
        }
        if let Some(view_state) = view_state {
            if let Some(managers) = &mut self.managers {
                managers.views.set_view_states(view_state.clone());
            }
            self.view_state = Some(view_state);
        }
        if let Some(filter) = layer_filter {
            self.layer_filter = Some(filter.clone());
            if let Some(managers) = &mut self.managers {
                managers.renderer.set_layer_filter(Some(filter));
            }
        }
        if let Some(draw_picking_colors) = draw_picking_colors {
            self.draw_picking_colors = draw_picking_colors;
            if let Some(managers) = &mut self.managers {
                managers.renderer.set_draw_picking_colors(draw_picking_colors);
            }
        }
        if let Some(effects) = effects {
            match &mut self.managers {
                Some(managers) => managers.effects.set_effects(effects),
                None => self.pending_effects = Some(effects),
            }
        }

        let Some(layers) = layers else {
            return Ok(());
        };
        match &mut self.managers {
            Some(managers) => managers.layers.set_layers(layers).context(LayersErr),
            None => {
                self.pending_layers = Some(layers);
                Ok(())
            }
        }
    }

    pub fn set_layers(&mut self, layers: Vec<Box<dyn Layer>>) -> Result<()> {
        self.set_props(DeckUpdate::builder().layers(layers).build())
    }

    /// Requests a redraw on the next frame.
    pub fn request_redraw(&mut self, reason: impl Into<RedrawReason>) {
        self.needs_redraw.mark(reason);
    }

    /// Runs one frame at `now` and returns why it was drawn, if it was.
    #[instrument(skip_all)]
    #[profiling::function]
    pub fn animation_frame(&mut self, now: Duration) -> Result<Option<RedrawReason>> {
        if self.lifecycle == Lifecycle::Finalized {
            return Ok(None);
        }

        let frame = self.animation_loop.tick(now);
        if let Some(context) = frame.new_context {
            self.set_context(context);
        }
        self.timeline.update(now);
        let time = self.timeline.time();

        self.update_canvas_size();
        self.update_cursor();

        let mut first_error = self.layer_error.take();
        if let Some(managers) = &mut self.managers
            && let Err(e) = managers.layers.update_layers(time)
        {
            error!("{e}");
            first_error.get_or_insert(e);
        }

        if let Some(position) = self.pending_hover.take() {
            self.pick_and_hover(position);
        }

        let drawn = self.redraw(None);

        let changes = match &mut self.managers {
            Some(managers) => managers.views.update_view_states(time),
            None => Vec::new(),
        };
        self.interaction.in_transition =
            self.managers.as_ref().is_some_and(|m| m.views.is_transitioning());
        for (view_state_id, view_state) in changes {
            self.apply_view_state_change(view_state_id, view_state);
        }

        match first_error {
            Some(source) => Err(DeckError::Layers { source }),
            None => Ok(drawn),
        }
    }

    /// Why the deck needs to be drawn, if it does.
    ///
    /// Every manager is asked, so with `clear` set every flag is reset even when an
    /// earlier one already answered.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        let mut reason = self.animate.then(|| RedrawReason::from("animate"));
        let own = self.needs_redraw.check(clear);
        reason = reason.or(own);

        if let Some(managers) = &mut self.managers {
            let views = managers.views.needs_redraw(clear);
            let layers = managers.layers.needs_redraw(clear);
            let effects = managers.effects.needs_redraw(clear);
            let renderer = managers.renderer.needs_redraw(clear);
            reason = reason.or(views).or(layers).or(effects).or(renderer);
        }
        reason
    }

    /// Draws if anything asked for it, or unconditionally when `force` is given.
    /// Every redraw flag is cleared either way.
    pub fn redraw(&mut self, force: Option<&'static str>) -> Option<RedrawReason> {
        let reason = self.needs_redraw(true);
        let reason = force.map(RedrawReason::from).or(reason)?;

        let managers = self.managers.as_mut()?;
        trace!("Redrawing: {reason}");

        let Managers {
            views,
            layers,
            effects,
            renderer,
            ..
        } = managers;
        if let Some(callback) = &mut self.callbacks.on_before_render {
            callback(&renderer.last_stats());
        }

        let viewports = views.get_viewports(None);
        let stats = renderer.render_layers(layers, effects, &viewports, views.size(), SCREEN_PASS);

        if let Some(callback) = &mut self.callbacks.on_after_render {
            callback(&stats);
        }
        if self.lifecycle == Lifecycle::ContextReady {
            self.lifecycle = Lifecycle::Running;
        }
        Some(reason)
    }

    /// The frontmost object under a point.
    pub fn pick_object(&mut self, request: PickRequest) -> Option<PickInfo> {
        let request = PickRequest {
            depth: 1,
            mode: PickMode::Query,
            ..request
        };
        self.pick(&request)?.first_picked().cloned()
    }

    /// Up to `request.depth` overlapping objects under a point, front to back.
    pub fn pick_multiple_objects(&mut self, request: PickRequest) -> Vec<PickInfo> {
        let request = PickRequest {
            mode: PickMode::Query,
            ..request
        };
        self.pick(&request)
            .map(|result| result.result.into_iter().filter(|info| info.picked).collect())
            .unwrap_or_default()
    }

    /// Every object inside a rectangle.
    pub fn pick_objects(
        &mut self,
        rect: ScreenRect,
        layer_ids: Option<&[String]>,
        max_objects: Option<usize>,
    ) -> Vec<PickInfo> {
        let filter = self.layer_filter.clone();
        let Some(managers) = &mut self.managers else {
            return Vec::new();
        };
        managers.picker.pick_objects(
            &managers.layers,
            &managers.views,
            filter.as_ref(),
            rect,
            layer_ids,
            max_objects,
        )
    }

    /// Queues a hover pick for the next frame. Only the latest position is kept.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() || self.interaction.is_dragging {
            return;
        }
        self.pending_hover = Some(Vec2::new(x, y));
        if let Some(managers) = &mut self.managers {
            managers.layers.set_mouse_position(Some(Vec2::new(x, y)));
        }
    }

    pub fn pointer_leave(&mut self) {
        self.pending_hover = Some(Vec2::new(-1.0, -1.0));
        if let Some(managers) = &mut self.managers {
            managers.layers.set_mouse_position(None);
        }
    }

    /// Picks right away so a following click reports what was under the pointer here.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.interaction.is_dragging = true;
        let request = self.pointer_request(x, y, PickMode::Click);
        self.last_pointer_down = self.pick(&request);
    }

    pub fn pointer_up(&mut self) {
        self.interaction.is_dragging = false;
    }

    /// Dispatches a click to the picked layer's handler, then the root handler.
    pub fn click(&mut self, x: f32, y: f32) {
        let result = match self.last_pointer_down.take() {
            Some(result) => result,
            None => {
                let request = self.pointer_request(x, y, PickMode::Click);
                match self.pick(&request) {
                    Some(result) => result,
                    None => return,
                }
            }
        };

        let info = result
            .first_picked()
            .cloned()
            .unwrap_or(result.empty_info);
        let handler = info.layer_id.as_deref().and_then(|id| {
            let layers = &self.managers.as_ref()?.layers;
            layers.layer_by_id(id)?.layer.props().on_click.clone()
        });
        let handled = handler.is_some_and(|handler| handler(&info));
        if !handled && let Some(callback) = &mut self.callbacks.on_click {
            callback(&info);
        }
    }

    /// Animates a view state. Changes are reported through `on_view_state_change`.
    pub fn transition_view_state(
        &mut self,
        view_state_id: &str,
        to: ViewState,
        settings: InterpolationSettings,
    ) {
        if let Some(managers) = &mut self.managers {
            managers.views.transition_view_state(view_state_id, to, settings);
            self.interaction.in_transition = true;
        }
    }

    /// Releases every layer, effect and GPU resource. Later calls do nothing.
    pub fn finalize(&mut self) {
        if self.lifecycle == Lifecycle::Finalized {
            return;
        }
        if let Some(mut managers) = self.managers.take() {
            managers.layers.finalize();
            managers.effects.finalize();
            managers.views.finalize();
        }
        self.pending_layers = None;
        self.pending_effects = None;
        self.context = None;
        self.lifecycle = Lifecycle::Finalized;
        info!("Deck finalized");
    }

    fn set_context(&mut self, gpu: GpuContext) {
        if self.managers.is_some() {
            warn!("Context set twice, keeping the first one");
            return;
        }
        debug!("Setting up managers on the {} backend", gpu.backend().name());

        let mut views = ViewManager::new(self.width, self.height);
        views.set_views(self.views.clone());
        views.set_view_states(
            self.view_state
                .clone()
                .unwrap_or_else(|| self.initial_view_state.clone()),
        );

        let layers = LayerManager::new(gpu.clone());

        let mut effects = EffectManager::new();
        if let Some(pending) = self.pending_effects.take() {
            effects.set_effects(pending);
        }

        let mut renderer = DeckRenderer::new(gpu.clone());
        renderer.set_layer_filter(self.layer_filter.clone());
        renderer.set_draw_picking_colors(self.draw_picking_colors);

        let picker = DeckPicker::new();

        let managers = self.managers.insert(Managers {
            views,
            layers,
            effects,
            renderer,
            picker,
        });
        if let Some(pending) = self.pending_layers.take()
            && let Err(e) = managers.layers.set_layers(pending)
        {
            self.layer_error = Some(e);
        }

        self.context = Some(gpu.clone());
        self.lifecycle = Lifecycle::ContextReady;
        if let Some(callback) = &mut self.callbacks.on_context_initialized {
            callback(&gpu);
        }
        if let Some(callback) = &mut self.callbacks.on_load {
            callback();
        }
    }

    fn update_canvas_size(&mut self) {
        let Some(managers) = &mut self.managers else {
            return;
        };
        if managers.views.size() == (self.width, self.height) {
            return;
        }
        debug!("Canvas resized to {}x{}", self.width, self.height);
        managers.views.set_size(self.width, self.height);
        if let Some(callback) = &mut self.callbacks.on_resize {
            callback(self.width, self.height);
        }
    }

    fn update_cursor(&mut self) {
        let cursor = if self.interaction.is_dragging {
            "grabbing"
        } else if self.interaction.is_hovering {
            "pointer"
        } else {
            "grab"
        };
        if cursor != self.cursor {
            trace!("Cursor changed to {cursor}");
            self.cursor = cursor;
        }
    }

    fn pointer_request(&self, x: f32, y: f32, mode: PickMode) -> PickRequest {
        PickRequest::builder()
            .x(x)
            .y(y)
            .radius(self.picking_radius as f32)
            .mode(mode)
            .build()
    }

    fn pick(&mut self, request: &PickRequest) -> Option<PickResult> {
        let managers = self.managers.as_mut()?;
        Some(managers.picker.pick_object(
            &managers.layers,
            &managers.views,
            self.layer_filter.as_ref(),
            request,
        ))
    }

    fn pick_and_hover(&mut self, position: Vec2) {
        let request = self.pointer_request(position.x, position.y, PickMode::Hover);
        let Some(result) = self.pick(&request) else {
            return;
        };
        self.interaction.is_hovering = result.first_picked().is_some();

        let mut handled = false;
        for info in &result.result {
            let handler = info.layer_id.as_deref().and_then(|id| {
                let layers = &self.managers.as_ref()?.layers;
                layers.layer_by_id(id)?.layer.props().on_hover.clone()
            });
            if let Some(handler) = handler {
                handled |= handler(info);
            }
        }

        if !handled && let Some(callback) = &mut self.callbacks.on_hover {
            let info = result.first_picked().unwrap_or(&result.empty_info);
            callback(info);
        }
    }

    fn apply_view_state_change(&mut self, view_state_id: String, view_state: ViewState) {
        let change = ViewStateChange {
            view_state_id,
            view_state,
            interaction: self.interaction,
        };
        if let Some(callback) = &mut self.callbacks.on_view_state_change {
            callback(&change);
        }
        if self.view_state.is_some() {
            return;
        }

        self.initial_view_state
            .set(change.view_state_id.clone(), change.view_state);
        if let Some(managers) = &mut self.managers {
            managers
                .views
                .set_view_state(&change.view_state_id, change.view_state);
        }
    }
}

impl Debug for Deck {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("lifecycle", &self.lifecycle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("animate", &self.animate)
            .field("interaction", &self.interaction)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Drop for Deck {
    fn drop(&mut self) {
        self.finalize();
    }
}

mod common;

use common::{DrawLog, ScatterLayer, init_tracing, ms, points};
use glamx::Vec2;
use std::cell::RefCell;
use std::rc::Rc;
use strata::animation_loop::ContextSource;
use strata::deck::InteractionState;
use strata::effects::Effect;
use strata::layers::{LayerCallback, LayerProps};
use strata::picking::PickRequest;
use strata::transitions::InterpolationSettings;
use strata::views::{ViewState, ViewStates};
use strata::{Deck, DeckProps, DeckUpdate, Lifecycle};
use strata_utils::ScreenRect;

fn scatter(id: &str, draws: &DrawLog) -> Box<dyn strata::layers::Layer> {
    let props = LayerProps::builder().id(id).pickable(true).build();
    ScatterLayer::boxed(props, points(&[(0.0, 0.0)]), 3.0, draws)
}

fn small_deck(layers: Vec<Box<dyn strata::layers::Layer>>) -> Deck {
    Deck::new(
        DeckProps::builder()
            .width(100)
            .height(100)
            .context(ContextSource::Headless)
            .layers(layers)
            .build(),
    )
}

#[test]
fn first_frame_creates_the_context_and_draws() {
    init_tracing();
    let events = Rc::new(RefCell::new(Vec::new()));
    let (on_init, on_load) = (events.clone(), events.clone());

    let mut deck = Deck::new(
        DeckProps::builder()
            .context(ContextSource::Headless)
            .on_context_initialized(Box::new(move |_| on_init.borrow_mut().push("context")))
            .on_load(Box::new(move || on_load.borrow_mut().push("load")))
            .build(),
    );
    assert_eq!(deck.lifecycle(), Lifecycle::Uninitialized);
    assert!(deck.context().is_none());

    assert!(deck.animation_frame(ms(0)).unwrap().is_some());
    assert_eq!(deck.lifecycle(), Lifecycle::Running);
    assert!(deck.is_initialized());
    assert_eq!(*events.borrow(), ["context", "load"]);

    assert_eq!(deck.animation_frame(ms(16)).unwrap(), None);
    assert_eq!(deck.animation_frame(ms(32)).unwrap(), None);
    assert_eq!(*events.borrow(), ["context", "load"]);
}

#[test]
fn layers_set_before_the_context_are_applied_on_the_first_frame() {
    let draws = DrawLog::default();
    let mut deck = small_deck(Vec::new());
    deck.set_layers(vec![scatter("points", &draws)]).unwrap();
    assert!(deck.layer_manager().is_none());

    deck.animation_frame(ms(0)).unwrap();
    assert_eq!(deck.layer_manager().unwrap().layer_count(), 1);
    assert_eq!(*draws.borrow(), ["points@default-view"]);
}

#[test]
fn render_callbacks_see_the_stats() {
    let draws = DrawLog::default();
    let after = Rc::new(RefCell::new(Vec::new()));
    let before = Rc::new(RefCell::new(0));
    let (after_log, before_count) = (after.clone(), before.clone());

    let mut deck = Deck::new(
        DeckProps::builder()
            .context(ContextSource::Headless)
            .layers(vec![scatter("a", &draws), scatter("b", &draws)])
            .on_before_render(Box::new(move |_| *before_count.borrow_mut() += 1))
            .on_after_render(Box::new(move |stats| after_log.borrow_mut().push(*stats)))
            .build(),
    );

    deck.animation_frame(ms(0)).unwrap();
    deck.animation_frame(ms(16)).unwrap();

    assert_eq!(*before.borrow(), 1);
    let after = after.borrow();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].viewports, 1);
    assert_eq!(after[0].layers_drawn, 2);
    assert_eq!(*draws.borrow(), ["a@default-view", "b@default-view"]);
}

#[test]
fn redraw_requests_and_animate_force_frames() {
    let mut deck = small_deck(Vec::new());
    deck.animation_frame(ms(0)).unwrap();
    assert_eq!(deck.animation_frame(ms(16)).unwrap(), None);

    deck.request_redraw("poke");
    let reason = deck.animation_frame(ms(32)).unwrap().unwrap();
    assert_eq!(reason.as_str(), "poke");
    assert_eq!(deck.animation_frame(ms(48)).unwrap(), None);

    deck.set_props(DeckUpdate::builder().animate(true).build()).unwrap();
    for frame in 4..8 {
        let reason = deck.animation_frame(ms(frame * 16)).unwrap().unwrap();
        assert_eq!(reason.as_str(), "animate");
    }
}

struct Outline;

impl Effect for Outline {
    fn id(&self) -> &str {
        "outline"
    }
}

#[test]
fn animated_frames_clear_every_dirty_flag() {
    let draws = DrawLog::default();
    let mut deck = small_deck(vec![scatter("points", &draws)]);
    deck.animation_frame(ms(0)).unwrap();
    deck.set_props(DeckUpdate::builder().animate(true).build()).unwrap();

    let moved = ScatterLayer::boxed(
        LayerProps::builder().id("points").pickable(true).build(),
        points(&[(5.0, 5.0)]),
        3.0,
        &draws,
    );
    deck.set_layers(vec![moved]).unwrap();
    deck.set_props(DeckUpdate::builder().width(120).build()).unwrap();
    let effects: Vec<Box<dyn Effect>> = vec![Box::new(Outline)];
    deck.set_props(DeckUpdate::builder().effects(effects).build())
        .unwrap();
    deck.request_redraw("poke");

    let reason = deck.animation_frame(ms(16)).unwrap().unwrap();
    assert_eq!(reason.as_str(), "animate");
    assert_eq!(deck.animation_frame(ms(32)).unwrap().unwrap().as_str(), "animate");

    deck.set_props(DeckUpdate::builder().animate(false).build()).unwrap();
    assert_eq!(deck.needs_redraw(false), None);
    assert_eq!(deck.animation_frame(ms(48)).unwrap(), None);
    assert_eq!(draws.borrow().len(), 3);
}

#[test]
fn picking_leaves_the_deck_clean() {
    let draws = DrawLog::default();
    let mut deck = small_deck(vec![scatter("points", &draws)]);
    deck.animation_frame(ms(0)).unwrap();
    assert_eq!(deck.needs_redraw(false), None);

    let request = PickRequest::builder().x(50.0).y(50.0).radius(2.0).build();
    assert!(deck.pick_object(request.clone()).is_some());
    assert_eq!(deck.pick_multiple_objects(request).len(), 1);
    let rect = ScreenRect::new(0.0, 0.0, 100.0, 100.0);
    assert_eq!(deck.pick_objects(rect, None, None).len(), 1);

    assert_eq!(deck.needs_redraw(false), None);
    assert_eq!(deck.animation_frame(ms(16)).unwrap(), None);
    let layers = deck.layer_manager().unwrap();
    assert_eq!(layers.layer_count(), 1);
    assert!(layers.layer_by_id("points").unwrap().visible);
    assert_eq!(draws.borrow().len(), 1);
    assert_eq!(deck.interaction(), InteractionState::default());
}

#[test]
fn forced_redraw_draws_without_changes() {
    let draws = DrawLog::default();
    let mut deck = small_deck(vec![scatter("points", &draws)]);
    deck.animation_frame(ms(0)).unwrap();
    deck.animation_frame(ms(16)).unwrap();
    assert_eq!(draws.borrow().len(), 1);

    assert_eq!(deck.redraw(None), None);
    assert_eq!(deck.redraw(Some("screenshot")).unwrap().as_str(), "screenshot");
    assert_eq!(draws.borrow().len(), 2);
}

#[test]
fn resizing_updates_the_viewports() {
    let sizes = Rc::new(RefCell::new(Vec::new()));
    let log = sizes.clone();
    let mut deck = Deck::new(
        DeckProps::builder()
            .width(100)
            .height(100)
            .context(ContextSource::Headless)
            .on_resize(Box::new(move |w, h| log.borrow_mut().push((w, h))))
            .build(),
    );
    deck.animation_frame(ms(0)).unwrap();
    assert!(sizes.borrow().is_empty());

    deck.set_props(DeckUpdate::builder().width(200).build()).unwrap();
    assert!(deck.animation_frame(ms(16)).unwrap().is_some());

    assert_eq!(*sizes.borrow(), [(200, 100)]);
    let views = deck.view_manager().unwrap();
    assert_eq!(views.size(), (200, 100));
    assert_eq!(views.get_viewport("default-view").unwrap().width, 200.0);
}

#[test]
fn view_state_transitions_are_applied_when_uncontrolled() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let log = changes.clone();
    let mut deck = Deck::new(
        DeckProps::builder()
            .context(ContextSource::Headless)
            .on_view_state_change(Box::new(move |change| {
                log.borrow_mut().push(change.view_state.target.x)
            }))
            .build(),
    );
    deck.animation_frame(ms(0)).unwrap();

    let settings = InterpolationSettings::builder().duration(ms(100)).build();
    deck.transition_view_state("default-view", ViewState::new(Vec2::new(10.0, 0.0), 0.0), settings);
    assert!(deck.interaction().in_transition);

    for now in [100, 150, 200, 250] {
        deck.animation_frame(ms(now)).unwrap();
    }

    let changes = changes.borrow();
    assert_eq!(changes.len(), 3);
    for (x, expected) in changes.iter().zip([0.0, 5.0, 10.0]) {
        assert!((x - expected).abs() < 1e-4, "{x} != {expected}");
    }
    assert!(!deck.interaction().in_transition);
    let target = deck.view_manager().unwrap().get_view_state("default-view").target;
    assert!((target - Vec2::new(10.0, 0.0)).length() < 1e-4);
}

#[test]
fn controlled_view_state_is_left_to_the_application() {
    let changes = Rc::new(RefCell::new(0));
    let count = changes.clone();
    let mut deck = Deck::new(
        DeckProps::builder()
            .context(ContextSource::Headless)
            .view_state(ViewStates::shared(ViewState::default()))
            .on_view_state_change(Box::new(move |_| *count.borrow_mut() += 1))
            .build(),
    );
    deck.animation_frame(ms(0)).unwrap();

    let settings = InterpolationSettings::builder().duration(ms(100)).build();
    deck.transition_view_state("default-view", ViewState::new(Vec2::new(10.0, 0.0), 0.0), settings);
    for now in [100, 150, 200] {
        deck.animation_frame(ms(now)).unwrap();
    }

    assert_eq!(*changes.borrow(), 3);
    let views = deck.view_manager().unwrap();
    assert_eq!(views.get_view_state("default-view"), ViewState::default());

    let moved = ViewStates::shared(ViewState::new(Vec2::new(10.0, 0.0), 0.0));
    deck.set_props(DeckUpdate::builder().view_state(moved).build()).unwrap();
    let views = deck.view_manager().unwrap();
    assert_eq!(views.get_view_state("default-view").target, Vec2::new(10.0, 0.0));
}

#[test]
fn picks_need_a_context() {
    let draws = DrawLog::default();
    let mut deck = small_deck(vec![scatter("points", &draws)]);
    let request = || PickRequest::builder().x(50.0).y(50.0).radius(0.0).build();

    assert!(deck.pick_object(request()).is_none());
    deck.animation_frame(ms(0)).unwrap();

    let info = deck.pick_object(request()).unwrap();
    assert_eq!(info.layer_id.as_deref(), Some("points"));
    assert_eq!(info.index, Some(0));
    assert_eq!(deck.pick_multiple_objects(request()).len(), 1);
}

#[test]
fn hover_goes_to_the_layer_handler_first() {
    let draws = DrawLog::default();
    let layer_hovers = Rc::new(RefCell::new(Vec::new()));
    let root_hovers = Rc::new(RefCell::new(Vec::new()));

    let layer_log = layer_hovers.clone();
    let on_hover: LayerCallback = Rc::new(move |info| {
        layer_log.borrow_mut().push(info.picked);
        info.picked
    });
    let props = LayerProps::builder()
        .id("points")
        .pickable(true)
        .on_hover(on_hover)
        .build();
    let layer = ScatterLayer::boxed(props, points(&[(0.0, 0.0)]), 3.0, &draws);

    let root_log = root_hovers.clone();
    let mut deck = Deck::new(
        DeckProps::builder()
            .width(100)
            .height(100)
            .picking_radius(0)
            .context(ContextSource::Headless)
            .layers(vec![layer])
            .on_hover(Box::new(move |info| {
                root_log.borrow_mut().push(info.layer_id.clone())
            }))
            .build(),
    );
    deck.animation_frame(ms(0)).unwrap();

    deck.pointer_move(50.0, 50.0);
    deck.animation_frame(ms(16)).unwrap();
    assert!(deck.interaction().is_hovering);
    deck.animation_frame(ms(32)).unwrap();
    assert_eq!(deck.cursor(), "pointer");

    deck.pointer_move(10.0, 10.0);
    deck.animation_frame(ms(48)).unwrap();
    assert!(!deck.interaction().is_hovering);

    assert_eq!(*layer_hovers.borrow(), [true, false]);
    assert_eq!(*root_hovers.borrow(), [None]);
}

#[test]
fn clicks_fall_through_unhandled_layer_handlers() {
    let draws = DrawLog::default();
    let layer_clicks = Rc::new(RefCell::new(0));
    let root_clicks = Rc::new(RefCell::new(Vec::new()));

    let layer_count = layer_clicks.clone();
    let on_click: LayerCallback = Rc::new(move |_| {
        *layer_count.borrow_mut() += 1;
        false
    });
    let props = LayerProps::builder()
        .id("points")
        .pickable(true)
        .on_click(on_click)
        .build();
    let layer = ScatterLayer::boxed(props, points(&[(0.0, 0.0)]), 3.0, &draws);

    let root_log = root_clicks.clone();
    let mut deck = Deck::new(
        DeckProps::builder()
            .width(100)
            .height(100)
            .picking_radius(0)
            .context(ContextSource::Headless)
            .layers(vec![layer])
            .on_click(Box::new(move |info| {
                root_log.borrow_mut().push(info.layer_id.clone())
            }))
            .build(),
    );
    deck.animation_frame(ms(0)).unwrap();

    deck.pointer_down(50.0, 50.0);
    assert!(deck.interaction().is_dragging);
    deck.animation_frame(ms(16)).unwrap();
    assert_eq!(deck.cursor(), "grabbing");
    deck.pointer_up();
    deck.click(50.0, 50.0);

    deck.click(5.0, 5.0);

    assert_eq!(*layer_clicks.borrow(), 1);
    assert_eq!(*root_clicks.borrow(), [Some("points".to_string()), None]);
}

#[test]
fn finalized_deck_stops_working() {
    let draws = DrawLog::default();
    let mut deck = small_deck(vec![scatter("points", &draws)]);
    deck.animation_frame(ms(0)).unwrap();

    deck.finalize();
    assert_eq!(deck.lifecycle(), Lifecycle::Finalized);
    assert!(deck.layer_manager().is_none());
    assert!(deck.context().is_none());

    deck.request_redraw("ignored");
    assert_eq!(deck.animation_frame(ms(16)).unwrap(), None);
    assert!(deck.set_layers(vec![scatter("points", &draws)]).is_ok());
    deck.finalize();
    assert_eq!(draws.borrow().len(), 1);
}

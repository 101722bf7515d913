//! Points that move to a new layout every second.
//!
//! Positions follow a spring, radii interpolate with an ease. Runs headless unless the
//! `wgpu` feature is enabled and an adapter is found. Set `RUST_LOG=trace` to see the
//! individual frames.

use glamx::Vec2;
use itertools::Itertools;
use snafu::ResultExt;
use std::any::Any;
use std::error::Error;
use std::f32::consts::TAU;
use std::rc::Rc;
use std::thread;
use strata::attributes::Attribute;
use strata::layers::{
    AttributeErr, ChangeFlags, DrawContext, Layer, LayerContext, LayerProps, LayerState,
    PickingContext, downcast_layer,
};
use strata::picking::PickRequest;
use strata::tracing::{info, trace};
use strata::transitions::{Easing, TransitionConfig, TransitionMap};
use strata::{Deck, DeckProps};
use tracing_subscriber::EnvFilter;
use web_time::{Duration, Instant};

const POINTS: usize = 12;

struct RingLayer {
    props: LayerProps,
    center: Rc<Vec<Vec2>>,
    radius: f32,
}

impl Layer for RingLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn layer_name(&self) -> &'static str {
        "RingLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let mut changes = self.props.diff(old.props());
        let same = downcast_layer::<RingLayer>(old)
            .is_some_and(|old| Rc::ptr_eq(&old.center, &self.center) && old.radius == self.radius);
        if !same {
            changes |= ChangeFlags::DATA_CHANGED;
        }
        changes
    }

    fn initialize_state(
        &mut self,
        state: &mut LayerState,
        _context: &LayerContext,
    ) -> strata::layers::Result<()> {
        let attributes = &mut state.attribute_manager;
        attributes.add(
            Attribute::builder()
                .name("positions")
                .size(2)
                .transition("get_position")
                .build(),
        );
        attributes.add(Attribute::builder().name("radii").transition("get_radius").build());
        Ok(())
    }

    fn update_state(
        &mut self,
        state: &mut LayerState,
        _context: &LayerContext,
        changes: ChangeFlags,
    ) -> strata::layers::Result<()> {
        if !changes.contains(ChangeFlags::DATA_CHANGED) {
            return Ok(());
        }
        let positions = self.center.iter().flat_map(|p| [p.x, p.y]).collect();
        let radii = vec![self.radius; self.center.len()];
        state
            .attribute_manager
            .set_value("positions", positions)
            .context(AttributeErr { layer: self.id() })?;
        state
            .attribute_manager
            .set_value("radii", radii)
            .context(AttributeErr { layer: self.id() })?;
        Ok(())
    }

    fn draw(&self, state: &LayerState, context: &mut DrawContext) {
        let Some(positions) = state.attribute_manager.effective_buffer("positions") else {
            return;
        };
        let first = positions.read().into_iter().tuples::<(f32, f32)>().next();
        trace!("{} on {}: first point at {first:?}", self.id(), context.viewport.id);
    }

    fn draw_picking(&self, state: &LayerState, context: &mut PickingContext) {
        let (Some(positions), Some(radii)) = (
            state.attribute_manager.effective_buffer("positions"),
            state.attribute_manager.effective_buffer("radii"),
        ) else {
            return;
        };
        let radii = radii.read();
        for (index, ((x, y), radius)) in positions
            .read()
            .into_iter()
            .tuples()
            .zip(radii)
            .enumerate()
        {
            context.fill_circle(Vec2::new(x, y), radius, 0.0, index as u32);
        }
    }
}

fn ring(step: usize) -> RingLayer {
    let radius = 100.0 + 60.0 * (step % 3) as f32;
    let turn = step as f32 * 0.25;
    let center = (0..POINTS)
        .map(|i| {
            let angle = TAU * i as f32 / POINTS as f32 + turn;
            Vec2::new(angle.cos(), angle.sin()) * radius
        })
        .collect();

    let mut transitions = TransitionMap::new();
    transitions.insert(
        "get_position".to_string(),
        TransitionConfig::builder()
            .kind("spring")
            .stiffness(0.08)
            .damping(0.4)
            .build(),
    );
    transitions.insert(
        "get_radius".to_string(),
        TransitionConfig::builder()
            .duration(Duration::from_millis(600))
            .easing(Easing::CubicInOut)
            .build(),
    );

    RingLayer {
        props: LayerProps::builder()
            .id("ring")
            .pickable(true)
            .transitions(transitions)
            .build(),
        center: Rc::new(center),
        radius: 6.0 + step as f32 % 4.0,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut deck = Deck::new(
        DeckProps::builder()
            .width(640)
            .height(480)
            .layers(vec![Box::new(ring(0))])
            .on_after_render(Box::new(|stats| trace!("Rendered {stats:?}")))
            .build(),
    );

    let start = Instant::now();
    let mut step = 0;
    let mut frames = 0;
    while start.elapsed() < Duration::from_secs(4) {
        let now = start.elapsed();
        if now.as_secs() as usize > step {
            step = now.as_secs() as usize;
            deck.set_layers(vec![Box::new(ring(step))])?;

            let request = PickRequest::builder().x(320.0 + 100.0).y(240.0).radius(8.0).build();
            match deck.pick_object(request) {
                Some(picked) => info!("Point {:?} is right of the center", picked.index),
                None => info!("Nothing right of the center"),
            }
        }

        if deck.animation_frame(now)?.is_some() {
            frames += 1;
        }
        thread::sleep(Duration::from_millis(16));
    }

    info!("Drew {frames} frames");
    deck.finalize();
    Ok(())
}

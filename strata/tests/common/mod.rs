#![allow(dead_code)]

use glamx::Vec2;
use snafu::ResultExt;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use strata::attributes::Attribute;
use strata::layers::{
    AttributeErr, ChangeFlags, DrawContext, Layer, LayerContext, LayerProps, LayerState,
    PickingContext, Result, downcast_layer,
};
use strata::transitions::{TransitionConfig, TransitionMap};
use tracing_subscriber::EnvFilter;
use web_time::Duration;

pub const POSITIONS: &str = "positions";
pub const RADII: &str = "radii";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub fn transitions(accessor: &str, config: impl Into<TransitionConfig>) -> TransitionMap {
    let mut map = TransitionMap::new();
    map.insert(accessor.to_string(), config.into());
    map
}

pub type DrawLog = Rc<RefCell<Vec<String>>>;

/// Points with a radius, drawn as discs into picking passes.
pub struct ScatterLayer {
    pub props: LayerProps,
    pub positions: Rc<Vec<Vec2>>,
    pub radius: f32,
    pub draws: DrawLog,
}

impl ScatterLayer {
    pub fn new(props: LayerProps, positions: Rc<Vec<Vec2>>, radius: f32, draws: &DrawLog) -> Self {
        Self {
            props,
            positions,
            radius,
            draws: draws.clone(),
        }
    }

    pub fn boxed(
        props: LayerProps,
        positions: Rc<Vec<Vec2>>,
        radius: f32,
        draws: &DrawLog,
    ) -> Box<dyn Layer> {
        Box::new(Self::new(props, positions, radius, draws))
    }
}

impl Layer for ScatterLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn layer_name(&self) -> &'static str {
        "ScatterLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let mut changes = self.props.diff(old.props());
        let same_data = downcast_layer::<ScatterLayer>(old).is_some_and(|old| {
            Rc::ptr_eq(&old.positions, &self.positions) && old.radius == self.radius
        });
        if !same_data {
            changes |= ChangeFlags::DATA_CHANGED;
        }
        changes
    }

    fn initialize_state(&mut self, state: &mut LayerState, _context: &LayerContext) -> Result<()> {
        let attributes = &mut state.attribute_manager;
        attributes.add(
            Attribute::builder()
                .name(POSITIONS)
                .size(2)
                .transition("get_position")
                .build(),
        );
        attributes.add(
            Attribute::builder()
                .name(RADII)
                .transition("get_radius")
                .build(),
        );
        Ok(())
    }

    fn update_state(
        &mut self,
        state: &mut LayerState,
        _context: &LayerContext,
        changes: ChangeFlags,
    ) -> Result<()> {
        if !changes.contains(ChangeFlags::DATA_CHANGED) {
            return Ok(());
        }
        let positions = self.positions.iter().flat_map(|p| [p.x, p.y]).collect();
        let radii = vec![self.radius; self.positions.len()];

        let attributes = &mut state.attribute_manager;
        attributes
            .set_value(POSITIONS, positions)
            .context(AttributeErr { layer: self.id() })?;
        attributes
            .set_value(RADII, radii)
            .context(AttributeErr { layer: self.id() })?;
        Ok(())
    }

    fn draw(&self, _state: &LayerState, context: &mut DrawContext) {
        self.draws
            .borrow_mut()
            .push(format!("{}@{}", self.id(), context.viewport.id));
    }

    fn draw_picking(&self, state: &LayerState, context: &mut PickingContext) {
        let Some(positions) = state.attribute_manager.effective_buffer(POSITIONS) else {
            return;
        };
        let Some(radii) = state.attribute_manager.effective_buffer(RADII) else {
            return;
        };
        let positions = positions.read();
        let radii = radii.read();

        for (index, (position, radius)) in positions.chunks_exact(2).zip(radii).enumerate() {
            let world = Vec2::new(position[0], position[1]);
            context.fill_circle(world, radius, 0.0, index as u32);
        }
    }
}

pub fn points(points: &[(f32, f32)]) -> Rc<Vec<Vec2>> {
    Rc::new(points.iter().map(|(x, y)| Vec2::new(*x, *y)).collect())
}

use crate::attributes::Attribute;
use crate::transitions::settings::TransitionMap;
use crate::transitions::{Result, Transition};
use std::collections::{BTreeMap, HashSet};
use strata_render::{Capabilities, GpuBuffer, GpuContext};
use strata_utils::{DeckArgs, RedrawFlag, warn_once};
use tracing::{debug, trace};
use web_time::Duration;

/// Creates, restarts, advances and drops the transitions of one layer's attributes.
///
/// Holds at most one [`Transition`] per attribute name. A transition whose attribute
/// disappears or stops asking for one is cancelled in the same update, which releases
/// its buffers.
pub struct AttributeTransitionManager {
    id: String,
    context: GpuContext,
    transitions: BTreeMap<String, Transition>,
    needs_redraw: RedrawFlag,
    num_instances: usize,
    disabled: bool,
    finalized: bool,
}

impl AttributeTransitionManager {
    pub fn new(id: &str, context: GpuContext) -> Self {
        let disabled = if !context.supports(Capabilities::TRANSFORM) {
            warn_once!(
                "The rendering context can't run transform passes. Attribute transitions are disabled"
            );
            true
        } else if DeckArgs::get().no_transitions {
            warn_once!("Attribute transitions are disabled by --no-transitions");
            true
        } else {
            false
        };

        Self {
            id: id.to_string(),
            context,
            transitions: BTreeMap::new(),
            needs_redraw: RedrawFlag::default(),
            num_instances: 0,
            disabled,
            finalized: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    /// Syncs transitions with the current attribute set.
    ///
    /// Fails on the first transition config that doesn't parse.
    pub fn update<'a>(
        &mut self,
        attributes: impl IntoIterator<Item = &'a Attribute>,
        transitions: &TransitionMap,
        num_instances: usize,
    ) -> Result<()> {
        if self.finalized || self.disabled {
            return Ok(());
        }
        self.num_instances = num_instances;

        let mut eligible = HashSet::new();
        for attribute in attributes {
            let Some(settings) = attribute.transition_setting(transitions)? else {
                continue;
            };
            let Some(target) = attribute.buffer() else {
                continue;
            };
            let name = attribute.name();
            eligible.insert(name.to_string());

            let is_new = match self.transitions.get(name) {
                Some(transition) if transition.transition_type() == settings.transition_type() => {
                    false
                }
                _ => {
                    if let Some(mut old) = self.transitions.remove(name) {
                        debug!(
                            "{}: {name} switched from {} to {}",
                            self.id,
                            old.transition_type(),
                            settings.transition_type()
                        );
                        old.cancel();
                    }
                    self.transitions
                        .insert(name.to_string(), Transition::new(&settings));
                    true
                }
            };

            if is_new || attribute.needs_redraw() {
                self.needs_redraw.mark(format!("{name} transition started"));
                if let Some(transition) = self.transitions.get_mut(name) {
                    transition.start(
                        &self.context,
                        &settings,
                        target,
                        num_instances * attribute.size(),
                    );
                }
            }
        }

        self.transitions.retain(|name, transition| {
            if eligible.contains(name) {
                return true;
            }
            trace!("Dropping transition of {name}");
            transition.cancel();
            false
        });

        Ok(())
    }

    /// Advances every transition once. Returns and clears the accumulated redraw flag.
    #[profiling::function]
    pub fn run(&mut self, now: Duration) -> bool {
        if self.finalized || self.disabled {
            return false;
        }

        if self.num_instances > 0 {
            for (name, transition) in &mut self.transitions {
                if transition.update(now) {
                    self.needs_redraw.mark(format!("{name} transitioning"));
                }
            }
        }

        self.needs_redraw.consume().is_some()
    }

    /// The transitioning buffer of every attribute currently in transition.
    pub fn get_attributes(&self) -> BTreeMap<&str, &GpuBuffer> {
        self.transitions
            .iter()
            .filter(|(_, transition)| transition.is_transitioning())
            .filter_map(|(name, transition)| {
                Some((name.as_str(), transition.transitioning_buffer()?))
            })
            .collect()
    }

    pub fn transitioning_buffer(&self, name: &str) -> Option<&GpuBuffer> {
        self.transitions
            .get(name)
            .filter(|transition| transition.is_transitioning())?
            .transitioning_buffer()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.transitions.contains_key(name)
    }

    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.get(name)
    }

    /// Cancels every transition. Later updates and runs do nothing.
    pub fn finalize(&mut self) {
        for transition in self.transitions.values_mut() {
            transition.cancel();
        }
        self.transitions.clear();
        self.finalized = true;
    }
}

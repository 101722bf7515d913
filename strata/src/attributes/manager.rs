use crate::attributes::{Attribute, Result, UnknownAttributeErr};
use crate::transitions::{AttributeTransitionManager, TransitionMap};
use snafu::OptionExt;
use std::collections::BTreeMap;
use strata_render::{GpuBuffer, GpuContext};
use strata_utils::{RedrawFlag, RedrawReason};
use tracing::{debug, instrument};
use web_time::Duration;

/// Owns the attributes of one layer, uploads them and drives their transitions.
pub struct AttributeManager {
    id: String,
    context: GpuContext,
    attributes: BTreeMap<String, Attribute>,
    transition_manager: AttributeTransitionManager,
    needs_redraw: RedrawFlag,
    num_instances: usize,
    finalized: bool,
}

impl AttributeManager {
    pub fn new(id: impl Into<String>, context: GpuContext) -> Self {
        let id = id.into();
        Self {
            transition_manager: AttributeTransitionManager::new(&id, context.clone()),
            id,
            context,
            attributes: BTreeMap::new(),
            needs_redraw: RedrawFlag::default(),
            num_instances: 0,
            finalized: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add(&mut self, attribute: Attribute) {
        self.needs_redraw
            .mark(format!("{} attribute added", attribute.name()));
        self.attributes.insert(attribute.name().to_string(), attribute);
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.needs_redraw.mark(format!("{name} attribute removed"));
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn set_value(&mut self, name: &str, value: Vec<f32>) -> Result<()> {
        self.attributes
            .get_mut(name)
            .context(UnknownAttributeErr { name })?
            .set_value(value)
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    pub fn transition_manager(&self) -> &AttributeTransitionManager {
        &self.transition_manager
    }

    /// Uploads changed attributes and (re)starts their transitions.
    #[instrument(skip_all, fields(id = %self.id))]
    pub fn update(
        &mut self,
        num_instances: usize,
        transitions: &TransitionMap,
    ) -> crate::transitions::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.num_instances = num_instances;

        let mut uploaded = 0;
        for attribute in self.attributes.values_mut() {
            if attribute.upload(&self.context) {
                uploaded += 1;
            }
        }
        if uploaded > 0 {
            debug!("Uploaded {uploaded} attributes of {}", self.id);
        }

        self.transition_manager
            .update(self.attributes.values(), transitions, num_instances)
    }

    /// Advances running transitions. Returns whether any of them changed.
    pub fn run_transitions(&mut self, now: Duration) -> bool {
        let changed = self.transition_manager.run(now);
        if changed {
            self.needs_redraw.mark("attribute transition");
        }
        changed
    }

    /// The buffer to draw with per attribute: the transitioning one while a
    /// transition runs, the raw one otherwise.
    pub fn effective_buffers(&self) -> BTreeMap<&str, &GpuBuffer> {
        let transitioning = self.transition_manager.get_attributes();
        self.attributes
            .iter()
            .filter_map(|(name, attribute)| {
                let buffer = transitioning
                    .get(name.as_str())
                    .copied()
                    .or_else(|| attribute.buffer())?;
                Some((name.as_str(), buffer))
            })
            .collect()
    }

    pub fn effective_buffer(&self, name: &str) -> Option<&GpuBuffer> {
        self.transition_manager
            .transitioning_buffer(name)
            .or_else(|| self.attributes.get(name)?.buffer())
    }

    /// Queries the own flag and every attribute's flag, clearing them all when `clear` is set.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        let mut reason = self.needs_redraw.check(clear);
        for attribute in self.attributes.values_mut() {
            if attribute.check_redraw(clear) && reason.is_none() {
                reason = Some(format!("{} changed", attribute.name()).into());
            }
        }
        reason
    }

    /// Releases every buffer. Later updates upload nothing.
    pub fn finalize(&mut self) {
        self.finalized = true;
        self.transition_manager.finalize();
        for attribute in self.attributes.values_mut() {
            attribute.release();
        }
    }
}

use crate::layers::{
    ChangeFlags, Layer, LayerContext, LayerError, LayerState, Result, TransitionErr,
};
use crate::views::Viewport;
use glamx::Vec2;
use slotmap::{SlotMap, new_key_type};
use snafu::ResultExt;
use std::collections::{HashMap, HashSet};
use strata_render::GpuContext;
use strata_utils::{RedrawFlag, RedrawReason};
use tracing::{debug, error, instrument, trace, warn};
use web_time::Duration;

new_key_type! { pub struct LayerKey; }

struct LayerEntry {
    layer: Box<dyn Layer>,
    state: LayerState,
    parent: Option<LayerKey>,
    children: Vec<LayerKey>,
}

/// A living layer as seen by the renderer and picker.
#[derive(Clone, Copy)]
pub struct LayerRef<'a> {
    pub key: LayerKey,
    pub layer: &'a dyn Layer,
    pub state: &'a LayerState,
    pub parent: Option<LayerKey>,
    /// Visible itself and through every ancestor.
    pub visible: bool,
}

impl LayerRef<'_> {
    pub fn id(&self) -> &str {
        self.layer.id()
    }
}

/// Bookkeeping of one diff pass.
#[derive(Default)]
struct Matching {
    seen: HashSet<LayerKey>,
    seen_ids: HashSet<String>,
    changed: bool,
    error: Option<LayerError>,
}

impl Matching {
    fn record(&mut self, error: LayerError) {
        error!("{error}");
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// Matches layer descriptors to living layers, runs their lifecycle and keeps the
/// flattened draw order.
///
/// Layers are owned in a slot map; composite layers keep the keys of their sublayers,
/// which are diffed recursively whenever the composite updates.
pub struct LayerManager {
    context: LayerContext,
    entries: SlotMap<LayerKey, LayerEntry>,
    roots: Vec<LayerKey>,
    ids: HashMap<String, LayerKey>,
    order: Vec<LayerKey>,
    needs_redraw: RedrawFlag,
    viewport_changed: bool,
    finalized: bool,
}

impl LayerManager {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            context: LayerContext::new(gpu),
            entries: SlotMap::with_key(),
            roots: Vec::new(),
            ids: HashMap::new(),
            order: Vec::new(),
            needs_redraw: RedrawFlag::default(),
            viewport_changed: false,
            finalized: false,
        }
    }

    pub fn context(&self) -> &LayerContext {
        &self.context
    }

    pub fn set_mouse_position(&mut self, position: Option<Vec2>) {
        self.context.mouse_position = position;
    }

    pub fn layer_count(&self) -> usize {
        self.entries.len()
    }

    /// Diffs `layers` against the living layers.
    ///
    /// Matched layers take over the state of their predecessor, new ones are initialized
    /// and unmatched ones finalized. A layer that fails to update is logged and kept; the
    /// first such error is returned after the whole pass completed.
    #[instrument(skip_all)]
    #[profiling::function]
    pub fn set_layers(&mut self, layers: Vec<Box<dyn Layer>>) -> Result<()> {
        if self.finalized {
            warn!("Layers set on a finalized layer manager");
            return Ok(());
        }

        let mut matching = Matching::default();
        let mut roots = Vec::with_capacity(layers.len());
        for layer in layers {
            if let Some(key) = self.match_layer(layer, None, &mut matching) {
                roots.push(key);
            }
        }

        matching.changed |= roots != self.roots;
        self.roots = roots;

        let stale: Vec<LayerKey> = self
            .entries
            .keys()
            .filter(|key| !matching.seen.contains(key))
            .collect();
        matching.changed |= !stale.is_empty();
        self.remove_layers(&stale);

        if matching.changed {
            self.rebuild_order();
            self.needs_redraw.mark("Layers changed");
        }

        matching.error.map_or(Ok(()), Err)
    }

    /// Runs pending layer updates, then advances attribute transitions.
    #[instrument(skip_all)]
    #[profiling::function]
    pub fn update_layers(&mut self, now: Duration) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.context.time = now;
        self.context.frame_number += 1;

        let base_changes = if std::mem::take(&mut self.viewport_changed) {
            ChangeFlags::VIEWPORT_CHANGED
        } else {
            ChangeFlags::empty()
        };

        let mut first_error = None;
        let mut structure_changed = false;
        for key in self.order.clone() {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            let mut changes = base_changes;
            if entry.layer.has_pending_updates(&entry.state) {
                changes |= ChangeFlags::STATE_CHANGED;
            }
            if changes.is_empty() || !entry.layer.should_update_state(changes) {
                continue;
            }

            trace!("Updating {} with {changes:?}", entry.layer.id());
            let (changed, error) = self.rerender(key, changes);
            structure_changed |= changed;
            if first_error.is_none() {
                first_error = error;
            }
        }

        if structure_changed {
            self.rebuild_order();
            self.needs_redraw.mark("Sublayers changed");
        }

        for entry in self.entries.values_mut() {
            entry.state.attribute_manager.run_transitions(now);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Makes `viewport` the one layers see. A change is passed to layers on the next update.
    pub fn activate_viewport(&mut self, viewport: &Viewport) {
        if self.context.viewport != *viewport {
            trace!("Activating viewport {}", viewport.id);
            self.context.viewport = viewport.clone();
            self.viewport_changed = true;
        }
    }

    /// Own flag or any layer's flag. Every flag is queried, and cleared when `clear` is set.
    pub fn needs_redraw(&mut self, clear: bool) -> Option<RedrawReason> {
        let mut reason = self.needs_redraw.check(clear);
        for entry in self.entries.values_mut() {
            let layer_reason = entry.state.needs_redraw(clear);
            if reason.is_none() {
                reason = layer_reason;
            }
        }
        reason
    }

    /// Layers in draw order, optionally only those whose id starts with one of `layer_ids`.
    pub fn get_layers(&self, layer_ids: Option<&[String]>) -> Vec<LayerRef<'_>> {
        self.order
            .iter()
            .filter_map(|key| self.layer(*key))
            .filter(|layer| match layer_ids {
                Some(ids) => ids.iter().any(|id| layer.id().starts_with(id.as_str())),
                None => true,
            })
            .collect()
    }

    pub fn layer(&self, key: LayerKey) -> Option<LayerRef<'_>> {
        let entry = self.entries.get(key)?;
        Some(LayerRef {
            key,
            layer: entry.layer.as_ref(),
            state: &entry.state,
            parent: entry.parent,
            visible: self.is_visible(key),
        })
    }

    pub fn layer_by_id(&self, id: &str) -> Option<LayerRef<'_>> {
        self.layer(*self.ids.get(id)?)
    }

    /// `key` followed by its ancestors up to the top level layer.
    pub fn ancestors(&self, key: LayerKey) -> Vec<LayerRef<'_>> {
        let mut chain = Vec::new();
        let mut current = Some(key);
        while let Some(key) = current {
            let Some(layer) = self.layer(key) else {
                break;
            };
            current = layer.parent;
            chain.push(layer);
        }
        chain
    }

    pub fn finalize(&mut self) {
        let keys: Vec<LayerKey> = self.entries.keys().collect();
        self.remove_layers(&keys);
        self.roots.clear();
        self.order.clear();
        self.finalized = true;
    }

    fn is_visible(&self, key: LayerKey) -> bool {
        let mut current = Some(key);
        while let Some(key) = current {
            let Some(entry) = self.entries.get(key) else {
                return false;
            };
            if !entry.layer.props().visible {
                return false;
            }
            current = entry.parent;
        }
        true
    }

    fn match_layer(
        &mut self,
        layer: Box<dyn Layer>,
        parent: Option<LayerKey>,
        matching: &mut Matching,
    ) -> Option<LayerKey> {
        let id = layer.id().to_string();
        if !matching.seen_ids.insert(id.clone()) {
            warn!("Multiple layers with id {id:?}, skipping the later ones");
            return None;
        }

        let existing = self.ids.get(&id).copied().filter(|key| {
            self.entries
                .get(*key)
                .is_some_and(|entry| entry.layer.layer_name() == layer.layer_name())
        });

        match existing {
            Some(key) => {
                let entry = &mut self.entries[key];
                let changes = layer.diff_props(entry.layer.as_ref());
                entry.layer = layer;
                entry.parent = parent;
                matching.seen.insert(key);

                if entry.layer.should_update_state(changes) {
                    matching.changed = true;
                    self.update_layer(key, changes, matching);
                } else {
                    self.keep_children(key, matching);
                }
                Some(key)
            }
            None => {
                debug!("Creating {} {id:?}", layer.layer_name());
                let state = LayerState::new(&id, self.context.gpu.clone());
                let key = self.entries.insert(LayerEntry {
                    layer,
                    state,
                    parent,
                    children: Vec::new(),
                });
                self.ids.insert(id, key);
                matching.seen.insert(key);
                matching.changed = true;

                let entry = &mut self.entries[key];
                if let Err(e) = entry.layer.initialize_state(&mut entry.state, &self.context) {
                    matching.record(e);
                }
                self.update_layer(key, ChangeFlags::all(), matching);
                Some(key)
            }
        }
    }

    fn update_layer(&mut self, key: LayerKey, changes: ChangeFlags, matching: &mut Matching) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };

        let requested = entry.state.needs_update();
        let mut result = entry
            .layer
            .update_state(&mut entry.state, &self.context, changes);
        if result.is_ok() {
            let num_instances = entry.layer.num_instances(&entry.state);
            result = entry
                .state
                .attribute_manager
                .update(num_instances, &entry.layer.props().transitions)
                .context(TransitionErr {
                    layer: entry.layer.id(),
                });
        }
        entry.state.clear_needs_update();
        // a bare poll redraws only if the layer marked something itself
        if requested || changes != ChangeFlags::STATE_CHANGED {
            entry.state.set_needs_redraw("Layer updated");
        }
        if let Err(e) = result {
            matching.record(e);
        }

        if !entry.layer.is_composite() {
            return;
        }

        let sublayers = entry.layer.render_layers(&entry.state, &self.context);
        let mut children = Vec::with_capacity(sublayers.len());
        for sublayer in sublayers {
            if let Some(child) = self.match_layer(sublayer, Some(key), matching) {
                children.push(child);
            }
        }
        if let Some(entry) = self.entries.get_mut(key)
            && entry.children != children
        {
            matching.changed = true;
            entry.children = children;
        }
    }

    fn keep_children(&mut self, key: LayerKey, matching: &mut Matching) {
        let children = self
            .entries
            .get(key)
            .map(|entry| entry.children.clone())
            .unwrap_or_default();
        for child in children {
            if let Some(entry) = self.entries.get(child) {
                matching.seen.insert(child);
                matching.seen_ids.insert(entry.layer.id().to_string());
                self.keep_children(child, matching);
            }
        }
    }

    /// Updates one layer outside of a full diff and finalizes sublayers it no longer renders.
    fn rerender(&mut self, key: LayerKey, changes: ChangeFlags) -> (bool, Option<LayerError>) {
        let previous = self.descendants(key);
        let mut matching = Matching {
            seen_ids: self
                .entries
                .iter()
                .filter(|(other, _)| *other != key && !previous.contains(other))
                .map(|(_, entry)| entry.layer.id().to_string())
                .collect(),
            ..Matching::default()
        };
        matching.seen.insert(key);
        if let Some(entry) = self.entries.get(key) {
            matching.seen_ids.insert(entry.layer.id().to_string());
        }

        self.update_layer(key, changes, &mut matching);

        let stale: Vec<LayerKey> = previous
            .into_iter()
            .filter(|child| !matching.seen.contains(child))
            .collect();
        let changed = matching.changed || !stale.is_empty();
        self.remove_layers(&stale);
        (changed, matching.error)
    }

    fn descendants(&self, key: LayerKey) -> HashSet<LayerKey> {
        let mut found = HashSet::new();
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if let Some(entry) = self.entries.get(key) {
                for child in &entry.children {
                    if found.insert(*child) {
                        stack.push(*child);
                    }
                }
            }
        }
        found
    }

    fn remove_layers(&mut self, keys: &[LayerKey]) {
        for key in keys {
            let Some(mut entry) = self.entries.remove(*key) else {
                continue;
            };
            debug!("Finalizing {} {:?}", entry.layer.layer_name(), entry.layer.id());
            entry.layer.finalize_state(&mut entry.state);
            entry.state.attribute_manager.finalize();
            if self.ids.get(entry.layer.id()) == Some(key) {
                self.ids.remove(entry.layer.id());
            }
        }
    }

    fn rebuild_order(&mut self) {
        let mut order = Vec::with_capacity(self.entries.len());
        let mut stack: Vec<LayerKey> = self.roots.iter().rev().copied().collect();
        while let Some(key) = stack.pop() {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            order.push(key);
            stack.extend(entry.children.iter().rev().copied());
        }
        self.order = order;
    }
}

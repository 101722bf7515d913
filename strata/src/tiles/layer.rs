use crate::layers::{ChangeFlags, Layer, LayerContext, LayerProps, LayerState, Result};
use crate::picking::{PickInfo, PickMode};
use crate::tiles::tileset::TilesetResult;
use crate::tiles::{LoadState, TileError, TileEvent, TileHeader, Tileset, TilesetLoader};
use bon::Builder;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, trace};

pub type TileCallback = Rc<dyn Fn(&TileHeader)>;
pub type TileFailCallback = Rc<dyn Fn(&str, &TileError)>;
pub type TilesetCallback = Rc<dyn Fn(&dyn Tileset)>;
/// Builds the sublayer of one tile from its header and the props it inherits.
pub type SublayerFactory = Rc<dyn Fn(&TileHeader, LayerProps) -> Option<Box<dyn Layer>>>;

type LoadFn = dyn Fn(&str) -> TilesetResult + Send + Sync;

/// Where a tileset comes from.
#[derive(Clone)]
pub struct TilesetSource {
    pub uri: String,
    load: Arc<LoadFn>,
}

impl TilesetSource {
    pub fn new<F>(uri: impl Into<String>, load: F) -> Self
    where
        F: Fn(&str) -> TilesetResult + Send + Sync + 'static,
    {
        Self {
            uri: uri.into(),
            load: Arc::new(load),
        }
    }

    fn same(&self, other: &TilesetSource) -> bool {
        self.uri == other.uri && Arc::ptr_eq(&self.load, &other.load)
    }

    fn spawn(&self) -> TilesetLoader {
        let load = self.load.clone();
        TilesetLoader::spawn(self.uri.clone(), move |uri: &str| load(uri))
    }
}

/// A composite layer showing the tiles of a streamed tileset.
#[derive(Builder)]
pub struct TileLayer {
    pub props: LayerProps,
    pub data: TilesetSource,
    pub sublayer: SublayerFactory,
    pub on_tileset_load: Option<TilesetCallback>,
    pub on_tile_load: Option<TileCallback>,
    pub on_tile_unload: Option<TileCallback>,
    pub on_tile_load_fail: Option<TileFailCallback>,
}

struct TileSublayer {
    header: TileHeader,
    visible: bool,
}

struct TileLayerState {
    source: TilesetSource,
    loader: Option<TilesetLoader>,
    tileset: Option<Box<dyn Tileset>>,
    events: Receiver<TileEvent>,
    events_sender: Sender<TileEvent>,
    layer_map: BTreeMap<String, TileSublayer>,
    frame_number: u64,
}

impl TileLayerState {
    fn load(source: &TilesetSource) -> Self {
        debug!("Loading tileset {}", source.uri);
        let (events_sender, events) = unbounded();
        Self {
            source: source.clone(),
            loader: Some(source.spawn()),
            tileset: None,
            events,
            events_sender,
            layer_map: BTreeMap::new(),
            frame_number: 0,
        }
    }
}

impl TileLayer {
    fn sublayer_id(&self, uri: &str) -> String {
        format!("{}-{uri}", self.props.id)
    }

    /// The tile uri behind one of this layer's sublayer ids.
    fn tile_uri<'a>(&self, sublayer_id: &'a str) -> Option<&'a str> {
        sublayer_id
            .strip_prefix(self.props.id.as_str())?
            .strip_prefix('-')
    }

    /// Returns whether the load settled.
    fn poll_loader(&self, tiles: &mut TileLayerState) -> bool {
        let Some(loader) = &mut tiles.loader else {
            return false;
        };
        match loader.poll() {
            LoadState::Pending => return false,
            LoadState::Loaded(mut tileset) => {
                debug!("Tileset {} loaded", self.data.uri);
                tileset.attach(tiles.events_sender.clone());
                if let Some(callback) = &self.on_tileset_load {
                    callback(tileset.as_ref());
                }
                tiles.tileset = Some(tileset);
                tiles.loader = None;
            }
            LoadState::Failed(e) => {
                error!("{e}");
                if let Some(callback) = &self.on_tile_load_fail {
                    callback(&self.data.uri, &e);
                }
                tiles.loader = None;
            }
        }
        true
    }

    /// Returns whether any event arrived.
    fn drain_events(&self, tiles: &mut TileLayerState) -> bool {
        let mut received = false;
        while let Ok(event) = tiles.events.try_recv() {
            received = true;
            match event {
                TileEvent::Loaded(header) => {
                    trace!("Tile {} loaded", header.uri);
                    if let Some(callback) = &self.on_tile_load {
                        callback(&header);
                    }
                }
                TileEvent::Unloaded(header) => {
                    trace!("Tile {} unloaded", header.uri);
                    tiles.layer_map.remove(&header.uri);
                    if let Some(callback) = &self.on_tile_unload {
                        callback(&header);
                    }
                }
                TileEvent::LoadFailed { uri, error } => {
                    error!("{error}");
                    if let Some(callback) = &self.on_tile_load_fail {
                        callback(&uri, &error);
                    }
                }
            }
        }
        received
    }

    /// Returns whether a sublayer was added, removed or toggled.
    fn update_layer_map(tiles: &mut TileLayerState) -> bool {
        let Some(tileset) = &tiles.tileset else {
            return false;
        };

        let mut changed = false;
        for tile in tileset.tiles() {
            let selected = tile.selected_frame == tiles.frame_number;
            if !tile.is_loaded() {
                changed |= tiles.layer_map.remove(&tile.uri).is_some();
                continue;
            }
            match tiles.layer_map.get_mut(&tile.uri) {
                Some(sublayer) => {
                    changed |= sublayer.visible != selected;
                    sublayer.header = tile.clone();
                    sublayer.visible = selected;
                }
                None if selected => {
                    tiles.layer_map.insert(
                        tile.uri.clone(),
                        TileSublayer {
                            header: tile.clone(),
                            visible: true,
                        },
                    );
                    changed = true;
                }
                None => {}
            }
        }
        changed
    }
}

impl Layer for TileLayer {
    fn props(&self) -> &LayerProps {
        &self.props
    }

    fn layer_name(&self) -> &'static str {
        "TileLayer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_composite(&self) -> bool {
        true
    }

    fn diff_props(&self, old: &dyn Layer) -> ChangeFlags {
        let mut changes = self.props.diff(old.props());
        let same_data = old
            .as_any()
            .downcast_ref::<TileLayer>()
            .is_some_and(|old| old.data.same(&self.data));
        if !same_data {
            changes |= ChangeFlags::DATA_CHANGED;
        }
        changes
    }

    /// Tile selection follows the viewport.
    fn should_update_state(&self, changes: ChangeFlags) -> bool {
        !changes.is_empty()
    }

    fn initialize_state(&mut self, state: &mut LayerState, _context: &LayerContext) -> Result<()> {
        state.set(TileLayerState::load(&self.data));
        Ok(())
    }

    fn update_state(
        &mut self,
        state: &mut LayerState,
        context: &LayerContext,
        _changes: ChangeFlags,
    ) -> Result<()> {
        let reload = state
            .get::<TileLayerState>()
            .is_none_or(|tiles| !tiles.source.same(&self.data));
        if reload {
            state.set(TileLayerState::load(&self.data));
        }

        let Some(tiles) = state.get_mut::<TileLayerState>() else {
            return Ok(());
        };
        let mut changed = reload | self.poll_loader(tiles);
        if let Some(tileset) = &mut tiles.tileset {
            tiles.frame_number = tileset.update(&context.viewport);
        }
        changed |= self.drain_events(tiles);
        changed |= Self::update_layer_map(tiles);

        if changed {
            state.set_needs_redraw("Tiles changed");
        }
        Ok(())
    }

    fn finalize_state(&mut self, state: &mut LayerState) {
        if let Some(tiles) = state.take::<TileLayerState>() {
            debug!(
                "Releasing tileset {} with {} tile layers",
                self.data.uri,
                tiles.layer_map.len()
            );
        }
    }

    fn has_pending_updates(&self, state: &LayerState) -> bool {
        state.needs_update()
            || state
                .get::<TileLayerState>()
                .is_some_and(|tiles| tiles.loader.is_some() || !tiles.events.is_empty())
    }

    fn num_instances(&self, _state: &LayerState) -> usize {
        0
    }

    fn render_layers(&self, state: &LayerState, _context: &LayerContext) -> Vec<Box<dyn Layer>> {
        let Some(tiles) = state.get::<TileLayerState>() else {
            return Vec::new();
        };
        tiles
            .layer_map
            .iter()
            .filter_map(|(uri, sublayer)| {
                let mut props = self.props.sublayer(self.sublayer_id(uri));
                props.visible = self.props.visible && sublayer.visible;
                (self.sublayer)(&sublayer.header, props)
            })
            .collect()
    }

    /// Attaches the picked tile's header as the pick object.
    fn get_picking_info(&self, state: &LayerState, mut info: PickInfo, _mode: PickMode) -> PickInfo {
        let header = info
            .source_layer_id
            .as_deref()
            .and_then(|id| self.tile_uri(id))
            .and_then(|uri| state.get::<TileLayerState>()?.layer_map.get(uri))
            .map(|sublayer| sublayer.header.clone());
        if let Some(header) = header {
            info.object = Some(Rc::new(header));
        }
        info
    }
}

mod common;

use common::{DrawLog, ScatterLayer, init_tracing, ms};
use crossbeam_channel::Sender;
use glamx::Vec2;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use strata::layers::{LayerManager, LayerProps};
use strata::picking::{DeckPicker, PickRequest};
use strata::tiles::{
    LoadErr, TileContent, TileContentKind, TileError, TileEvent, TileHeader, TileLayer,
    Tileset, TilesetSource,
};
use strata::views::{ViewManager, ViewState, Viewport};
use strata_render::GpuContext;
use strata_utils::ScreenRect;

/// Loads every tile on its first update. Tiles listed in `unload` drop their content on
/// the next update.
struct GridTileset {
    tiles: Vec<TileHeader>,
    positions: Vec<(String, Vec<f32>)>,
    events: Option<Sender<TileEvent>>,
    frame: u64,
    unload: Arc<Mutex<Vec<String>>>,
}

impl GridTileset {
    fn new(tiles: &[(&str, Vec<f32>)], unload: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            tiles: tiles.iter().map(|(uri, _)| TileHeader::new(*uri)).collect(),
            positions: tiles
                .iter()
                .map(|(uri, positions)| (uri.to_string(), positions.clone()))
                .collect(),
            events: None,
            frame: 0,
            unload: unload.clone(),
        }
    }

    fn send(&self, event: TileEvent) {
        if let Some(events) = &self.events {
            events.send(event).unwrap();
        }
    }
}

impl Tileset for GridTileset {
    fn attach(&mut self, events: Sender<TileEvent>) {
        self.events = Some(events);
    }

    fn update(&mut self, _viewport: &Viewport) -> u64 {
        self.frame += 1;
        let unload: Vec<String> = self.unload.lock().drain(..).collect();

        let mut events = Vec::new();
        for (tile, (_, positions)) in self.tiles.iter_mut().zip(&self.positions) {
            tile.selected_frame = self.frame;
            if unload.contains(&tile.uri) {
                tile.content = None;
                events.push(TileEvent::Unloaded(tile.clone()));
                continue;
            }
            if tile.is_loaded() || self.frame > 1 {
                continue;
            }
            match TileContentKind::from_uri(&tile.uri) {
                Ok(kind) => {
                    tile.content = Some(Arc::new(TileContent {
                        kind,
                        positions: positions.clone(),
                    }));
                    events.push(TileEvent::Loaded(tile.clone()));
                }
                Err(error) => events.push(TileEvent::LoadFailed {
                    uri: tile.uri.clone(),
                    error,
                }),
            }
        }
        for event in events {
            self.send(event);
        }
        self.frame
    }

    fn tiles(&self) -> &[TileHeader] {
        &self.tiles
    }
}

#[derive(Default)]
struct TileLog {
    tilesets: Vec<usize>,
    loaded: Vec<String>,
    unloaded: Vec<String>,
    failed: Vec<String>,
}

fn tile_layer(source: TilesetSource, log: &Rc<RefCell<TileLog>>, draws: &DrawLog) -> TileLayer {
    let draws = draws.clone();
    let (tileset_log, load_log, unload_log, fail_log) =
        (log.clone(), log.clone(), log.clone(), log.clone());

    TileLayer::builder()
        .props(LayerProps::builder().id("tiles").pickable(true).build())
        .data(source)
        .sublayer(Rc::new(move |header: &TileHeader, props: LayerProps| {
            let content = header.content.as_ref()?;
            let positions = content
                .positions
                .chunks_exact(2)
                .map(|p| Vec2::new(p[0], p[1]))
                .collect();
            Some(ScatterLayer::boxed(props, Rc::new(positions), 3.0, &draws))
        }))
        .on_tileset_load(Rc::new(move |tileset: &dyn Tileset| {
            tileset_log.borrow_mut().tilesets.push(tileset.tiles().len())
        }))
        .on_tile_load(Rc::new(move |header: &TileHeader| {
            load_log.borrow_mut().loaded.push(header.uri.clone())
        }))
        .on_tile_unload(Rc::new(move |header: &TileHeader| {
            unload_log.borrow_mut().unloaded.push(header.uri.clone())
        }))
        .on_tile_load_fail(Rc::new(move |uri: &str, _error: &TileError| {
            fail_log.borrow_mut().failed.push(uri.to_string())
        }))
        .build()
}

fn grid_source(unload: &Arc<Mutex<Vec<String>>>) -> TilesetSource {
    let unload = unload.clone();
    TilesetSource::new("grid.json", move |_uri: &str| {
        let tileset = GridTileset::new(
            &[
                ("a.pnts", vec![0.0, 0.0]),
                ("b.pnts", vec![20.0, 20.0, 30.0, 30.0]),
                ("c.glb", vec![]),
            ],
            &unload,
        );
        Ok(Box::new(tileset) as Box<dyn Tileset>)
    })
}

/// Runs frames until `done` holds or the loader thread had plenty of time.
fn run_until(manager: &mut LayerManager, mut done: impl FnMut(&LayerManager) -> bool) {
    for frame in 0..2000 {
        manager.update_layers(ms(frame)).unwrap();
        if done(manager) {
            return;
        }
        thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("tiles never settled");
}

#[test]
fn loaded_tiles_become_sublayers() {
    init_tracing();
    let log = Rc::new(RefCell::new(TileLog::default()));
    let draws = DrawLog::default();
    let unload = Arc::new(Mutex::new(Vec::new()));

    let mut manager = LayerManager::new(GpuContext::headless());
    manager
        .set_layers(vec![Box::new(tile_layer(grid_source(&unload), &log, &draws))])
        .unwrap();
    run_until(&mut manager, |m| m.layer_by_id("tiles-b.pnts").is_some());

    let ids: Vec<_> = manager
        .get_layers(None)
        .iter()
        .map(|layer| layer.id().to_string())
        .collect();
    assert_eq!(ids, ["tiles", "tiles-a.pnts", "tiles-b.pnts"]);
    assert!(manager.layer_by_id("tiles-b.pnts").unwrap().visible);

    let log = log.borrow();
    assert_eq!(log.tilesets, [3]);
    assert_eq!(log.loaded, ["a.pnts", "b.pnts"]);
    assert_eq!(log.failed, ["c.glb"]);
}

#[test]
fn unloaded_tiles_drop_their_sublayer() {
    let log = Rc::new(RefCell::new(TileLog::default()));
    let draws = DrawLog::default();
    let unload = Arc::new(Mutex::new(Vec::new()));

    let mut manager = LayerManager::new(GpuContext::headless());
    manager
        .set_layers(vec![Box::new(tile_layer(grid_source(&unload), &log, &draws))])
        .unwrap();
    run_until(&mut manager, |m| m.layer_by_id("tiles-a.pnts").is_some());

    unload.lock().push("a.pnts".to_string());
    let moved = Viewport::new(
        "main",
        ScreenRect::new(0.0, 0.0, 100.0, 100.0),
        ViewState::new(Vec2::new(1.0, 0.0), 0.0),
    );
    manager.activate_viewport(&moved);
    run_until(&mut manager, |m| m.layer_by_id("tiles-a.pnts").is_none());

    assert!(manager.layer_by_id("tiles-b.pnts").is_some());
    assert_eq!(log.borrow().unloaded, ["a.pnts"]);
}

#[test]
fn picking_a_tile_reports_its_header() {
    let log = Rc::new(RefCell::new(TileLog::default()));
    let draws = DrawLog::default();
    let unload = Arc::new(Mutex::new(Vec::new()));

    let mut manager = LayerManager::new(GpuContext::headless());
    manager
        .set_layers(vec![Box::new(tile_layer(grid_source(&unload), &log, &draws))])
        .unwrap();
    run_until(&mut manager, |m| m.layer_by_id("tiles-a.pnts").is_some());

    let views = ViewManager::new(100, 100);
    let mut picker = DeckPicker::new();
    let request = PickRequest::builder().x(50.0).y(50.0).radius(0.0).build();
    let result = picker.pick_object(&manager, &views, None, &request);
    let info = result.first_picked().unwrap();

    assert_eq!(info.layer_id.as_deref(), Some("tiles"));
    assert_eq!(info.source_layer_id.as_deref(), Some("tiles-a.pnts"));
    assert_eq!(info.object::<TileHeader>().unwrap().uri, "a.pnts");
}

#[test]
fn failed_tileset_is_reported_with_its_uri() {
    let log = Rc::new(RefCell::new(TileLog::default()));
    let draws = DrawLog::default();
    let source = TilesetSource::new("missing.json", |uri: &str| {
        LoadErr {
            uri,
            message: "not found",
        }
        .fail()
    });

    let mut manager = LayerManager::new(GpuContext::headless());
    manager
        .set_layers(vec![Box::new(tile_layer(source, &log, &draws))])
        .unwrap();
    let failed = log.clone();
    run_until(&mut manager, move |_| !failed.borrow().failed.is_empty());

    assert_eq!(log.borrow().failed, ["missing.json"]);
    assert_eq!(manager.get_layers(None).len(), 1);
    assert!(log.borrow().tilesets.is_empty());
}

#[test]
fn pending_tileset_does_not_redraw() {
    let log = Rc::new(RefCell::new(TileLog::default()));
    let draws = DrawLog::default();
    let unload = Arc::new(Mutex::new(Vec::new()));
    let source = TilesetSource::new("slow.json", move |_uri: &str| {
        thread::sleep(std::time::Duration::from_millis(300));
        let tileset = GridTileset::new(&[("a.pnts", vec![0.0, 0.0])], &unload);
        Ok(Box::new(tileset) as Box<dyn Tileset>)
    });

    let mut manager = LayerManager::new(GpuContext::headless());
    manager
        .set_layers(vec![Box::new(tile_layer(source, &log, &draws))])
        .unwrap();
    manager.update_layers(ms(0)).unwrap();
    assert!(manager.needs_redraw(true).is_some());

    let redraws = (1..=10)
        .filter(|frame| {
            manager.update_layers(ms(*frame)).unwrap();
            manager.needs_redraw(true).is_some()
        })
        .count();
    assert_eq!(redraws, 0);
    assert!(log.borrow().tilesets.is_empty());

    let loaded = log.clone();
    run_until(&mut manager, move |_| !loaded.borrow().tilesets.is_empty());
    assert!(manager.needs_redraw(true).is_some());
}

use crate::tiles::{LoadErr, Result, TileError, UnsupportedContentErr};
use crate::views::Viewport;
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use snafu::OptionExt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileContentKind {
    Points,
    Batched,
    Instanced,
}

impl FromStr for TileContentKind {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pnts" => Ok(TileContentKind::Points),
            "b3dm" => Ok(TileContentKind::Batched),
            "i3dm" => Ok(TileContentKind::Instanced),
            _ => UnsupportedContentErr { kind: s }.fail(),
        }
    }
}

impl TileContentKind {
    /// Reads the kind from the extension of a tile uri.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let extension = path
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .context(UnsupportedContentErr { kind: uri })?;
        extension.to_ascii_lowercase().parse()
    }
}

/// Decoded tile content.
#[derive(Debug, Clone, PartialEq)]
pub struct TileContent {
    pub kind: TileContentKind,
    /// Interleaved `x, y` world positions.
    pub positions: Vec<f32>,
}

impl TileContent {
    pub fn point_count(&self) -> usize {
        self.positions.len() / 2
    }
}

#[derive(Debug, Clone)]
pub struct TileHeader {
    pub uri: String,
    /// Frame number of the last tileset update that selected this tile.
    pub selected_frame: u64,
    /// `None` until loaded and again after the content was unloaded.
    pub content: Option<Arc<TileContent>>,
}

impl TileHeader {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            selected_frame: 0,
            content: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum TileEvent {
    Loaded(TileHeader),
    Unloaded(TileHeader),
    LoadFailed { uri: String, error: TileError },
}

/// A hierarchy of tiles that streams content in for the current viewport.
pub trait Tileset: Send {
    /// Hands over the channel tile events are sent through.
    fn attach(&mut self, events: Sender<TileEvent>);

    /// Selects the tiles `viewport` needs and returns the frame number of the selection.
    fn update(&mut self, viewport: &Viewport) -> u64;

    fn tiles(&self) -> &[TileHeader];
}

pub type TilesetResult = Result<Box<dyn Tileset>>;

pub enum LoadState<T> {
    Pending,
    Loaded(T),
    Failed(TileError),
}

/// Loads a tileset on a worker thread.
#[derive(Debug)]
pub struct TilesetLoader {
    uri: String,
    receiver: Receiver<TilesetResult>,
    failed: Option<TileError>,
    done: bool,
}

impl TilesetLoader {
    pub fn spawn<F>(uri: impl Into<String>, load: F) -> Self
    where
        F: FnOnce(&str) -> TilesetResult + Send + 'static,
    {
        let uri = uri.into();
        let (sender, receiver) = bounded(1);
        let thread_uri = uri.clone();
        let spawned = thread::Builder::new()
            .name("tileset-loader".to_string())
            .spawn(move || {
                trace!("Loading tileset {thread_uri}");
                let _ = sender.send(load(&thread_uri));
            });

        let failed = spawned.err().map(|e| TileError::Load {
            uri: uri.clone(),
            message: e.to_string(),
        });
        Self {
            uri,
            receiver,
            failed,
            done: false,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn is_pending(&self) -> bool {
        !self.done
    }

    /// Checks on the worker. Reports `Loaded` or `Failed` once, `Pending` before and after.
    pub fn poll(&mut self) -> LoadState<Box<dyn Tileset>> {
        if self.done {
            return LoadState::Pending;
        }
        if let Some(error) = self.failed.take() {
            self.done = true;
            return LoadState::Failed(error);
        }

        let state = match self.receiver.try_recv() {
            Ok(Ok(tileset)) => LoadState::Loaded(tileset),
            Ok(Err(error)) => LoadState::Failed(error),
            Err(TryRecvError::Empty) => return LoadState::Pending,
            Err(TryRecvError::Disconnected) => LoadState::Failed(
                LoadErr {
                    uri: self.uri.as_str(),
                    message: "loader exited without a result",
                }
                .build(),
            ),
        };
        debug!("Tileset {} finished loading", self.uri);
        self.done = true;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_kinds() {
        assert_eq!("pnts".parse::<TileContentKind>().unwrap(), TileContentKind::Points);
        assert_eq!(
            TileContentKind::from_uri("tiles/0/1.B3DM?v=2").unwrap(),
            TileContentKind::Batched
        );
        assert!(matches!(
            "glb".parse::<TileContentKind>(),
            Err(TileError::UnsupportedContent { .. })
        ));
        assert!(TileContentKind::from_uri("tiles/root").is_err());
    }

    #[test]
    fn loader_reports_failures_once() {
        let mut loader = TilesetLoader::spawn("broken.json", |uri| {
            LoadErr {
                uri,
                message: "404",
            }
            .fail()
        });

        let mut failed = false;
        for _ in 0..1000 {
            match loader.poll() {
                LoadState::Failed(TileError::Load { message, .. }) => {
                    assert_eq!(message, "404");
                    failed = true;
                    break;
                }
                LoadState::Pending => thread::sleep(std::time::Duration::from_millis(1)),
                LoadState::Failed(error) => panic!("unexpected error {error}"),
                LoadState::Loaded(_) => panic!("a broken tileset loaded"),
            }
        }
        assert!(failed);
        assert!(!loader.is_pending());
        assert!(matches!(loader.poll(), LoadState::Pending));
    }
}

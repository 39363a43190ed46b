//! Shared test helpers for realtime tests.

#![allow(dead_code)]

use bunkerline_realtime::transport::memory::LocalRelay;
use bunkerline_realtime::{
    BroadcastHub, ChannelFrame, ChannelHandle, ChannelOptions, ChannelTransport, ClientId,
    FrameHandler, HubConfig, Identified, StatusHandler, SyncEvent, SyncResult,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub const CHANNEL: &str = "test-sync";

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal entity for reducer tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Item {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn bare(id: &str) -> Self {
        Self::new(id, "")
    }
}

impl Identified for Item {
    fn id(&self) -> &str {
        &self.id
    }
}

pub fn ids<T: Identified>(items: &[T]) -> Vec<&str> {
    items.iter().map(|i| i.id()).collect()
}

pub fn client(id: &str) -> ClientId {
    ClientId::parse(id).unwrap()
}

/// A connected hub with a fixed identity on the shared test channel.
pub fn connected_hub(relay: &Arc<LocalRelay>, id: &str) -> Arc<BroadcastHub> {
    let hub =
        BroadcastHub::with_client_id(relay.clone(), HubConfig::for_channel(CHANNEL), client(id));
    hub.connect().unwrap();
    Arc::new(hub)
}

/// Frame as a peer hub with identity `sender` would send it.
pub fn peer_frame(kind: &str, payload: serde_json::Value, sender: &str) -> ChannelFrame {
    let event = SyncEvent::new(kind, payload, client(sender));
    ChannelFrame::new(kind, serde_json::to_value(&event).unwrap())
}

/// Records every event delivered to it.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl Recorder {
    pub fn callback(&self) -> impl Fn(&SyncEvent) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event: &SyncEvent| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

/// Handlers registered on one opened channel, in open order.
#[derive(Clone, Default)]
pub struct OpenedChannel {
    pub frame_handlers: Vec<FrameHandler>,
    pub status_handlers: Vec<StatusHandler>,
}

/// Wraps a [`LocalRelay`] and keeps every handler registered through it,
/// so tests can fire callbacks of channels that were already released.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub relay: LocalRelay,
    opened: Arc<Mutex<Vec<OpenedChannel>>>,
}

impl RecordingTransport {
    pub fn opened(&self, index: usize) -> OpenedChannel {
        self.opened.lock().unwrap()[index].clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl ChannelTransport for RecordingTransport {
    fn open(&self, name: &str, options: ChannelOptions) -> SyncResult<Arc<dyn ChannelHandle>> {
        let inner = self.relay.open(name, options)?;
        let index = {
            let mut opened = self.opened.lock().unwrap();
            opened.push(OpenedChannel::default());
            opened.len() - 1
        };
        Ok(Arc::new(RecordingHandle {
            inner,
            index,
            opened: self.opened.clone(),
        }))
    }
}

struct RecordingHandle {
    inner: Arc<dyn ChannelHandle>,
    index: usize,
    opened: Arc<Mutex<Vec<OpenedChannel>>>,
}

impl ChannelHandle for RecordingHandle {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn on_broadcast(&self, handler: FrameHandler) {
        self.opened.lock().unwrap()[self.index].frame_handlers.push(handler.clone());
        self.inner.on_broadcast(handler);
    }

    fn on_status(&self, handler: StatusHandler) {
        self.opened.lock().unwrap()[self.index].status_handlers.push(handler.clone());
        self.inner.on_status(handler);
    }

    fn subscribe(&self) -> SyncResult<()> {
        self.inner.subscribe()
    }

    fn send(&self, frame: ChannelFrame) -> SyncResult<()> {
        self.inner.send(frame)
    }

    fn close(&self) {
        self.inner.close();
    }
}

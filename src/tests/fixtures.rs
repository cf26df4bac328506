// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Shared test helpers.

use core::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::canvas::drawer::CanvasDrawer;
use crate::canvas::model::CanvasModel;
use crate::config::HistoryConfig;
use crate::error::{RasterError, ReconciliationError};
use crate::event::{CanvasEvent, EventKind};
use crate::history::{HistoryManager, HistoryObserver};
use crate::interpreter::CommandInterpreter;
use crate::proxy::{CanvasProxy, CanvasProxyFactory, SharedFactory};
use crate::raster::{Bitmap, BitmapFactory};
use crate::snapshot::hash::hash_model;
use crate::state::command::DrawCommand;
use crate::types::geometry::{Color, Position, Size};
use crate::types::id::{EventId, LayerId, UserId};
use crate::validator::CommandValidator;

pub const SIZE: Size = Size::new(24, 24);

pub fn factory() -> SharedFactory {
    Arc::new(BitmapFactory)
}

pub fn user(name: &str) -> UserId {
    UserId::from(name)
}

pub fn line(x0: i32, y0: i32, x1: i32, y1: i32, color: Color) -> DrawCommand {
    DrawCommand::Stroke {
        positions: vec![Position::new(x0, y0), Position::new(x1, y1)],
        color,
        width: 3,
    }
}

pub fn drawn(id: u64, who: &str, layer: u32, draw: DrawCommand) -> CanvasEvent {
    CanvasEvent::new(
        EventId(id),
        user(who),
        EventKind::LayerDrawn {
            layer_id: LayerId(layer),
            draw,
        },
    )
}

pub fn revoked(id: u64, who: &str, target: u64) -> CanvasEvent {
    CanvasEvent::new(EventId(id), user(who), EventKind::EventRevoked { event_id: EventId(target) })
}

pub fn restored(id: u64, who: &str, target: u64) -> CanvasEvent {
    CanvasEvent::new(EventId(id), user(who), EventKind::EventRestored { event_id: EventId(target) })
}

pub fn blank_model(layers: u32) -> CanvasModel {
    CanvasModel::with_layers(SIZE, layers, &BitmapFactory)
}

pub fn history(layers: u32) -> HistoryManager {
    history_with(layers, HistoryConfig::default())
}

pub fn history_with(layers: u32, config: HistoryConfig) -> HistoryManager {
    HistoryManager::new(blank_model(layers), factory(), config).unwrap()
}

/// History and interpreter as a room would hold them.
pub fn authority(layers: u32) -> (HistoryManager, CommandInterpreter) {
    let history = history(layers);
    let interpreter = CommandInterpreter::resume(&history, CommandValidator::default());
    (history, interpreter)
}

/// Flattened composite of every visible layer.
pub fn composite(drawer: &CanvasDrawer) -> Vec<u8> {
    let mut target = Bitmap::new(drawer.model().size());
    drawer.render(&mut target).unwrap();
    target.serialize_to_bytes()
}

pub fn model_hash(model: &CanvasModel) -> [u8; 32] {
    hash_model(model)
}

/// Observer that records notifications as strings.
#[derive(Clone, Default)]
pub struct Recorder {
    pub log: Arc<Mutex<Vec<String>>>,
    tag: &'static str,
}

impl Recorder {
    pub fn tagged(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { log, tag }
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(format!("{}{}", self.tag, entry));
    }
}

impl HistoryObserver for Recorder {
    fn on_event(&mut self, event: &CanvasEvent) {
        self.push(format!("event {}", event.id));
    }

    fn on_history_changed(&mut self) {
        self.push("changed".to_string());
    }

    fn on_history_wiped(&mut self, evicted: &[CanvasEvent]) {
        self.push(format!("wiped {}", evicted.len()));
    }

    fn on_history_broken(&mut self, _error: &ReconciliationError) {
        self.push("broken".to_string());
    }
}

/// Bitmap whose strokes fail while the shared switch is armed.
#[derive(Debug)]
pub struct FaultyProxy {
    inner: Bitmap,
    armed: Arc<AtomicBool>,
}

impl CanvasProxy for FaultyProxy {
    fn size(&self) -> Size {
        self.inner.size()
    }

    fn stroke(&mut self, positions: &[Position], color: Color, width: u32) -> Result<(), RasterError> {
        if self.armed.load(Ordering::SeqCst) {
            return Err(RasterError::Backend("injected fault".to_string()));
        }
        self.inner.stroke(positions, color, width)
    }

    fn erase(&mut self, positions: &[Position], opacity: u8, width: u32) -> Result<(), RasterError> {
        self.inner.erase(positions, opacity, width)
    }

    fn clear(&mut self) -> Result<(), RasterError> {
        self.inner.clear()
    }

    fn fill_rect(&mut self, position: Position, size: Size, color: Color) -> Result<(), RasterError> {
        self.inner.fill_rect(position, size, color)
    }

    fn composite_from(&mut self, other: &dyn CanvasProxy) -> Result<(), RasterError> {
        match other.as_any().downcast_ref::<FaultyProxy>() {
            Some(faulty) => self.inner.composite_from(&faulty.inner),
            None => self.inner.composite_from(other),
        }
    }

    fn serialize_to_bytes(&self) -> Vec<u8> {
        self.inner.serialize_to_bytes()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default)]
pub struct FaultyFactory {
    pub armed: Arc<AtomicBool>,
}

impl FaultyFactory {
    pub fn arm(&self, on: bool) {
        self.armed.store(on, Ordering::SeqCst);
    }
}

impl CanvasProxyFactory for FaultyFactory {
    fn create(&self, size: Size) -> Box<dyn CanvasProxy> {
        Box::new(FaultyProxy {
            inner: Bitmap::new(size),
            armed: self.armed.clone(),
        })
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Box<dyn CanvasProxy>, RasterError> {
        Ok(Box::new(FaultyProxy {
            inner: Bitmap::from_bytes(bytes)?,
            armed: self.armed.clone(),
        }))
    }
}

/// History over fault-injecting surfaces, plus the factory to arm them.
pub fn faulty_history(layers: u32, config: HistoryConfig) -> (HistoryManager, Arc<FaultyFactory>) {
    let faulty = Arc::new(FaultyFactory::default());
    let model = CanvasModel::with_layers(SIZE, layers, faulty.as_ref());
    let shared: SharedFactory = faulty.clone();
    (HistoryManager::new(model, shared, config).unwrap(), faulty)
}

/// A simple deterministic RNG for tests.
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed, inc: 1 }
    }

    pub fn next_u32(&mut self) -> u32 {
        let oldstate = self.state;
        self.state = oldstate.wrapping_mul(6364136223846793005).wrapping_add(self.inc);
        let xorshifted = (((oldstate >> 18) ^ oldstate) >> 27) as u32;
        let rot = (oldstate >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fixed-cadence compositor.
//!
//! Each tick takes the newest `RenderFrame` and the newest preview stroke and
//! composites them into an output surface. Previews go through a
//! `PreviewOverlay`, so committed layers are only ever read.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use easel_kernel::canvas::preview::PreviewOverlay;
use easel_kernel::error::KernelError;
use easel_kernel::proxy::CanvasProxy;
use easel_kernel::state::command::DrawCommand;
use easel_kernel::types::id::LayerId;

use crate::client::RenderFrame;
use crate::errors::NodeError;

/// An uncommitted draw the user is still making.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewStroke {
    pub layer: LayerId,
    pub draw: DrawCommand,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub ticks: u64,
    pub presented: u64,
    pub failures: u64,
}

pub struct Compositor {
    frames: watch::Receiver<Arc<RenderFrame>>,
    previews: watch::Receiver<Option<PreviewStroke>>,
    output: watch::Sender<Arc<Vec<u8>>>,
    overlay: Option<PreviewOverlay>,
    target: Option<Box<dyn CanvasProxy>>,
    last: Option<(u64, Option<PreviewStroke>)>,
}

impl Compositor {
    pub fn new(
        frames: watch::Receiver<Arc<RenderFrame>>,
        previews: watch::Receiver<Option<PreviewStroke>>,
        output: watch::Sender<Arc<Vec<u8>>>,
    ) -> Self {
        Self {
            frames,
            previews,
            output,
            overlay: None,
            target: None,
            last: None,
        }
    }

    /// Ticks every `interval` until the frame source goes away.
    pub async fn run(mut self, interval: Duration) -> RenderStats {
        let mut stats = RenderStats::default();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.frames.has_changed().is_err() {
                break;
            }
            stats.ticks += 1;
            match self.tick() {
                Ok(true) => stats.presented += 1,
                Ok(false) => {}
                Err(e) => {
                    stats.failures += 1;
                    tracing::warn!("Render: frame skipped: {}", e);
                }
            }
        }
        tracing::debug!("Render loop stopped after {} ticks", stats.ticks);
        stats
    }

    /// Composites once. Returns false when nothing changed since the last output.
    pub fn tick(&mut self) -> Result<bool, NodeError> {
        let frame = self.frames.borrow_and_update().clone();
        let preview = self.previews.borrow_and_update().clone();

        let key = (frame.generation, preview.clone());
        if self.last.as_ref() == Some(&key) {
            return Ok(false);
        }

        let drawer = &frame.drawer;
        let size = drawer.model().size();
        let target = match self.target.take() {
            Some(t) if t.size() == size => t,
            _ => drawer.factory().create(size),
        };
        let target = self.target.insert(target);

        match preview.as_ref().filter(|p| drawer.model().contains(p.layer)) {
            Some(stroke) => {
                let overlay = match self.overlay.take() {
                    Some(mut o) if o.layer() == stroke.layer => {
                        if o.is_stale(frame.generation) {
                            o.refresh(drawer, frame.generation).map_err(KernelError::from)?;
                        }
                        o
                    }
                    _ => PreviewOverlay::begin(drawer, stroke.layer, frame.generation).map_err(KernelError::from)?,
                };
                let overlay = self.overlay.insert(overlay);
                if overlay.draw_command() != Some(&stroke.draw) {
                    overlay.update(drawer, stroke.draw.clone()).map_err(KernelError::from)?;
                }
                overlay.render(drawer, target.as_mut()).map_err(KernelError::from)?;
            }
            None => {
                if let Some(done) = self.overlay.take() {
                    done.end();
                }
                drawer.render(target.as_mut()).map_err(KernelError::from)?;
            }
        }

        self.output.send_replace(Arc::new(target.serialize_to_bytes()));
        self.last = Some(key);
        Ok(true)
    }
}

/// Spawns a compositor and returns the channel carrying its output pixels.
pub fn spawn_render_loop(
    frames: watch::Receiver<Arc<RenderFrame>>,
    previews: watch::Receiver<Option<PreviewStroke>>,
    interval: Duration,
) -> (watch::Receiver<Arc<Vec<u8>>>, tokio::task::JoinHandle<RenderStats>) {
    let (output, output_rx) = watch::channel(Arc::new(Vec::new()));
    let handle = tokio::spawn(Compositor::new(frames, previews, output).run(interval));
    (output_rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_kernel::canvas::drawer::CanvasDrawer;
    use easel_kernel::canvas::model::CanvasModel;
    use easel_kernel::raster::BitmapFactory;
    use easel_kernel::snapshot::hash::hash_model;
    use easel_kernel::types::geometry::{Color, Position, Size};

    fn frame(generation: u64, drawer: CanvasDrawer) -> Arc<RenderFrame> {
        let hash = hash_model(drawer.model());
        Arc::new(RenderFrame { generation, drawer, hash })
    }

    fn stroke(layer: u32) -> PreviewStroke {
        PreviewStroke {
            layer: LayerId(layer),
            draw: DrawCommand::Stroke {
                positions: vec![Position::new(0, 4), Position::new(15, 4)],
                color: Color::rgb(250, 0, 0),
                width: 2,
            },
        }
    }

    fn drawer() -> CanvasDrawer {
        let model = CanvasModel::with_layers(Size::new(16, 16), 2, &BitmapFactory);
        CanvasDrawer::new(model, Arc::new(BitmapFactory))
    }

    #[test]
    fn test_preview_never_touches_committed_layers() {
        let committed = drawer();
        let before = hash_model(committed.model());
        let (_frames_tx, frames) = watch::channel(frame(1, committed));
        let (previews_tx, previews) = watch::channel(None);
        let (output, output_rx) = watch::channel(Arc::new(Vec::new()));
        let mut compositor = Compositor::new(frames.clone(), previews, output);

        assert!(compositor.tick().unwrap());
        let plain = output_rx.borrow().clone();

        previews_tx.send_replace(Some(stroke(0)));
        assert!(compositor.tick().unwrap());
        assert_ne!(*output_rx.borrow(), plain);
        assert_eq!(hash_model(frames.borrow().drawer.model()), before);

        previews_tx.send_replace(None);
        assert!(compositor.tick().unwrap());
        assert_eq!(*output_rx.borrow(), plain);
    }

    #[test]
    fn test_unchanged_inputs_skip_compositing() {
        let (_frames_tx, frames) = watch::channel(frame(1, drawer()));
        let (_previews_tx, previews) = watch::channel(Some(stroke(1)));
        let (output, _output_rx) = watch::channel(Arc::new(Vec::new()));
        let mut compositor = Compositor::new(frames, previews, output);

        assert!(compositor.tick().unwrap());
        assert!(!compositor.tick().unwrap());
    }

    #[test]
    fn test_preview_of_missing_layer_renders_plain_frame() {
        let (_frames_tx, frames) = watch::channel(frame(1, drawer()));
        let (_previews_tx, previews) = watch::channel(Some(stroke(9)));
        let (output, output_rx) = watch::channel(Arc::new(Vec::new()));
        let mut compositor = Compositor::new(frames, previews, output);

        assert!(compositor.tick().unwrap());
        assert!(output_rx.borrow().len() > 0);
    }
}

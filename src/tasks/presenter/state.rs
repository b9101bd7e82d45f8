//! Double-buffered presenter state: two layers, a front index, timed opacity
//! fades and the request sequence used to drop stale decode results.
//!
//! Everything here is synchronous and takes `now` explicitly; the async
//! driver in `tasks::presenter` owns the clock, the surface and the decode
//! workers.

use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{DecodeError, Error};
use crate::events::{PresentRequest, PresenterPhase, PresenterStatus};
use crate::item::{Rotation, SharedImage};
use crate::monitor::{self, MonitorGeometry};
use crate::processing::compose::{FittedLayer, blank_canvas, blend_layer, fit_layer};
use crate::processing::layout::canvas_size;

/// Identifies one `present` call. Only the most recently issued ticket of the
/// current presenter generation may change the layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentTicket {
    pub generation: u64,
    pub seq: u64,
    pub path: PathBuf,
    pub rotation: Rotation,
    pub fade: Duration,
    /// Canvas the layer should be fitted to, as known when the ticket was issued.
    pub canvas: (u32, u32),
}

/// Decoded preview plus its canvas fit, produced off the rendering context.
#[derive(Debug, Clone)]
pub struct PreparedLayer {
    source: SharedImage,
    fitted: FittedLayer,
    canvas: (u32, u32),
}

impl PreparedLayer {
    pub fn prepare(ticket: &PresentTicket, source: SharedImage) -> Result<Self, DecodeError> {
        let (w, h) = ticket.canvas;
        let fitted = fit_layer(&source, ticket.rotation, w, h).map_err(|err| {
            DecodeError::Resize {
                path: ticket.path.clone(),
                reason: format!("{err:#}"),
            }
        })?;
        Ok(Self {
            source,
            fitted,
            canvas: ticket.canvas,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was loaded and its crossfade started.
    Applied,
    /// A newer request was issued after this one; nothing changed.
    Stale,
    /// Decode failed; the previous image stays up.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Opacity {
    Settled(f32),
    Fading {
        from: f32,
        to: f32,
        started: Instant,
        duration: Duration,
    },
}

impl Default for Opacity {
    fn default() -> Self {
        Opacity::Settled(0.0)
    }
}

impl Opacity {
    fn fade(from: f32, to: f32, started: Instant, duration: Duration) -> Self {
        Opacity::Fading {
            from,
            to,
            started,
            duration,
        }
    }

    fn at(&self, now: Instant) -> f32 {
        match *self {
            Opacity::Settled(value) => value,
            Opacity::Fading {
                from,
                to,
                started,
                duration,
            } => {
                if duration.is_zero() {
                    return to;
                }
                let elapsed = now.saturating_duration_since(started).as_secs_f32();
                let t = (elapsed / duration.as_secs_f32()).clamp(0.0, 1.0);
                from + (to - from) * t
            }
        }
    }

    /// Collapse a finished fade into its end value. Returns true if it did.
    fn settle(&mut self, now: Instant) -> bool {
        if let Opacity::Fading {
            to,
            started,
            duration,
            ..
        } = *self
            && now.saturating_duration_since(started) >= duration
        {
            *self = Opacity::Settled(to);
            return true;
        }
        false
    }

    fn is_fading(&self) -> bool {
        matches!(self, Opacity::Fading { .. })
    }
}

#[derive(Debug, Default)]
struct Layer {
    path: Option<PathBuf>,
    rotation: Rotation,
    source: Option<SharedImage>,
    fitted: Option<FittedLayer>,
    opacity: Opacity,
}

impl Layer {
    fn clear(&mut self) {
        *self = Layer::default();
    }
}

/// Live presenter: exists between `turn_on` and `turn_off`.
#[derive(Debug)]
pub struct Presenter {
    layers: [Layer; 2],
    front: usize,
    generation: u64,
    issued: u64,
    black: bool,
    monitor_index: usize,
    geometry: MonitorGeometry,
    oversample: f32,
    canvas: (u32, u32),
    /// Path to report once the running crossfade settles.
    settling: Option<PathBuf>,
}

impl Presenter {
    /// Create an idle presenter on `monitor_index`, clamped to the first
    /// display when out of range.
    pub fn turn_on(
        monitors: &[MonitorGeometry],
        monitor_index: usize,
        oversample: f32,
        generation: u64,
    ) -> Result<Self, Error> {
        let (index, geometry) = monitor::resolve(monitors, monitor_index)?;
        if index != monitor_index {
            warn!(requested = monitor_index, "monitor index out of range; using {index}");
        }
        Ok(Self {
            layers: Default::default(),
            front: 0,
            generation,
            issued: 0,
            black: false,
            monitor_index: index,
            geometry,
            oversample,
            canvas: canvas_size(geometry.width, geometry.height, oversample),
            settling: None,
        })
    }

    /// Move to another display. Black state and loaded images are kept;
    /// layers are refitted when the canvas size changes.
    pub fn retarget(
        &mut self,
        monitors: &[MonitorGeometry],
        monitor_index: usize,
    ) -> Result<(usize, MonitorGeometry), Error> {
        let (index, geometry) = monitor::resolve(monitors, monitor_index)?;
        self.monitor_index = index;
        self.geometry = geometry;
        let canvas = canvas_size(geometry.width, geometry.height, self.oversample);
        if canvas != self.canvas {
            self.canvas = canvas;
            for layer in &mut self.layers {
                refit(layer, canvas);
            }
        }
        Ok((index, geometry))
    }

    /// Returns true if the flag changed.
    pub fn set_black(&mut self, black: bool) -> bool {
        mem::replace(&mut self.black, black) != black
    }

    /// Issue a ticket for a new request, superseding every earlier one.
    pub fn request(&mut self, request: PresentRequest) -> PresentTicket {
        self.issued += 1;
        PresentTicket {
            generation: self.generation,
            seq: self.issued,
            path: request.path,
            rotation: request.rotation,
            fade: request.fade,
            canvas: self.canvas,
        }
    }

    pub fn is_current(&self, ticket: &PresentTicket) -> bool {
        ticket.generation == self.generation && ticket.seq == self.issued
    }

    /// Apply a finished decode. The new image goes into the back layer at
    /// opacity 0 and fades in while the old front fades out from wherever it
    /// currently is; the roles flip immediately so a later request preempts
    /// this one cleanly.
    pub fn complete(
        &mut self,
        ticket: &PresentTicket,
        result: Result<PreparedLayer, DecodeError>,
        now: Instant,
    ) -> PresentOutcome {
        if !self.is_current(ticket) {
            debug!(path = %ticket.path.display(), seq = ticket.seq, latest = self.issued, "stale present discarded");
            return PresentOutcome::Stale;
        }
        let prepared = match result {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!("preview unavailable, keeping current image: {err}");
                return PresentOutcome::Failed;
            }
        };

        let outgoing = self.front;
        let incoming = 1 - outgoing;
        let out_from = self.layers[outgoing].opacity.at(now);
        self.layers[outgoing].opacity = Opacity::fade(out_from, 0.0, now, ticket.fade);

        let layer = &mut self.layers[incoming];
        layer.path = Some(ticket.path.clone());
        layer.rotation = ticket.rotation;
        layer.source = Some(prepared.source);
        layer.fitted = Some(prepared.fitted);
        layer.opacity = Opacity::fade(0.0, 1.0, now, ticket.fade);
        if prepared.canvas != self.canvas {
            refit(layer, self.canvas);
        }

        self.front = incoming;
        self.settling = Some(ticket.path.clone());
        PresentOutcome::Applied
    }

    /// Advance animations. Returns the front path when its crossfade has
    /// just finished.
    pub fn tick(&mut self, now: Instant) -> Option<PathBuf> {
        let front = self.front;
        let mut front_settled = false;
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            if !layer.opacity.settle(now) {
                continue;
            }
            if idx == front {
                front_settled = true;
            } else if layer.opacity == Opacity::Settled(0.0) {
                layer.clear();
            }
        }
        if front_settled || !self.layers[front].opacity.is_fading() {
            return self.settling.take();
        }
        None
    }

    pub fn is_animating(&self) -> bool {
        self.settling.is_some() || self.layers.iter().any(|l| l.opacity.is_fading())
    }

    pub fn phase(&self) -> PresenterPhase {
        if self.black {
            PresenterPhase::Black
        } else if self.layers[self.front].source.is_some() {
            PresenterPhase::Showing
        } else {
            PresenterPhase::Idle
        }
    }

    pub fn is_black(&self) -> bool {
        self.black
    }

    pub fn front_path(&self) -> Option<&Path> {
        self.layers[self.front].path.as_deref()
    }

    pub fn front_rotation(&self) -> Rotation {
        self.layers[self.front].rotation
    }

    pub fn monitor(&self) -> (usize, MonitorGeometry) {
        (self.monitor_index, self.geometry)
    }

    pub fn canvas(&self) -> (u32, u32) {
        self.canvas
    }

    pub fn status(&self) -> PresenterStatus {
        PresenterStatus {
            phase: self.phase(),
            front: self.front_path().map(Path::to_path_buf),
            black: self.black,
            monitor: Some(self.monitor()),
            animating: self.is_animating(),
        }
    }

    /// Render the visible frame: back layer, then front layer, over black.
    /// A blacked-out presenter renders only black.
    pub fn compose(&self, now: Instant) -> RgbaImage {
        let (w, h) = self.canvas;
        let mut canvas = blank_canvas(w, h);
        if self.black {
            return canvas;
        }
        for idx in [1 - self.front, self.front] {
            let layer = &self.layers[idx];
            if let Some(fitted) = &layer.fitted {
                blend_layer(&mut canvas, fitted, layer.opacity.at(now));
            }
        }
        canvas
    }
}

fn refit(layer: &mut Layer, (w, h): (u32, u32)) {
    let Some(source) = &layer.source else {
        return;
    };
    match fit_layer(source, layer.rotation, w, h) {
        Ok(fitted) => layer.fitted = Some(fitted),
        Err(err) => {
            warn!("failed to refit layer: {err:#}");
            layer.fitted = None;
        }
    }
}

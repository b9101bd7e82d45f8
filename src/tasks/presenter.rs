//! Presenter task: owns the surface and the two-layer state, runs preview
//! decodes on blocking workers and paces crossfade frames.

pub mod state;

use std::time::{Duration, Instant};

use anyhow::Result;
use image::RgbaImage;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{DecodeError, Error};
use crate::events::{
    PresentRequest, PresenterCommand, PresenterEvent, PresenterStatus, Reply,
};
use crate::monitor::{MonitorGeometry, MonitorSource};
use crate::processing::decode::{PREVIEW_MAX_HEIGHT, PREVIEW_MAX_WIDTH, decode_preview};

use self::state::{PreparedLayer, PresentOutcome, PresentTicket, Presenter};

/// Roughly 60 frames per second while a crossfade runs.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Where composed frames go. Dropping the surface destroys it.
pub trait Surface: Send {
    /// Position the surface over `geometry`.
    fn place(&mut self, geometry: &MonitorGeometry);
    fn show_frame(&mut self, frame: &RgbaImage);
}

/// Surface without a window: keeps the last frame size and counts frames.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    geometry: Option<MonitorGeometry>,
    frames: u64,
    last_size: (u32, u32),
}

impl Surface for HeadlessSurface {
    fn place(&mut self, geometry: &MonitorGeometry) {
        debug!(%geometry, "surface placed");
        self.geometry = Some(*geometry);
    }

    fn show_frame(&mut self, frame: &RgbaImage) {
        self.frames += 1;
        if self.last_size != frame.dimensions() {
            self.last_size = frame.dimensions();
            debug!(width = frame.width(), height = frame.height(), "frame size changed");
        }
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        match self.geometry {
            Some(geometry) => debug!(frames = self.frames, %geometry, "surface destroyed"),
            None => debug!(frames = self.frames, "surface destroyed"),
        }
    }
}

/// Cloneable front end for the presenter task.
#[derive(Debug, Clone)]
pub struct PresenterHandle {
    tx: mpsc::Sender<PresenterCommand>,
}

impl PresenterHandle {
    pub fn new(tx: mpsc::Sender<PresenterCommand>) -> Self {
        Self { tx }
    }

    pub async fn turn_on(&self, monitor_index: usize) -> Result<MonitorGeometry, Error> {
        self.call(|reply| PresenterCommand::TurnOn {
            monitor_index,
            reply,
        })
        .await
    }

    pub async fn retarget(&self, monitor_index: usize) -> Result<MonitorGeometry, Error> {
        self.call(|reply| PresenterCommand::Retarget {
            monitor_index,
            reply,
        })
        .await
    }

    /// Queue a present and return without waiting for the decode.
    pub async fn present(&self, request: PresentRequest) -> Result<(), Error> {
        self.send(PresenterCommand::Present(request)).await
    }

    pub async fn set_black(&self, black: bool) -> Result<(), Error> {
        self.send(PresenterCommand::SetBlack(black)).await
    }

    pub async fn turn_off(&self) -> Result<(), Error> {
        self.send(PresenterCommand::TurnOff).await
    }

    pub async fn snapshot(&self) -> Result<Option<RgbaImage>, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(PresenterCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| Error::PresenterClosed)
    }

    pub async fn status(&self) -> Result<PresenterStatus, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(PresenterCommand::Status(tx)).await?;
        rx.await.map_err(|_| Error::PresenterClosed)
    }

    pub async fn monitors(&self) -> Result<Vec<MonitorGeometry>, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(PresenterCommand::Monitors(tx)).await?;
        rx.await.map_err(|_| Error::PresenterClosed)
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> PresenterCommand,
    ) -> Result<T, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| Error::PresenterClosed)?
    }

    async fn send(&self, cmd: PresenterCommand) -> Result<(), Error> {
        self.tx.send(cmd).await.map_err(|_| Error::PresenterClosed)
    }
}

struct Live<S> {
    state: Presenter,
    surface: S,
}

impl<S: Surface> Live<S> {
    fn render(&mut self, now: Instant) {
        let frame = self.state.compose(now);
        self.surface.show_frame(&frame);
    }
}

type Decoded = (PresentTicket, Result<PreparedLayer, DecodeError>);

/// Serve presenter commands until cancelled or every handle is dropped.
///
/// `make_surface` is called on each `TurnOn` from `Off`; the surface is
/// dropped on `TurnOff`. Presents are ignored while off.
#[instrument(skip_all, name = "presenter")]
pub async fn run<M, F, S>(
    mut commands: mpsc::Receiver<PresenterCommand>,
    events: mpsc::UnboundedSender<PresenterEvent>,
    monitors: M,
    mut make_surface: F,
    oversample: f32,
    cancel: CancellationToken,
) -> Result<()>
where
    M: MonitorSource,
    F: FnMut(&MonitorGeometry) -> S,
    S: Surface,
{
    let (decoded_tx, mut decoded_rx) = mpsc::unbounded_channel::<Decoded>();
    let mut live: Option<Live<S>> = None;
    let mut generation = 0u64;
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let animating = live.as_ref().is_some_and(|l| l.state.is_animating());
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; presenter exiting");
                break;
            }
            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    debug!("all presenter handles dropped");
                    break;
                };
                match cmd {
                    PresenterCommand::TurnOn { monitor_index, reply } => {
                        let result = if let Some(l) = live.as_mut() {
                            retarget(l, &monitors, monitor_index)
                        } else {
                            generation += 1;
                            match turn_on(&monitors, &mut make_surface, monitor_index, oversample, generation) {
                                Ok((started, geometry)) => {
                                    live = Some(started);
                                    Ok(geometry)
                                }
                                Err(err) => Err(err),
                            }
                        };
                        let _ = reply.send(result);
                    }
                    PresenterCommand::Retarget { monitor_index, reply } => {
                        let result = match live.as_mut() {
                            Some(l) => retarget(l, &monitors, monitor_index),
                            None => Err(Error::PresenterOff),
                        };
                        let _ = reply.send(result);
                    }
                    PresenterCommand::Present(request) => match live.as_mut() {
                        Some(l) => {
                            let ticket = l.state.request(request);
                            debug!(path = %ticket.path.display(), seq = ticket.seq, "present requested");
                            spawn_decode(ticket, decoded_tx.clone());
                        }
                        None => debug!(path = %request.path.display(), "presenter off; present ignored"),
                    },
                    PresenterCommand::SetBlack(black) => match live.as_mut() {
                        Some(l) => {
                            if l.state.set_black(black) {
                                info!(black, "blackout changed");
                                l.render(Instant::now());
                            }
                        }
                        None => debug!(black, "presenter off; blackout ignored"),
                    },
                    PresenterCommand::TurnOff => {
                        if live.take().is_some() {
                            info!("presenter turned off");
                        }
                    }
                    PresenterCommand::Snapshot(reply) => {
                        let frame = live.as_ref().map(|l| l.state.compose(Instant::now()));
                        let _ = reply.send(frame);
                    }
                    PresenterCommand::Status(reply) => {
                        let status = live
                            .as_ref()
                            .map_or_else(PresenterStatus::off, |l| l.state.status());
                        let _ = reply.send(status);
                    }
                    PresenterCommand::Monitors(reply) => {
                        let _ = reply.send(monitors.list_monitors());
                    }
                }
            }
            Some((ticket, result)) = decoded_rx.recv() => {
                let path = ticket.path.clone();
                let Some(l) = live.as_mut() else {
                    let _ = events.send(PresenterEvent::Discarded(path));
                    continue;
                };
                let now = Instant::now();
                match l.state.complete(&ticket, result, now) {
                    PresentOutcome::Applied => {
                        if let Some(shown) = l.state.tick(now) {
                            let _ = events.send(PresenterEvent::Displayed(shown));
                        }
                        l.render(now);
                    }
                    PresentOutcome::Stale => {
                        let _ = events.send(PresenterEvent::Discarded(path));
                    }
                    PresentOutcome::Failed => {
                        let _ = events.send(PresenterEvent::Failed(path));
                    }
                }
            }
            _ = frames.tick(), if animating => {
                if let Some(l) = live.as_mut() {
                    let now = Instant::now();
                    let shown = l.state.tick(now);
                    l.render(now);
                    if let Some(path) = shown {
                        debug!(path = %path.display(), "transition settled");
                        let _ = events.send(PresenterEvent::Displayed(path));
                    }
                }
            }
        }
    }
    Ok(())
}

fn turn_on<M, F, S>(
    monitors: &M,
    make_surface: &mut F,
    monitor_index: usize,
    oversample: f32,
    generation: u64,
) -> Result<(Live<S>, MonitorGeometry), Error>
where
    M: MonitorSource,
    F: FnMut(&MonitorGeometry) -> S,
    S: Surface,
{
    let state = Presenter::turn_on(&monitors.list_monitors(), monitor_index, oversample, generation)?;
    let (index, geometry) = state.monitor();
    let mut surface = make_surface(&geometry);
    surface.place(&geometry);
    let mut live = Live { state, surface };
    live.render(Instant::now());
    info!(index, %geometry, "presenter turned on");
    Ok((live, geometry))
}

fn retarget<M, S>(live: &mut Live<S>, monitors: &M, monitor_index: usize) -> Result<MonitorGeometry, Error>
where
    M: MonitorSource,
    S: Surface,
{
    let (index, geometry) = live.state.retarget(&monitors.list_monitors(), monitor_index)?;
    live.surface.place(&geometry);
    live.render(Instant::now());
    info!(index, %geometry, "presenter retargeted");
    Ok(geometry)
}

fn spawn_decode(ticket: PresentTicket, done: mpsc::UnboundedSender<Decoded>) {
    tokio::spawn(async move {
        let worker_ticket = ticket.clone();
        let result = tokio::task::spawn_blocking(move || {
            let source = decode_preview(&worker_ticket.path, PREVIEW_MAX_WIDTH, PREVIEW_MAX_HEIGHT)?;
            PreparedLayer::prepare(&worker_ticket, source)
        })
        .await
        .unwrap_or_else(|err| {
            Err(DecodeError::Worker {
                path: ticket.path.clone(),
                reason: err.to_string(),
            })
        });
        if let Err(err) = &result {
            warn!("{err}");
        }
        let _ = done.send((ticket, result));
    });
}

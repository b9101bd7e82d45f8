use std::path::PathBuf;
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::item::Rotation;
use crate::monitor::MonitorGeometry;

/// Reply channel for presenter commands that can fail.
pub type Reply<T> = oneshot::Sender<Result<T, Error>>;

/// What to show next: a file, its display rotation and the crossfade length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentRequest {
    pub path: PathBuf,
    pub rotation: Rotation,
    pub fade: Duration,
}

#[derive(Debug)]
pub enum PresenterCommand {
    /// Create the surface on a monitor, or retarget it if it already exists.
    TurnOn {
        monitor_index: usize,
        reply: Reply<MonitorGeometry>,
    },
    Retarget {
        monitor_index: usize,
        reply: Reply<MonitorGeometry>,
    },
    Present(PresentRequest),
    SetBlack(bool),
    TurnOff,
    /// Current composed frame; `None` while off.
    Snapshot(oneshot::Sender<Option<RgbaImage>>),
    Status(oneshot::Sender<PresenterStatus>),
    /// Displays currently known to the presenter.
    Monitors(oneshot::Sender<Vec<MonitorGeometry>>),
}

/// Notifications from the presenter task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    /// A crossfade to this file finished.
    Displayed(PathBuf),
    /// A decode finished after a newer request was issued; its result was dropped.
    Discarded(PathBuf),
    /// The preview could not be decoded; the previous image stays up.
    Failed(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterPhase {
    Off,
    Idle,
    Showing,
    Black,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenterStatus {
    pub phase: PresenterPhase,
    /// File loaded in the front layer, even while blacked out.
    pub front: Option<PathBuf>,
    pub black: bool,
    pub monitor: Option<(usize, MonitorGeometry)>,
    pub animating: bool,
}

impl PresenterStatus {
    pub fn off() -> Self {
        Self {
            phase: PresenterPhase::Off,
            front: None,
            black: false,
            monitor: None,
            animating: false,
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Library error type for scan, monitor and presenter operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The folder to scan is missing, not a directory, or cannot be listed.
    #[error("directory unavailable: {} ({reason})", path.display())]
    DirectoryUnavailable { path: PathBuf, reason: String },

    /// No display could be resolved for presentation.
    #[error("no monitors available for presentation")]
    NoMonitors,

    /// The display is out of range or hosts the control window.
    #[error("monitor {index} is not a presentation target")]
    MonitorUnavailable { index: usize },

    /// The request needs a presenter but presentation is turned off.
    #[error("presenter is off")]
    PresenterOff,

    /// The presenter task has stopped and no longer accepts commands.
    #[error("presenter task is not running")]
    PresenterClosed,

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde settings error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

/// Failure to turn a file into decoded pixels.
///
/// Never fatal: a failed thumbnail leaves the item without one, a failed
/// preview leaves the presenter on its previous image.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to decode JPEG {}: {reason}", path.display())]
    Jpeg { path: PathBuf, reason: String },

    #[error("failed to resize {}: {reason}", path.display())]
    Resize { path: PathBuf, reason: String },

    #[error("decode worker for {} did not complete: {reason}", path.display())]
    Worker { path: PathBuf, reason: String },
}

//! A single photograph in the browsing collection.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use image::{RgbaImage, imageops};

/// Decoded pixels shared between the loader, the collection and the presenter.
pub type SharedImage = Arc<RgbaImage>;

/// Clockwise quarter-turn rotation.
///
/// Stored as an enum so the value is always one of 0/90/180/270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    const ALL: [Self; 4] = [Self::None, Self::Cw90, Self::Cw180, Self::Cw270];

    /// Normalize any degree value into a quarter turn. Values that are not a
    /// multiple of 90 snap down to the previous quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let quarter = degrees.rem_euclid(360) / 90;
        Self::ALL[quarter as usize]
    }

    pub const fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// +90 degrees.
    pub fn clockwise(self) -> Self {
        Self::from_degrees(i32::from(self.degrees()) + 90)
    }

    /// -90 degrees.
    pub fn counter_clockwise(self) -> Self {
        Self::from_degrees(i32::from(self.degrees()) - 90)
    }

    pub fn apply(self, img: &RgbaImage) -> RgbaImage {
        match self {
            Self::None => img.clone(),
            Self::Cw90 => imageops::rotate90(img),
            Self::Cw180 => imageops::rotate180(img),
            Self::Cw270 => imageops::rotate270(img),
        }
    }
}

/// One photograph discovered by a folder scan.
#[derive(Debug, Clone)]
pub struct ImageItem {
    path: PathBuf,
    date_modified: SystemTime,
    thumbnail: Option<SharedImage>,
    rotation: Rotation,
}

impl ImageItem {
    pub fn new(path: PathBuf, date_modified: SystemTime) -> Self {
        Self {
            path,
            date_modified,
            thumbnail: None,
            rotation: Rotation::None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<SharedImage>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the path; the ordinal sort key for `SortKey::FileName`.
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }

    pub fn display_name(&self) -> Cow<'_, str> {
        self.file_name().to_string_lossy()
    }

    pub fn date_modified(&self) -> SystemTime {
        self.date_modified
    }

    pub fn thumbnail(&self) -> Option<&SharedImage> {
        self.thumbnail.as_ref()
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn rotate_clockwise(&mut self) -> Rotation {
        self.rotation = self.rotation.clockwise();
        self.rotation
    }

    pub fn rotate_counter_clockwise(&mut self) -> Rotation {
        self.rotation = self.rotation.counter_clockwise();
        self.rotation
    }
}

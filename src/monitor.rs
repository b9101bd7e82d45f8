//! Display geometry records and monitor index resolution.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow, ensure};

use crate::error::Error;

/// One display, in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorGeometry {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    /// Whether the operator's control window lives on this display.
    pub hosts_control: bool,
}

impl MonitorGeometry {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            hosts_control: false,
        }
    }

    pub const fn hosting_control(mut self) -> Self {
        self.hosts_control = true;
        self
    }
}

impl fmt::Display for MonitorGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{:+}{:+}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Parses X11-style geometry: `WIDTHxHEIGHT+LEFT+TOP` (offsets may be negative).
impl FromStr for MonitorGeometry {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (width, rest) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT+LEFT+TOP, got {s:?}"))?;
        let split = rest
            .find(['+', '-'])
            .ok_or_else(|| anyhow!("missing offsets in geometry {s:?}"))?;
        let (height, offsets) = rest.split_at(split);
        let second = offsets[1..]
            .find(['+', '-'])
            .map(|i| i + 1)
            .ok_or_else(|| anyhow!("missing top offset in geometry {s:?}"))?;
        let (left, top) = offsets.split_at(second);

        let width: u32 = width.parse().context("invalid width")?;
        let height: u32 = height.parse().context("invalid height")?;
        ensure!(width > 0 && height > 0, "geometry {s:?} must have a positive size");
        Ok(Self::new(
            left.parse().context("invalid left offset")?,
            top.parse().context("invalid top offset")?,
            width,
            height,
        ))
    }
}

/// Source of the current display list, in OS order.
pub trait MonitorSource: Send + Sync {
    fn list_monitors(&self) -> Vec<MonitorGeometry>;
}

/// Fixed display list (command line, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticMonitors(pub Vec<MonitorGeometry>);

impl MonitorSource for StaticMonitors {
    fn list_monitors(&self) -> Vec<MonitorGeometry> {
        self.0.clone()
    }
}

/// Map a requested index to a display. Out-of-range indices fall back to the
/// first display; an empty list is an error.
pub fn resolve(
    monitors: &[MonitorGeometry],
    index: usize,
) -> Result<(usize, MonitorGeometry), Error> {
    let first = monitors.first().ok_or(Error::NoMonitors)?;
    Ok(match monitors.get(index) {
        Some(geometry) => (index, *geometry),
        None => (0, *first),
    })
}

/// Indices of displays that may receive the presentation.
pub fn presentation_targets(monitors: &[MonitorGeometry]) -> Vec<usize> {
    monitors
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.hosts_control)
        .map(|(idx, _)| idx)
        .collect()
}

/// Starting presentation monitor: the saved index if it is a valid target,
/// otherwise the first display not hosting the control window.
pub fn preferred_index(monitors: &[MonitorGeometry], saved: usize) -> Option<usize> {
    match monitors.get(saved) {
        Some(m) if !m.hosts_control => Some(saved),
        _ => presentation_targets(monitors).first().copied(),
    }
}

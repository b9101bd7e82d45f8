use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collection::SortKey;
use crate::processing::decode::{THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_WIDTH};

/// File name of the settings record stored beside the executable.
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Persisted operator settings. Loaded once at startup and saved on exit;
/// everything else receives the values it needs explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Folder restored on the next start.
    pub last_folder: Option<PathBuf>,
    /// Index into the monitor list used for presentation.
    pub monitor_index: usize,
    /// Cross-fade duration in milliseconds.
    pub fade_ms: u64,
    pub sort_key: SortKey,
    pub sort_descending: bool,
    /// Compositor canvas size relative to the target monitor (1.0 = native).
    pub oversample: f32,
    /// How many thumbnails the folder loader decodes ahead of the consumer.
    pub loader_max_concurrent_decodes: usize,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Settings {
    /// `settings.yaml` next to the running executable, or in the working
    /// directory when the executable path is unknown.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SETTINGS_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Load settings, falling back to defaults when the file is missing,
    /// unparsable or holds invalid values.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file; using defaults");
            return Self::default();
        }
        match Self::from_yaml_file(path).and_then(Self::validated) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %path.display(), "ignoring settings file: {err:#}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("serializing settings")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("writing settings to {}", path.display()))?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.oversample.is_finite() && self.oversample > 0.0,
            "oversample must be positive"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        ensure!(
            self.thumbnail_width > 0 && self.thumbnail_height > 0,
            "thumbnail dimensions must be greater than zero"
        );
        Ok(self)
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_folder: None,
            monitor_index: 0,
            fade_ms: 500,
            sort_key: SortKey::FileName,
            sort_descending: false,
            oversample: 1.0,
            loader_max_concurrent_decodes: 4,
            thumbnail_width: THUMBNAIL_MAX_WIDTH,
            thumbnail_height: THUMBNAIL_MAX_HEIGHT,
        }
    }
}

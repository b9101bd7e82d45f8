//! Operator session: the browsing collection, the latched show/black toggles
//! and the presenter they drive.

use std::path::{Path, PathBuf};
use std::pin::pin;

use futures::StreamExt;
use tracing::{info, warn};

use crate::collection::{SortKey, SortedItemCollection};
use crate::config::Settings;
use crate::error::Error;
use crate::events::PresentRequest;
use crate::item::{ImageItem, Rotation};
use crate::monitor::{self, MonitorGeometry};
use crate::tasks::loader::{LoaderOptions, stream_folder};
use crate::tasks::presenter::PresenterHandle;

pub struct Session {
    settings: Settings,
    collection: SortedItemCollection,
    presenter: PresenterHandle,
    showing: bool,
    black: bool,
    status: String,
}

impl Session {
    pub fn new(settings: Settings, presenter: PresenterHandle) -> Self {
        Self {
            settings,
            collection: SortedItemCollection::new(),
            presenter,
            showing: false,
            black: false,
            status: String::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn collection(&self) -> &SortedItemCollection {
        &self.collection
    }

    pub fn presenter(&self) -> &PresenterHandle {
        &self.presenter
    }

    /// Last scan status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn is_black(&self) -> bool {
        self.black
    }

    /// Replace the collection with the images in `dir`.
    ///
    /// Items are added as they stream in; the first one is selected right
    /// away. The configured sort is applied once the stream ends. Returns the
    /// number of items loaded.
    pub async fn open_folder(&mut self, dir: &Path) -> Result<usize, Error> {
        self.settings.last_folder = Some(dir.to_path_buf());
        self.collection.clear();
        self.status = "Loading...".into();

        let stream = match stream_folder(dir, LoaderOptions::from(&self.settings)) {
            Ok(stream) => stream,
            Err(err) => {
                self.status = format!("Load error: {err}");
                warn!("{}", self.status);
                return Err(err);
            }
        };
        let mut stream = pin!(stream);
        let mut count = 0usize;
        while let Some(item) = stream.next().await {
            if !self.collection.push(item) {
                continue;
            }
            count += 1;
            self.status = format!("Loading... {count} items");
            if count == 1 {
                self.collection.select(0);
                if let Err(err) = self.present_selected().await {
                    warn!(%err, "could not present the first item; loading continues");
                }
            }
        }

        self.collection
            .apply_sort(self.settings.sort_key, self.settings.sort_descending);
        self.status = format!("Loaded: {} items", self.collection.len());
        info!(dir = %dir.display(), count, "folder loaded");
        Ok(count)
    }

    /// Select `index` and present it. Out-of-range indices are ignored.
    pub async fn select(&mut self, index: usize) -> Result<Option<PathBuf>, Error> {
        let moved = self.collection.select(index).is_some();
        self.after_navigation(moved).await
    }

    pub async fn next(&mut self) -> Result<Option<PathBuf>, Error> {
        let moved = self.collection.next().is_some();
        self.after_navigation(moved).await
    }

    pub async fn previous(&mut self) -> Result<Option<PathBuf>, Error> {
        let moved = self.collection.previous().is_some();
        self.after_navigation(moved).await
    }

    /// Returns the selected path when the selection changed.
    async fn after_navigation(&mut self, moved: bool) -> Result<Option<PathBuf>, Error> {
        if !moved {
            return Ok(None);
        }
        self.present_selected().await?;
        Ok(self.selected_path())
    }

    pub async fn rotate_clockwise(&mut self) -> Result<(), Error> {
        self.rotate(ImageItem::rotate_clockwise).await
    }

    pub async fn rotate_counter_clockwise(&mut self) -> Result<(), Error> {
        self.rotate(ImageItem::rotate_counter_clockwise).await
    }

    async fn rotate(&mut self, turn: fn(&mut ImageItem) -> Rotation) -> Result<(), Error> {
        let Some(item) = self.collection.selected_mut() else {
            return Ok(());
        };
        let rotation = turn(item);
        info!(path = %item.path().display(), degrees = rotation.degrees(), "rotated");
        self.present_selected().await
    }

    /// Turn presentation on or off. Turning on creates the presenter on the
    /// configured monitor, then blacks it out or presents the selection.
    pub async fn set_show(&mut self, show: bool) -> Result<Option<MonitorGeometry>, Error> {
        if !show {
            if self.showing {
                self.showing = false;
                self.presenter.turn_off().await?;
            }
            return Ok(None);
        }

        let monitors = self.presenter.monitors().await?;
        let Some(index) = monitor::preferred_index(&monitors, self.settings.monitor_index) else {
            warn!(count = monitors.len(), "no display free for presentation");
            return Err(Error::NoMonitors);
        };
        if index != self.settings.monitor_index {
            info!(saved = self.settings.monitor_index, index, "saved monitor unavailable; using first free display");
            self.settings.monitor_index = index;
        }
        let geometry = self.presenter.turn_on(index).await?;
        self.showing = true;
        if self.black {
            self.presenter.set_black(true).await?;
        } else {
            self.present_selected().await?;
        }
        Ok(Some(geometry))
    }

    /// Latch blackout. Leaving blackout re-presents the selection.
    pub async fn set_black(&mut self, black: bool) -> Result<(), Error> {
        self.black = black;
        if !self.showing {
            return Ok(());
        }
        self.presenter.set_black(black).await?;
        if !black {
            self.present_selected().await?;
        }
        Ok(())
    }

    /// Store the presentation monitor and move a live presenter there.
    /// Displays that are out of range or host the control window are refused.
    pub async fn set_monitor(&mut self, index: usize) -> Result<Option<MonitorGeometry>, Error> {
        let monitors = self.presenter.monitors().await?;
        if !monitor::presentation_targets(&monitors).contains(&index) {
            warn!(index, "monitor refused as presentation target");
            return Err(Error::MonitorUnavailable { index });
        }
        self.settings.monitor_index = index;
        if !self.showing {
            return Ok(None);
        }
        self.presenter.retarget(index).await.map(Some)
    }

    pub fn set_sort(&mut self, key: SortKey, descending: bool) {
        self.settings.sort_key = key;
        self.settings.sort_descending = descending;
        self.collection.apply_sort(key, descending);
    }

    fn selected_path(&self) -> Option<PathBuf> {
        self.collection.selected().map(|item| item.path().to_path_buf())
    }

    async fn present_selected(&self) -> Result<(), Error> {
        if !self.showing || self.black {
            return Ok(());
        }
        let Some(item) = self.collection.selected() else {
            return Ok(());
        };
        self.presenter
            .present(PresentRequest {
                path: item.path().to_path_buf(),
                rotation: item.rotation(),
                fade: self.settings.fade_duration(),
            })
            .await
    }
}

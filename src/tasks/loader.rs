//! Streaming folder loader: one `ImageItem` at a time, thumbnail attached.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::error::{DecodeError, Error};
use crate::item::{ImageItem, SharedImage};
use crate::processing::decode::decode_thumbnail;
use crate::scan::candidate_files;

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// Decodes allowed to run ahead of the consumer. Emission order is
    /// unaffected.
    pub max_in_flight: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions::from(&Settings::default())
    }
}

impl From<&Settings> for LoaderOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            thumbnail_width: settings.thumbnail_width,
            thumbnail_height: settings.thumbnail_height,
            max_in_flight: settings.loader_max_concurrent_decodes.max(1),
        }
    }
}

/// Scan `dir` and stream its images in file-name order.
///
/// The directory listing happens up front, so a missing or unreadable folder
/// fails here. Each item is yielded only after its thumbnail decode attempt
/// finished; decodes run on blocking workers, up to `max_in_flight` ahead.
/// Files whose metadata cannot be read are skipped.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn stream_folder(
    dir: &Path,
    opts: LoaderOptions,
) -> Result<impl Stream<Item = ImageItem> + Send + use<>, Error> {
    let candidates = candidate_files(dir)?;
    info!(candidates = candidates.len(), "folder scan started");

    Ok(stream::iter(candidates)
        .map(move |path| load_item(path, opts))
        .buffered(opts.max_in_flight.max(1))
        .filter_map(|item| async move { item }))
}

async fn load_item(path: PathBuf, opts: LoaderOptions) -> Option<ImageItem> {
    let worker_path = path.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let modified = read_modified(&worker_path)?;
        let thumbnail = decode_thumbnail(&worker_path, opts.thumbnail_width, opts.thumbnail_height);
        Ok::<_, std::io::Error>((modified, thumbnail))
    })
    .await;

    let (modified, thumbnail) = match joined {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(err)) => {
            warn!(path = %path.display(), "skipping unreadable file: {err}");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), "thumbnail worker failed: {err}");
            return None;
        }
    };
    Some(ImageItem::new(path, modified).with_thumbnail(thumbnail_or_log(thumbnail)))
}

fn read_modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

fn thumbnail_or_log(result: Result<SharedImage, DecodeError>) -> Option<SharedImage> {
    match result {
        Ok(img) => Some(img),
        Err(err) => {
            debug!("no thumbnail: {err}");
            None
        }
    }
}

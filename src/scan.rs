//! Folder enumeration for the streaming loader.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Error;

/// Extensions accepted by a scan (lowercase, without dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Return `true` if `path` has a supported image extension, ignoring case.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|e| *e == ext)
        })
}

/// Regular files directly inside `dir` with a supported extension, sorted by
/// file name in ordinal order.
///
/// # Errors
/// Returns [`Error::DirectoryUnavailable`] if `dir` is missing, is not a
/// directory, or cannot be listed. Unreadable individual entries are skipped.
pub fn candidate_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    if !dir.is_dir() {
        return Err(Error::DirectoryUnavailable {
            path: dir.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            // A failure on the root itself means the listing is unusable.
            Err(err) if err.path() == Some(dir) => {
                return Err(Error::DirectoryUnavailable {
                    path: dir.to_path_buf(),
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            out.push(entry.into_path());
        }
    }
    // walkdir already yields in name order; keep the guarantee explicit.
    out.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(out)
}

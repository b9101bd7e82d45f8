//! Ordered, re-sortable list of loaded items with a tracked selection.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::item::ImageItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    #[serde(alias = "FileName")]
    FileName,
    #[serde(alias = "Date", alias = "DateModified")]
    DateModified,
}

/// Items keyed by path, in display order.
#[derive(Debug, Clone, Default)]
pub struct SortedItemCollection {
    items: Vec<ImageItem>,
    selected: Option<usize>,
}

impl SortedItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every item and the selection, ahead of a fresh folder load.
    pub fn clear(&mut self) {
        self.items.clear();
        self.selected = None;
    }

    /// Append an item. Returns `false` (and keeps the list unchanged) if the
    /// path is already present.
    pub fn push(&mut self, item: ImageItem) -> bool {
        if self.position(item.path()).is_some() {
            return false;
        }
        self.items.push(item);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ImageItem> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.items.iter().position(|item| item.path() == path)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&ImageItem> {
        self.selected.and_then(|idx| self.items.get(idx))
    }

    pub fn selected_mut(&mut self) -> Option<&mut ImageItem> {
        self.selected.and_then(|idx| self.items.get_mut(idx))
    }

    /// Select `index`. Out-of-range indices leave the selection untouched.
    pub fn select(&mut self, index: usize) -> Option<&ImageItem> {
        if index >= self.items.len() {
            return None;
        }
        self.selected = Some(index);
        self.items.get(index)
    }

    /// Move the selection one step forward; no wraparound.
    ///
    /// Returns the newly selected item, or `None` when nothing moved.
    pub fn next(&mut self) -> Option<&ImageItem> {
        let current = self.selected?;
        self.select(current.checked_add(1)?)
    }

    /// Move the selection one step back; no wraparound.
    pub fn previous(&mut self) -> Option<&ImageItem> {
        let current = self.selected?;
        self.select(current.checked_sub(1)?)
    }

    /// Reorder in place by `key`, keeping the selected item selected.
    ///
    /// The sort is stable, so repeating the same key and direction leaves the
    /// order unchanged.
    pub fn apply_sort(&mut self, key: SortKey, descending: bool) {
        if self.items.len() <= 1 {
            return;
        }
        let selected_path = self.selected().map(|item| item.path().to_path_buf());

        let compare = |a: &ImageItem, b: &ImageItem| -> Ordering {
            match key {
                SortKey::FileName => a.file_name().cmp(b.file_name()),
                SortKey::DateModified => a.date_modified().cmp(&b.date_modified()),
            }
        };
        if descending {
            self.items.sort_by(|a, b| compare(b, a));
        } else {
            self.items.sort_by(compare);
        }

        if let Some(path) = selected_path
            && let Some(idx) = self.position(&path)
        {
            self.selected = Some(idx);
        }
    }
}

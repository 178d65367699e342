//! Dimension ledger: the per-axis layout of rows or columns.
//!
//! Every item on an axis carries a [`Dimension`] with absolute pixel offsets.
//! The ledger keeps those offsets contiguous (`start[i + 1] == end[i]`) so
//! layout reads are O(1) and offset lookups can binary search.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GridError;

/// Which axis a ledger lays out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Rows,
    Columns,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Rows => write!(f, "row"),
            Axis::Columns => write!(f, "column"),
        }
    }
}

/// Position and size of one item along one axis, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub start: f64,
    pub center: f64,
    pub end: f64,
    pub size: f64,
}

impl Dimension {
    pub fn new(start: f64, size: f64) -> Self {
        Self {
            start,
            center: start + size / 2.0,
            end: start + size,
            size,
        }
    }

    /// Inclusive on both edges, so a boundary offset belongs to the earlier item
    pub fn contains(&self, offset: f64) -> bool {
        self.start <= offset && offset <= self.end
    }
}

/// Wire form for columns: `{left, center, right, width}`
pub(crate) mod horizontal {
    use super::Dimension;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        left: f64,
        #[serde(default)]
        center: f64,
        #[serde(default)]
        right: f64,
        width: f64,
    }

    pub fn serialize<S: Serializer>(dim: &Dimension, serializer: S) -> Result<S::Ok, S::Error> {
        Wire {
            left: dim.start,
            center: dim.center,
            right: dim.end,
            width: dim.size,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Dimension, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        Ok(Dimension::new(wire.left, wire.width))
    }
}

/// Wire form for rows: `{top, center, bottom, height}`
pub(crate) mod vertical {
    use super::Dimension;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        top: f64,
        #[serde(default)]
        center: f64,
        #[serde(default)]
        bottom: f64,
        height: f64,
    }

    pub fn serialize<S: Serializer>(dim: &Dimension, serializer: S) -> Result<S::Ok, S::Error> {
        Wire {
            top: dim.start,
            center: dim.center,
            bottom: dim.end,
            height: dim.size,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Dimension, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        Ok(Dimension::new(wire.top, wire.height))
    }
}

/// Anything that occupies space on an axis
pub trait LayoutItem {
    fn dimension(&self) -> &Dimension;
    fn dimension_mut(&mut self) -> &mut Dimension;
}

/// Ordered, contiguous, non-overlapping layout of one axis.
#[derive(Debug, Clone)]
pub struct DimensionLedger<T> {
    axis: Axis,
    items: Vec<T>,
    extent: f64,
}

impl<T: LayoutItem> DimensionLedger<T> {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            items: Vec::new(),
            extent: 0.0,
        }
    }

    /// Build a ledger from items, stacking them from offset 0 and keeping
    /// each item's size
    pub fn from_items(axis: Axis, items: Vec<T>) -> Self {
        let mut ledger = Self::new(axis);
        ledger.append(items);
        ledger
    }

    /// Stack new items after the current end of the axis.
    ///
    /// Incoming offsets are ignored: only sizes are kept, so pages that
    /// arrive after a resize still line up with what is already loaded.
    pub fn append(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        let before = self.items.len();
        let mut start = self.extent;

        for mut item in items {
            let size = item.dimension().size;
            *item.dimension_mut() = Dimension::new(start, size);
            start += size;
            self.items.push(item);
        }

        self.extent = start;
        self.items.len() - before
    }

    /// Set the size of one item and re-stack everything after it.
    ///
    /// O(n - index). Returns the previous size.
    pub fn resize(&mut self, index: usize, size: f64) -> Result<f64, GridError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(GridError::InvalidSize(size));
        }

        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(GridError::IndexOutOfRange {
                axis: self.axis,
                index,
                len,
            })?;

        let previous = item.dimension().size;
        let mut start = item.dimension().start;
        item.dimension_mut().size = size;

        for item in self.items.iter_mut().skip(index) {
            let size = item.dimension().size;
            *item.dimension_mut() = Dimension::new(start, size);
            start += size;
        }

        self.extent = start;
        debug!(
            "Resized {} {} from {} to {}, extent now {}",
            self.axis, index, previous, size, self.extent
        );
        Ok(previous)
    }

    /// Index of the first item whose inclusive range contains `offset`.
    ///
    /// `None` for an empty axis, a negative offset, or an offset past the end.
    pub fn index_at(&self, offset: f64) -> Option<usize> {
        if !(offset >= 0.0) {
            return None;
        }

        let index = self
            .items
            .partition_point(|item| item.dimension().end < offset);
        let item = self.items.get(index)?;
        item.dimension().contains(offset).then_some(index)
    }

    /// First item at or after `from` that reaches `offset`; the last item if
    /// the axis ends before it.
    pub fn trailing_index(&self, from: usize, offset: f64) -> Option<usize> {
        let tail = self.items.get(from..).filter(|tail| !tail.is_empty())?;
        let position = tail.partition_point(|item| item.dimension().end < offset);

        if position < tail.len() {
            Some(from + position)
        } else {
            Some(self.items.len() - 1)
        }
    }

    /// Pixel distance covered by stepping `delta` items from `from`.
    ///
    /// Positive deltas move forward, negative move back; both clamp at the
    /// ends of the axis. The result carries the sign of the movement.
    pub fn scroll_distance(&self, from: usize, delta: isize) -> f64 {
        let from = from.min(self.items.len());
        let target = if delta >= 0 {
            from.saturating_add(delta.unsigned_abs())
                .min(self.items.len())
        } else {
            from.saturating_sub(delta.unsigned_abs())
        };

        self.offset_of(target) - self.offset_of(from)
    }

    fn offset_of(&self, index: usize) -> f64 {
        self.items
            .get(index)
            .map_or(self.extent, |item| item.dimension().start)
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Total pixel size of the axis (end of the last item, 0 when empty)
    pub fn extent(&self) -> f64 {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Mutable access for content edits. Callers must not touch the dimension.
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }
}

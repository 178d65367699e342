use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use super::dimension::{horizontal, vertical, Dimension, LayoutItem};

/// Kind of value a column holds. Display only; cells are always strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Keyword,
    #[default]
    Text,
    Number,
    Datetime,
    Duration,
}

/// Schema entry for one column. `id` is stable across reordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub id: u64,
    pub label: String,
    #[serde(rename = "type", default)]
    pub value_type: ValueType,
    #[serde(with = "horizontal")]
    pub dimension: Dimension,
    #[serde(
        default,
        alias = "possibleValues",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_values: Option<Vec<String>>,
}

impl ColumnDescriptor {
    /// Create a column of the given width; its offset is assigned by the ledger
    pub fn new(id: u64, label: impl Into<String>, value_type: ValueType, width: f64) -> Self {
        Self {
            id,
            label: label.into(),
            value_type,
            dimension: Dimension::new(0.0, width),
            allowed_values: None,
        }
    }
}

impl LayoutItem for ColumnDescriptor {
    fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    fn dimension_mut(&mut self) -> &mut Dimension {
        &mut self.dimension
    }
}

/// One record of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: u64,
    pub label: String,
    #[serde(with = "vertical")]
    pub dimension: Dimension,
    #[serde(alias = "cellValues")]
    pub cells: Vec<String>,
}

impl RowRecord {
    pub fn new(id: u64, label: impl Into<String>, height: f64, cells: Vec<String>) -> Self {
        Self {
            id,
            label: label.into(),
            dimension: Dimension::new(0.0, height),
            cells,
        }
    }
}

impl LayoutItem for RowRecord {
    fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    fn dimension_mut(&mut self) -> &mut Dimension {
        &mut self.dimension
    }
}

/// The visible window: inclusive index bounds plus pixel extents.
///
/// `pixel_width`/`pixel_height` cover the visible items, which may be larger
/// than the client area since partially visible edge items are included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub content_pixel_width: f64,
    pub content_pixel_height: f64,
}

impl Viewport {
    pub fn row_range(&self) -> RangeInclusive<usize> {
        self.top..=self.bottom
    }

    pub fn column_range(&self) -> RangeInclusive<usize> {
        self.left..=self.right
    }

    /// True when both viewports cover the same index window
    pub fn same_window(&self, other: &Viewport) -> bool {
        self.top == other.top
            && self.bottom == other.bottom
            && self.left == other.left
            && self.right == other.right
    }
}

/// Progress of the background load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadState {
    #[default]
    Init,
    Loading,
    Loaded,
    /// A CONFIGURE or page request failed; loading does not progress further
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Init => write!(f, "INIT"),
            LoadState::Loading => write!(f, "LOADING"),
            LoadState::Loaded => write!(f, "LOADED"),
            LoadState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Result of CONFIGURE: layout totals, columns and record markers
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSchema {
    pub content_width: f64,
    pub content_height: f64,
    #[serde(alias = "cells")]
    pub columns: Vec<ColumnDescriptor>,
    pub first_record_id: Option<u64>,
    pub last_record_id: Option<u64>,
    #[serde(alias = "numberOfRows", alias = "numberOfRecords")]
    pub record_count: usize,
}

/// Body of the paged data endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowPage {
    pub rows: Vec<RowRecord>,
}

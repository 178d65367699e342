use super::types::{ColumnDescriptor, RowRecord, Viewport};

/// Borrowed render payload for one viewport.
///
/// Holds slices into the model, so it must be dropped before the next
/// mutation; surfaces copy whatever they need to keep.
#[derive(Debug, Clone, Copy)]
pub struct GridFrame<'a> {
    pub viewport: Viewport,
    /// Visible columns, `viewport.left..=viewport.right`
    pub columns: &'a [ColumnDescriptor],
    /// Visible rows, `viewport.top..=viewport.bottom`
    pub rows: &'a [RowRecord],
}

impl<'a> GridFrame<'a> {
    /// Slice `columns`/`rows` down to the viewport's index window.
    /// Indices past the end are clamped, yielding shorter slices.
    pub fn new(viewport: Viewport, columns: &'a [ColumnDescriptor], rows: &'a [RowRecord]) -> Self {
        Self {
            viewport,
            columns: clamp_slice(columns, viewport.left, viewport.right),
            rows: clamp_slice(rows, viewport.top, viewport.bottom),
        }
    }

    /// Cell text for a visible row, restricted to the visible columns
    pub fn visible_cells(&self, row: &'a RowRecord) -> &'a [String] {
        clamp_slice(&row.cells, self.viewport.left, self.viewport.right)
    }

    /// Horizontal offset of the first visible column, for translating
    /// absolute dimensions into surface coordinates
    pub fn origin_left(&self) -> f64 {
        self.columns.first().map_or(0.0, |c| c.dimension.start)
    }

    pub fn origin_top(&self) -> f64 {
        self.rows.first().map_or(0.0, |r| r.dimension.start)
    }
}

fn clamp_slice<T>(items: &[T], first: usize, last: usize) -> &[T] {
    let start = first.min(items.len());
    let end = last.saturating_add(1).min(items.len()).max(start);
    items.get(start..end).unwrap_or(&[])
}

/// Consumer-provided drawing target. Receives a frame whenever a new
/// viewport is produced or the model refreshes.
pub trait RenderSurface {
    fn render(&mut self, frame: &GridFrame<'_>);
}

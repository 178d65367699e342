//! Viewport calculation: scroll offsets + client size -> visible index window.
//!
//! Pure with respect to its inputs. Each axis is resolved independently:
//! the leading edge is the item containing the scroll offset, the trailing
//! edge the item containing `offset + client size` (or the last item when the
//! content ends first). Both lookups binary search the ledger's cumulative
//! offsets.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::dimension::{DimensionLedger, LayoutItem};
use super::types::Viewport;

/// Scroll position of the client area over the content, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub left: f64,
    pub top: f64,
}

impl ScrollOffset {
    pub fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// Size of the visible client area, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientSize {
    pub width: f64,
    pub height: f64,
}

impl ClientSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Total scrollable content, used for scrollbar ranges
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentSize {
    pub width: f64,
    pub height: f64,
}

impl ContentSize {
    /// Content size taken straight from the ledger totals
    pub fn of<C: LayoutItem, R: LayoutItem>(
        columns: &DimensionLedger<C>,
        rows: &DimensionLedger<R>,
    ) -> Self {
        Self {
            width: columns.extent(),
            height: rows.extent(),
        }
    }
}

/// Outcome of a viewport calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportUpdate {
    /// The visible window moved; re-render with the new viewport
    Changed(Viewport),
    /// Same index window as the previous viewport; nothing to re-render
    Unchanged,
    /// Empty axis or scroll offset beyond the content
    NoContent,
}

impl ViewportUpdate {
    /// Collapse to the "new viewport or nothing" form
    pub fn into_viewport(self) -> Option<Viewport> {
        match self {
            ViewportUpdate::Changed(viewport) => Some(viewport),
            ViewportUpdate::Unchanged | ViewportUpdate::NoContent => None,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, ViewportUpdate::Changed(_))
    }
}

/// Compute the viewport for the given scroll position and client size.
///
/// Returns [`ViewportUpdate::Unchanged`] when `previous` already covers the
/// same four indices, so callers can skip a redundant render.
pub fn calculate_next_viewport<C: LayoutItem, R: LayoutItem>(
    previous: Option<&Viewport>,
    columns: &DimensionLedger<C>,
    rows: &DimensionLedger<R>,
    scroll: ScrollOffset,
    client: ClientSize,
    content: ContentSize,
) -> ViewportUpdate {
    let edges = (
        axis_edges(columns, scroll.left, client.width),
        axis_edges(rows, scroll.top, client.height),
    );
    let (Some((left, right)), Some((top, bottom))) = edges else {
        trace!(
            "No viewport at scroll ({}, {}) over {} columns x {} rows",
            scroll.left,
            scroll.top,
            columns.len(),
            rows.len()
        );
        return ViewportUpdate::NoContent;
    };

    let next = Viewport {
        top,
        bottom,
        left,
        right,
        pixel_width: span(columns, left, right),
        pixel_height: span(rows, top, bottom),
        content_pixel_width: content.width,
        content_pixel_height: content.height,
    };

    match previous {
        Some(previous) if previous.same_window(&next) => ViewportUpdate::Unchanged,
        _ => {
            trace!(
                "Viewport rows {}..={} cols {}..={}",
                next.top,
                next.bottom,
                next.left,
                next.right
            );
            ViewportUpdate::Changed(next)
        }
    }
}

fn axis_edges<T: LayoutItem>(
    ledger: &DimensionLedger<T>,
    offset: f64,
    client: f64,
) -> Option<(usize, usize)> {
    let leading = ledger.index_at(offset)?;
    let trailing = ledger.trailing_index(leading, offset + client)?;
    Some((leading, trailing))
}

fn span<T: LayoutItem>(ledger: &DimensionLedger<T>, first: usize, last: usize) -> f64 {
    match (ledger.get(first), ledger.get(last)) {
        (Some(first), Some(last)) => last.dimension().end - first.dimension().start,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dimension::Axis;
    use crate::model::types::{ColumnDescriptor, RowRecord, ValueType};

    fn grid(
        widths: &[f64],
        heights: &[f64],
    ) -> (DimensionLedger<ColumnDescriptor>, DimensionLedger<RowRecord>) {
        let columns = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| ColumnDescriptor::new(i as u64, format!("c{}", i), ValueType::Text, w))
            .collect();
        let rows = heights
            .iter()
            .enumerate()
            .map(|(i, &h)| RowRecord::new(i as u64, (i + 1).to_string(), h, vec![]))
            .collect();
        (
            DimensionLedger::from_items(Axis::Columns, columns),
            DimensionLedger::from_items(Axis::Rows, rows),
        )
    }

    fn compute(
        previous: Option<&Viewport>,
        columns: &DimensionLedger<ColumnDescriptor>,
        rows: &DimensionLedger<RowRecord>,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
    ) -> ViewportUpdate {
        calculate_next_viewport(
            previous,
            columns,
            rows,
            ScrollOffset::new(left, top),
            ClientSize::new(width, height),
            ContentSize::of(columns, rows),
        )
    }

    #[test]
    fn test_basic_window() {
        let (columns, rows) = grid(&[100.0; 3], &[20.0; 10]);
        let viewport = compute(None, &columns, &rows, 0.0, 0.0, 250.0, 90.0)
            .into_viewport()
            .unwrap();

        assert_eq!((viewport.left, viewport.right), (0, 2));
        assert_eq!((viewport.top, viewport.bottom), (0, 4));
        assert_eq!(viewport.pixel_width, 300.0);
        assert_eq!(viewport.pixel_height, 100.0);
        assert_eq!(viewport.content_pixel_width, 300.0);
        assert_eq!(viewport.content_pixel_height, 200.0);
    }

    #[test]
    fn test_same_inputs_report_unchanged() {
        let (columns, rows) = grid(&[100.0; 3], &[20.0; 10]);
        let first = compute(None, &columns, &rows, 10.0, 35.0, 150.0, 60.0)
            .into_viewport()
            .unwrap();
        let second = compute(Some(&first), &columns, &rows, 10.0, 35.0, 150.0, 60.0);
        assert_eq!(second, ViewportUpdate::Unchanged);

        // Small scroll within the same items is also unchanged
        let nudged = compute(Some(&first), &columns, &rows, 11.0, 36.0, 150.0, 60.0);
        assert_eq!(nudged, ViewportUpdate::Unchanged);
    }

    #[test]
    fn test_leading_edge_is_monotonic() {
        let heights: Vec<f64> = (0..50).map(|i| 10.0 + (i % 7) as f64 * 3.0).collect();
        let (columns, rows) = grid(&[100.0; 2], &heights);

        let mut last_top = 0;
        let mut offset = 0.0;
        while offset <= rows.extent() {
            let viewport = compute(None, &columns, &rows, 0.0, offset, 100.0, 45.0)
                .into_viewport()
                .unwrap();
            assert!(viewport.top >= last_top);
            assert!(viewport.bottom >= viewport.top);
            last_top = viewport.top;
            offset += 3.7;
        }
    }

    #[test]
    fn test_client_larger_than_content_reaches_last_item() {
        let (columns, rows) = grid(&[50.0; 4], &[20.0; 3]);
        let viewport = compute(None, &columns, &rows, 0.0, 0.0, 1000.0, 1000.0)
            .into_viewport()
            .unwrap();
        assert_eq!(viewport.right, 3);
        assert_eq!(viewport.bottom, 2);
    }

    #[test]
    fn test_empty_or_out_of_range_has_no_viewport() {
        let (columns, rows) = grid(&[100.0; 3], &[]);
        assert_eq!(
            compute(None, &columns, &rows, 0.0, 0.0, 100.0, 100.0),
            ViewportUpdate::NoContent
        );

        let (columns, rows) = grid(&[100.0; 3], &[20.0; 10]);
        assert_eq!(
            compute(None, &columns, &rows, 0.0, 500.0, 100.0, 100.0),
            ViewportUpdate::NoContent
        );
        assert_eq!(
            compute(None, &columns, &rows, 301.0, 0.0, 100.0, 100.0),
            ViewportUpdate::NoContent
        );
    }

    #[test]
    fn test_item_taller_than_client() {
        let (columns, rows) = grid(&[100.0], &[20.0, 500.0, 20.0]);
        let viewport = compute(None, &columns, &rows, 0.0, 100.0, 100.0, 50.0)
            .into_viewport()
            .unwrap();
        assert_eq!((viewport.top, viewport.bottom), (1, 1));
        assert_eq!(viewport.pixel_height, 500.0);

        // The trailing search starts at the leading item, so a window that
        // ends inside it stays there instead of running on to the last row
        let viewport = compute(None, &columns, &rows, 0.0, 300.0, 100.0, 50.0)
            .into_viewport()
            .unwrap();
        assert_eq!((viewport.top, viewport.bottom), (1, 1));
        assert_ne!(viewport.bottom, rows.len() - 1);
        assert_eq!(viewport.pixel_height, 500.0);
    }
}

//! Grid model: layout ledgers, viewport calculation and the model facade.

pub mod dimension;
pub mod frame;
pub mod grid_model;
pub mod refresh;
pub mod types;
pub mod viewport;

pub use dimension::{Axis, Dimension, DimensionLedger, LayoutItem};
pub use frame::{GridFrame, RenderSurface};
pub use grid_model::GridModel;
pub use refresh::{RefreshNotifier, RefreshReason, SubscriptionId};
pub use types::{ColumnDescriptor, DatasetSchema, LoadState, RowPage, RowRecord, ValueType, Viewport};
pub use viewport::{calculate_next_viewport, ClientSize, ContentSize, ScrollOffset, ViewportUpdate};

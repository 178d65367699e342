//! GridModel - the aggregate that owns one dataset's layout and rows.
//!
//! Architecture:
//! DataSource (remote service / in memory)
//!     → worker (background context, request/response by correlation id)
//!         → GridLoader (CONFIGURE + paged LOAD_NEXT, emits LoadEvents)
//!             → GridModel (ledgers, load state, refresh observers)
//!                 → calculate_next_viewport → RenderSurface
//!
//! The model is single-threaded: all mutation happens on the thread that owns
//! it, and loader progress arrives as messages applied by
//! [`GridModel::apply_pending_updates`] or [`GridModel::next_update`].

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::dimension::{Axis, DimensionLedger};
use super::frame::GridFrame;
use super::refresh::{RefreshNotifier, RefreshReason, SubscriptionId};
use super::types::{ColumnDescriptor, DatasetSchema, LoadState, RowRecord, Viewport};
use super::viewport::{
    calculate_next_viewport, ClientSize, ContentSize, ScrollOffset, ViewportUpdate,
};
use crate::config::LoaderConfig;
use crate::error::{GridError, LoadError};
use crate::services::data_source::DataSource;
use crate::services::loader::{GridLoader, LoadEvent, LoaderHandle};

pub struct GridModel {
    segment: String,
    columns: DimensionLedger<ColumnDescriptor>,
    rows: DimensionLedger<RowRecord>,

    load_state: LoadState,
    first_record_id: Option<u64>,
    last_record_id: Option<u64>,
    expected_record_count: usize,

    /// Content size announced by CONFIGURE, shifted by every resize.
    /// Before CONFIGURE arrives it holds only the accumulated resize deltas.
    /// Used for scrollbar ranges until the row stream is exhausted.
    advertised: ContentSize,
    schema_ready: bool,
    rows_exhausted: bool,
    last_error: Option<LoadError>,

    notifier: RefreshNotifier,
    updates: Option<mpsc::UnboundedReceiver<LoadEvent>>,
    loader: Option<LoaderHandle>,
}

impl GridModel {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            columns: DimensionLedger::new(Axis::Columns),
            rows: DimensionLedger::new(Axis::Rows),
            load_state: LoadState::Init,
            first_record_id: None,
            last_record_id: None,
            expected_record_count: 0,
            advertised: ContentSize::default(),
            schema_ready: false,
            rows_exhausted: false,
            last_error: None,
            notifier: RefreshNotifier::new(),
            updates: None,
            loader: None,
        }
    }

    /// Start loading the segment in the background on `handle`.
    ///
    /// Any previous load is torn down and its data discarded.
    pub fn start_loading(
        &mut self,
        handle: &Handle,
        source: Arc<dyn DataSource>,
        config: &LoaderConfig,
    ) {
        if self.loader.is_some() || self.load_state != LoadState::Init {
            self.terminate();
            self.reset();
        }

        let (events, updates) = mpsc::unbounded_channel();
        let loader = GridLoader::new(self.segment.clone(), config.clone());
        self.loader = Some(loader.spawn(handle, source, events));
        self.updates = Some(updates);
        self.load_state = LoadState::Loading;
        info!("GridModel '{}': loading started", self.segment);
    }

    fn reset(&mut self) {
        self.columns = DimensionLedger::new(Axis::Columns);
        self.rows = DimensionLedger::new(Axis::Rows);
        self.load_state = LoadState::Init;
        self.first_record_id = None;
        self.last_record_id = None;
        self.expected_record_count = 0;
        self.advertised = ContentSize::default();
        self.schema_ready = false;
        self.rows_exhausted = false;
        self.last_error = None;
    }

    /// Tear down the background context. Safe to call more than once.
    pub fn terminate(&mut self) {
        if let Some(loader) = self.loader.take() {
            debug!("GridModel '{}': terminating loader", self.segment);
            loader.shutdown();
        }
        self.updates = None;

        if self.load_state == LoadState::Loading {
            self.load_state = LoadState::Failed;
            self.last_error = Some(LoadError::Aborted);
        }
    }

    /// Apply every loader event that has already arrived, without waiting.
    /// Returns how many were applied.
    pub fn apply_pending_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.try_next_event() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn try_next_event(&mut self) -> Option<LoadEvent> {
        self.updates.as_mut()?.try_recv().ok()
    }

    /// Wait for the next loader event and apply it. Returns false when the
    /// loader has nothing more to send.
    pub async fn next_update(&mut self) -> bool {
        let Some(updates) = self.updates.as_mut() else {
            return false;
        };

        match updates.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => {
                self.updates = None;
                false
            }
        }
    }

    /// Apply loader events until the dataset is fully loaded or loading fails
    pub async fn wait_until_loaded(&mut self) -> Result<(), GridError> {
        loop {
            match self.load_state {
                LoadState::Loaded => return Ok(()),
                LoadState::Failed => {
                    return Err(self.last_error.clone().unwrap_or(LoadError::Aborted).into())
                }
                LoadState::Init => return Err(GridError::NotLoading),
                LoadState::Loading => {}
            }

            if !self.next_update().await {
                self.load_state = LoadState::Failed;
                self.last_error = Some(LoadError::Aborted);
            }
        }
    }

    fn apply(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Configured(schema) => self.apply_schema(schema),
            LoadEvent::Page(rows) => {
                let count = self.rows.append(rows);
                debug!(
                    "GridModel '{}': {} rows appended ({} total)",
                    self.segment,
                    count,
                    self.rows.len()
                );
                self.notifier.notify(&RefreshReason::RowsAppended { count });
            }
            LoadEvent::RowsExhausted => {
                self.rows_exhausted = true;
                self.maybe_finish();
            }
            LoadEvent::Failed(err) => {
                error!("GridModel '{}': loading failed: {}", self.segment, err);
                self.load_state = LoadState::Failed;
                self.last_error = Some(err);
                self.notifier.notify(&RefreshReason::LoadFailed);
            }
        }
    }

    fn apply_schema(&mut self, schema: DatasetSchema) {
        let DatasetSchema {
            content_width,
            content_height,
            columns,
            first_record_id,
            last_record_id,
            record_count,
        } = schema;

        self.columns = DimensionLedger::from_items(Axis::Columns, columns);
        // Rows may have been resized while CONFIGURE was in flight
        self.advertised = ContentSize {
            width: content_width + self.advertised.width,
            height: content_height + self.advertised.height,
        };
        self.first_record_id = first_record_id;
        self.last_record_id = last_record_id;
        self.expected_record_count = record_count;
        self.schema_ready = true;

        info!(
            "GridModel '{}': configured {} columns, expecting {} records",
            self.segment,
            self.columns.len(),
            record_count
        );
        self.notifier.notify(&RefreshReason::SchemaConfigured);
        self.maybe_finish();
    }

    fn maybe_finish(&mut self) {
        if self.load_state != LoadState::Loading || !self.schema_ready || !self.rows_exhausted {
            return;
        }

        let received_last = self.rows.as_slice().last().map(|row| row.id);
        if self.rows.len() != self.expected_record_count || received_last != self.last_record_id {
            let err = LoadError::Incomplete {
                expected: self.expected_record_count,
                received: self.rows.len(),
                expected_last: self.last_record_id,
                received_last,
            };
            error!("GridModel '{}': {}", self.segment, err);
            self.load_state = LoadState::Failed;
            self.last_error = Some(err);
            self.notifier.notify(&RefreshReason::LoadFailed);
            return;
        }

        self.load_state = LoadState::Loaded;
        info!(
            "GridModel '{}': loaded {} rows",
            self.segment,
            self.rows.len()
        );
        self.notifier.notify(&RefreshReason::Loaded);
    }

    /// Viewport for the given scroll position, or why there is none.
    /// See [`calculate_next_viewport`].
    pub fn calculate_next_viewport(
        &self,
        previous: Option<&Viewport>,
        scroll: ScrollOffset,
        client: ClientSize,
    ) -> ViewportUpdate {
        calculate_next_viewport(
            previous,
            &self.columns,
            &self.rows,
            scroll,
            client,
            self.content_size(),
        )
    }

    /// Recompute from scratch, ignoring any previous viewport. Used after a
    /// refresh, when the layout may have changed under the same indices.
    pub fn refresh_viewport(&self, scroll: ScrollOffset, client: ClientSize) -> Option<Viewport> {
        self.calculate_next_viewport(None, scroll, client)
            .into_viewport()
    }

    pub fn resize_row(&mut self, index: usize, height: f64) -> Result<(), GridError> {
        let previous = self.rows.resize(index, height)?;
        self.advertised.height += height - previous;
        self.notifier.notify(&RefreshReason::RowResized { index });
        Ok(())
    }

    pub fn resize_column(&mut self, index: usize, width: f64) -> Result<(), GridError> {
        let previous = self.columns.resize(index, width)?;
        self.advertised.width += width - previous;
        self.notifier.notify(&RefreshReason::ColumnResized { index });
        Ok(())
    }

    /// Overwrite one cell. No type checking against the column's value type.
    pub fn edit_cell(
        &mut self,
        column: usize,
        row: usize,
        value: impl Into<String>,
    ) -> Result<(), GridError> {
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|record| record.cells.get_mut(column))
            .ok_or(GridError::CellOutOfRange { column, row })?;

        *cell = value.into();
        self.notifier
            .notify(&RefreshReason::CellEdited { column, row });
        Ok(())
    }

    /// Register the only refresh callback, replacing all earlier ones
    pub fn on_refresh(&mut self, callback: impl FnMut(&RefreshReason) + 'static) -> SubscriptionId {
        self.notifier.replace_all(callback)
    }

    /// Add a refresh callback alongside existing ones
    pub fn subscribe(&mut self, callback: impl FnMut(&RefreshReason) + 'static) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Render payload for `viewport`
    pub fn frame(&self, viewport: &Viewport) -> GridFrame<'_> {
        GridFrame::new(*viewport, self.columns.as_slice(), self.rows.as_slice())
    }

    /// Scrollable content size. While rows are still streaming in, this is
    /// at least the size CONFIGURE announced.
    pub fn content_size(&self) -> ContentSize {
        let loaded = ContentSize::of(&self.columns, &self.rows);
        if self.rows_exhausted {
            return loaded;
        }
        ContentSize {
            width: loaded.width.max(self.advertised.width),
            height: loaded.height.max(self.advertised.height),
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn columns(&self) -> &DimensionLedger<ColumnDescriptor> {
        &self.columns
    }

    pub fn rows(&self) -> &DimensionLedger<RowRecord> {
        &self.rows
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn first_record_id(&self) -> Option<u64> {
        self.first_record_id
    }

    pub fn last_record_id(&self) -> Option<u64> {
        self.last_record_id
    }

    pub fn expected_record_count(&self) -> usize {
        self.expected_record_count
    }

    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    /// Build a model directly from a schema and rows, without a loader.
    /// The model is immediately `Loaded`.
    pub fn from_parts(
        segment: impl Into<String>,
        schema: DatasetSchema,
        rows: Vec<RowRecord>,
    ) -> Self {
        let mut model = Self::new(segment);
        model.load_state = LoadState::Loading;
        model.apply(LoadEvent::Page(rows));
        model.apply(LoadEvent::RowsExhausted);
        model.apply_schema(schema);
        model
    }
}

impl Drop for GridModel {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for GridModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridModel")
            .field("segment", &self.segment)
            .field("columns", &self.columns.len())
            .field("rows", &self.rows.len())
            .field("load_state", &self.load_state)
            .finish()
    }
}

// Background loading: worker protocol, correlation, paging and teardown

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use virtual_grid::config::{LayoutConfig, LoaderConfig};
use virtual_grid::data::dataset::Dataset;
use virtual_grid::model::{
    ClientSize, DatasetSchema, GridModel, LoadState, RowRecord, ScrollOffset,
};
use virtual_grid::services::channel::{ErrorCode, WorkerClient, WorkerRequest};
use virtual_grid::services::data_source::{DataSource, InMemoryDataSource};
use virtual_grid::services::page_stream::PageStream;
use virtual_grid::services::worker::{handle_request, spawn_worker};
use virtual_grid::{DataSourceError, GridError, LoadError};

const CSV: &str = "State,Year,Population\nAL,2019,4903185\nAK,2019,731545\nAZ,2019,7278717\nAR,2019,3017804\nCA,2019,39512223\n";

fn population() -> Dataset {
    Dataset::from_csv_reader(CSV.as_bytes(), &LayoutConfig::default()).unwrap()
}

fn in_memory() -> InMemoryDataSource {
    InMemoryDataSource::new().with_dataset("population", population())
}

fn loader_config(first_page_size: usize, page_size: usize) -> LoaderConfig {
    LoaderConfig {
        first_page_size,
        page_size,
        ..LoaderConfig::default()
    }
}

fn connect(source: impl DataSource + 'static) -> WorkerClient {
    let handle = Handle::current();
    let worker = spawn_worker(&handle, Arc::new(source));
    let (client, _router) = WorkerClient::connect(&handle, worker.channels);
    client
}

fn ids(rows: &[RowRecord]) -> Vec<u64> {
    rows.iter().map(|r| r.id).collect()
}

/// Holds back every page after the first until released, and CONFIGURE too
/// when `schema` is set
struct GatedSource {
    inner: InMemoryDataSource,
    schema: Option<Arc<Notify>>,
    later_pages: Arc<Notify>,
}

#[async_trait]
impl DataSource for GatedSource {
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError> {
        if let Some(schema) = &self.schema {
            schema.notified().await;
        }
        self.inner.configure(segment).await
    }

    async fn load_next(
        &self,
        segment: &str,
        start_after: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        if start_after.is_some() {
            self.later_pages.notified().await;
        }
        self.inner.load_next(segment, start_after, page_size).await
    }
}

/// Answers later requests sooner, so replies arrive in reverse order
struct SlowStartSource {
    inner: InMemoryDataSource,
}

#[async_trait]
impl DataSource for SlowStartSource {
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError> {
        self.inner.configure(segment).await
    }

    async fn load_next(
        &self,
        segment: &str,
        start_after: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        let position = start_after.unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(10 * (5 - position.min(4)))).await;
        self.inner.load_next(segment, start_after, page_size).await
    }
}

/// Caps every page at two rows, so the stream looks finished too early
struct TruncatingSource {
    inner: InMemoryDataSource,
}

#[async_trait]
impl DataSource for TruncatingSource {
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError> {
        self.inner.configure(segment).await
    }

    async fn load_next(
        &self,
        segment: &str,
        start_after: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        self.inner.load_next(segment, start_after, page_size.min(2)).await
    }
}

/// Never answers
struct HangingSource;

#[async_trait]
impl DataSource for HangingSource {
    async fn configure(&self, _segment: &str) -> Result<DatasetSchema, DataSourceError> {
        std::future::pending().await
    }

    async fn load_next(
        &self,
        _segment: &str,
        _start_after: Option<u64>,
        _page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        std::future::pending().await
    }
}

/// Returns ids out of order
struct DisorderedSource;

#[async_trait]
impl DataSource for DisorderedSource {
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError> {
        Err(DataSourceError::UnknownSegment(segment.to_string()))
    }

    async fn load_next(
        &self,
        _segment: &str,
        _start_after: Option<u64>,
        _page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        Ok(vec![
            RowRecord::new(3, "4", 22.0, vec![]),
            RowRecord::new(1, "2", 22.0, vec![]),
        ])
    }
}

#[tokio::test]
async fn test_load_next_pages_by_record_id() {
    let client = connect(in_memory());

    let first = client.load_next("population", None, 2).await.unwrap();
    assert_eq!(ids(&first), vec![0, 1]);

    let rest = client.load_next("population", Some(1), 10).await.unwrap();
    assert_eq!(ids(&rest), vec![2, 3, 4]);

    let done = client.load_next("population", Some(4), 10).await.unwrap();
    assert!(done.is_empty());
}

#[tokio::test]
async fn test_configure_returns_schema() {
    let client = connect(in_memory());

    let schema = client.configure("population").await.unwrap();
    assert_eq!(schema.record_count, 5);
    assert_eq!(schema.first_record_id, Some(0));
    assert_eq!(schema.last_record_id, Some(4));
    assert_eq!(schema.content_width, 324.0);
    assert_eq!(schema.content_height, 110.0);
}

#[tokio::test]
async fn test_unknown_action_gets_error_code() {
    let client = connect(in_memory());

    let result = client.send("DELETE_EVERYTHING", json!({})).await;
    assert!(matches!(
        result,
        Err(LoadError::Worker { code: ErrorCode::UnknownAction, .. })
    ));

    // The channel keeps working afterwards
    assert!(client.configure("population").await.is_ok());
}

#[tokio::test]
async fn test_bad_payload_and_missing_segment() {
    let client = connect(in_memory());

    let result = client.send("LOAD_NEXT", json!({ "segment": 5 })).await;
    assert!(matches!(
        result,
        Err(LoadError::Worker { code: ErrorCode::BadPayload, .. })
    ));

    let result = client.configure("nope").await;
    assert!(matches!(
        result,
        Err(LoadError::Worker { code: ErrorCode::Transport, .. })
    ));
}

#[tokio::test]
async fn test_handle_request_echoes_correlation_id() {
    let source = in_memory();
    let request = WorkerRequest {
        correlation_id: 42,
        action: "RESIZE".to_string(),
        payload: Value::Null,
    };

    let response = handle_request(&source, request).await;
    assert_eq!(response.correlation_id, 42);
    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, ErrorCode::UnknownAction);
}

#[tokio::test]
async fn test_concurrent_requests_resolve_by_correlation_id() {
    let client = connect(SlowStartSource { inner: in_memory() });

    let requests: Vec<_> = (0..4u64)
        .map(|after| {
            let client = client.clone();
            tokio::spawn(async move { client.load_next("population", Some(after), 1).await })
        })
        .collect();

    for (after, request) in requests.into_iter().enumerate() {
        let rows = request.await.unwrap().unwrap();
        assert_eq!(ids(&rows), vec![after as u64 + 1]);
    }
}

#[tokio::test]
async fn test_page_stream_uses_first_then_regular_page_size() {
    let client = connect(in_memory());
    let mut pages = PageStream::new(client, "population", &loader_config(1, 3));

    assert_eq!(pages.next_page_size(), 1);
    assert_eq!(ids(&pages.next_page().await.unwrap().unwrap()), vec![0]);
    assert_eq!(pages.next_page_size(), 3);
    assert_eq!(ids(&pages.next_page().await.unwrap().unwrap()), vec![1, 2, 3]);
    // Short page ends the stream
    assert_eq!(ids(&pages.next_page().await.unwrap().unwrap()), vec![4]);
    assert!(pages.is_finished());
    assert!(pages.next_page().await.is_none());
    assert_eq!(pages.cursor(), Some(4));

    pages.restart();
    assert_eq!(ids(&pages.next_page().await.unwrap().unwrap()), vec![0]);
}

#[tokio::test]
async fn test_page_stream_ends_on_empty_page() {
    let client = connect(in_memory());
    let mut pages = PageStream::new(client, "population", &loader_config(2, 3));

    assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 2);
    assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 3);
    assert!(!pages.is_finished());
    assert!(pages.next_page().await.is_none());
    assert!(pages.is_finished());
}

#[tokio::test]
async fn test_page_stream_rejects_descending_ids() {
    let client = connect(DisorderedSource);
    let mut pages = PageStream::new(client, "population", &loader_config(10, 10));

    let result = pages.next_page().await.unwrap();
    assert_eq!(result, Err(LoadError::OutOfOrder { after: 3, received: 1 }));
    assert!(pages.next_page().await.is_none());
}

#[tokio::test]
async fn test_model_loads_every_record() {
    let mut model = GridModel::new("population");
    model.start_loading(&Handle::current(), Arc::new(in_memory()), &loader_config(2, 2));
    assert_eq!(model.load_state(), LoadState::Loading);

    model.wait_until_loaded().await.unwrap();

    assert_eq!(model.load_state(), LoadState::Loaded);
    let rows = model.rows().as_slice();
    assert_eq!(rows.len(), model.expected_record_count());
    assert!(rows.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(rows.first().map(|r| r.id), model.first_record_id());
    assert_eq!(rows.last().map(|r| r.id), model.last_record_id());
    assert_eq!(model.content_size().height, 110.0);
    assert_eq!(model.rows().get(4).unwrap().dimension.start, 88.0);
}

#[tokio::test]
async fn test_first_page_is_usable_while_loading() {
    let later_pages = Arc::new(Notify::new());
    let source = GatedSource {
        inner: in_memory(),
        schema: None,
        later_pages: Arc::clone(&later_pages),
    };

    let mut model = GridModel::new("population");
    model.start_loading(&Handle::current(), Arc::new(source), &loader_config(2, 10));

    while model.rows().len() < 2 || model.columns().is_empty() {
        assert!(model.next_update().await);
    }

    assert_eq!(model.load_state(), LoadState::Loading);
    // Scroll range already reflects the whole dataset
    assert_eq!(model.content_size().height, 110.0);

    let viewport = model
        .refresh_viewport(ScrollOffset::new(0.0, 0.0), ClientSize::new(400.0, 200.0))
        .unwrap();
    assert_eq!((viewport.top, viewport.bottom), (0, 1));
    assert_eq!(viewport.content_pixel_height, 110.0);

    later_pages.notify_one();
    model.wait_until_loaded().await.unwrap();
    assert_eq!(model.rows().len(), 5);
}

#[tokio::test]
async fn test_resize_before_schema_is_kept_in_content_size() {
    let schema = Arc::new(Notify::new());
    let later_pages = Arc::new(Notify::new());
    let source = GatedSource {
        inner: in_memory(),
        schema: Some(Arc::clone(&schema)),
        later_pages: Arc::clone(&later_pages),
    };

    let mut model = GridModel::new("population");
    model.start_loading(&Handle::current(), Arc::new(source), &loader_config(2, 10));

    // First page lands while CONFIGURE is still held back
    while model.rows().len() < 2 {
        assert!(model.next_update().await);
    }
    assert!(model.columns().is_empty());
    model.resize_row(0, 5.0).unwrap();

    schema.notify_one();
    while model.columns().is_empty() {
        assert!(model.next_update().await);
    }

    // 5 rows of 22px announced, first row shrunk by 17px
    assert_eq!(model.load_state(), LoadState::Loading);
    assert_eq!(model.content_size().height, 93.0);
    assert_eq!(model.content_size().width, 324.0);

    later_pages.notify_one();
    model.wait_until_loaded().await.unwrap();
    assert_eq!(model.content_size().height, 93.0);
}

#[tokio::test]
async fn test_stream_ending_early_is_not_loaded() {
    let source = TruncatingSource { inner: in_memory() };

    let mut model = GridModel::new("population");
    model.start_loading(&Handle::current(), Arc::new(source), &loader_config(3, 3));

    let result = model.wait_until_loaded().await;

    assert!(matches!(
        result,
        Err(GridError::Load(LoadError::Incomplete {
            expected: 5,
            received: 2,
            expected_last: Some(4),
            received_last: Some(1),
        }))
    ));
    assert_eq!(model.load_state(), LoadState::Failed);
    assert_eq!(model.rows().len(), 2);
}

#[tokio::test]
async fn test_failed_configure_marks_model_failed() {
    let mut model = GridModel::new("missing");
    model.start_loading(&Handle::current(), Arc::new(in_memory()), &loader_config(2, 2));

    let result = model.wait_until_loaded().await;

    assert!(matches!(
        result,
        Err(GridError::Load(LoadError::Worker { code: ErrorCode::Transport, .. }))
    ));
    assert_eq!(model.load_state(), LoadState::Failed);
    assert!(model.last_error().is_some());
}

#[tokio::test]
async fn test_terminate_resolves_pending_load_as_aborted() {
    let mut model = GridModel::new("population");
    model.start_loading(&Handle::current(), Arc::new(HangingSource), &loader_config(2, 2));

    tokio::task::yield_now().await;
    assert_eq!(model.apply_pending_updates(), 0);
    assert_eq!(model.load_state(), LoadState::Loading);

    model.terminate();

    assert_eq!(model.load_state(), LoadState::Failed);
    assert_eq!(model.last_error(), Some(&LoadError::Aborted));
    assert!(matches!(
        model.wait_until_loaded().await,
        Err(GridError::Load(LoadError::Aborted))
    ));
}

#[tokio::test]
async fn test_teardown_aborts_in_flight_request() {
    let handle = Handle::current();
    let worker = spawn_worker(&handle, Arc::new(HangingSource));
    let (client, router) = WorkerClient::connect(&handle, worker.channels);

    let pending = tokio::spawn(async move { client.configure("population").await });
    tokio::task::yield_now().await;

    router.abort();
    worker.task.abort();

    assert_eq!(pending.await.unwrap(), Err(LoadError::Aborted));
}

//! HTTP data service for virtual grids.
//!
//! Serves every CSV file in a directory as a dataset segment:
//! - `GET /api/v1/:segment` returns `{"schema": {...}}`
//! - `GET /api/v1/:segment/data?startAfterRecordId={id|none}&pageSize={n}`
//!   returns `{"rows": [...]}` in ascending id order

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use virtual_grid::config::{Config, LayoutConfig};
use virtual_grid::data::dataset::Dataset;
use virtual_grid::model::{DatasetSchema, RowPage};

/// Used when the client does not send `pageSize`
pub const DEFAULT_PAGE_SIZE: usize = 250;
/// Largest `pageSize` accepted; bigger requests are rejected, never truncated
pub const MAX_PAGE_SIZE: usize = 10_000;

#[derive(Clone, Default)]
pub struct AppState {
    datasets: Arc<HashMap<String, Dataset>>,
}

impl AppState {
    pub fn new(datasets: HashMap<String, Dataset>) -> Self {
        Self {
            datasets: Arc::new(datasets),
        }
    }

    /// Load every `*.csv` in `dir`; the lowercased file stem is the segment
    pub fn load_dir(dir: &Path, layout: &LayoutConfig) -> Result<Self> {
        let mut datasets = HashMap::new();

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read data directory {:?}", dir))?;
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }

            let Some(segment) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping {:?}: file name is not valid UTF-8", path);
                continue;
            };
            let dataset = Dataset::from_csv_path(&path, layout)?;
            info!(
                "Serving segment '{}' ({} rows)",
                segment.to_lowercase(),
                dataset.rows().len()
            );
            datasets.insert(segment.to_lowercase(), dataset);
        }

        Ok(Self::new(datasets))
    }

    fn dataset(&self, segment: &str) -> Result<&Dataset, ApiError> {
        self.datasets
            .get(segment)
            .ok_or_else(|| ApiError::UnknownSegment(segment.to_string()))
    }

    pub fn segments(&self) -> Vec<String> {
        let mut segments: Vec<_> = self.datasets.keys().cloned().collect();
        segments.sort();
        segments
    }
}

#[derive(Debug)]
pub enum ApiError {
    UnknownSegment(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSegment(segment) => {
                (StatusCode::NOT_FOUND, format!("unknown segment '{}'", segment))
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(alias = "startAtRecordId")]
    start_after_record_id: Option<String>,
    page_size: Option<usize>,
}

impl PageQuery {
    /// `none`, `null` or an absent parameter mean "from the beginning"
    fn start_after(&self) -> Result<Option<u64>, ApiError> {
        match self.start_after_record_id.as_deref().map(str::trim) {
            None | Some("") | Some("none") | Some("null") => Ok(None),
            Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| {
                ApiError::BadRequest(format!("invalid startAfterRecordId '{}'", raw))
            }),
        }
    }

    /// A page shorter than requested means "end of data" to clients, so an
    /// oversized request is refused instead of silently truncated
    fn page_size(&self) -> Result<usize, ApiError> {
        match self.page_size.unwrap_or(DEFAULT_PAGE_SIZE) {
            0 => Err(ApiError::BadRequest("pageSize must be at least 1".to_string())),
            size if size > MAX_PAGE_SIZE => Err(ApiError::BadRequest(format!(
                "pageSize {} exceeds the maximum of {}",
                size, MAX_PAGE_SIZE
            ))),
            size => Ok(size),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SchemaBody {
    pub schema: DatasetSchema,
}

async fn list_segments(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.segments())
}

async fn get_schema(
    State(state): State<AppState>,
    UrlPath(segment): UrlPath<String>,
) -> Result<Json<SchemaBody>, ApiError> {
    let dataset = state.dataset(&segment)?;
    Ok(Json(SchemaBody {
        schema: dataset.schema().clone(),
    }))
}

async fn get_rows(
    State(state): State<AppState>,
    UrlPath(segment): UrlPath<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RowPage>, ApiError> {
    let dataset = state.dataset(&segment)?;
    let start_after = query.start_after()?;
    let page_size = query.page_size()?;
    let rows = dataset.page(start_after, page_size);

    debug!(
        "'{}' after {:?}: {} rows (page size {})",
        segment,
        start_after,
        rows.len(),
        page_size
    );
    Ok(Json(RowPage { rows }))
}

/// Layout section of the grid config at `path`, or the defaults when no
/// file exists there. Never creates the file.
pub fn layout_from(path: &Path) -> Result<LayoutConfig> {
    if !path.exists() {
        debug!("No grid config at {}, using default layout", path.display());
        return Ok(LayoutConfig::default());
    }
    Ok(Config::load_from(path)?.layout)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1", get(list_segments))
        .route("/api/v1/:segment", get(get_schema))
        .route("/api/v1/:segment/data", get(get_rows))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! Where the worker gets its data: the remote HTTP service or datasets held
//! in memory.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info};

use crate::data::dataset::Dataset;
use crate::error::DataSourceError;
use crate::model::types::{DatasetSchema, RowPage, RowRecord};

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Schema and layout totals for `segment`
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError>;

    /// Up to `page_size` rows with ids strictly greater than `start_after`
    /// (from the beginning when `None`), in ascending id order
    async fn load_next(
        &self,
        segment: &str,
        start_after: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError>;
}

/// The schema endpoint may return the schema bare or wrapped in `{"schema": ...}`
#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaEnvelope {
    Wrapped { schema: DatasetSchema },
    Bare(DatasetSchema),
}

impl SchemaEnvelope {
    fn into_schema(self) -> DatasetSchema {
        match self {
            SchemaEnvelope::Wrapped { schema } | SchemaEnvelope::Bare(schema) => schema,
        }
    }
}

/// Client for the remote data service:
/// `GET {base}/{segment}` and `GET {base}/{segment}/data`
#[derive(Clone)]
pub struct HttpDataSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDataSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, DataSourceError> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataSourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError> {
        let url = format!("{}/{}", self.base_url, segment);
        let envelope: SchemaEnvelope = self.get_json(url, &[]).await?;
        let schema = envelope.into_schema();
        info!(
            "Configured segment '{}': {} columns, {} records",
            segment,
            schema.columns.len(),
            schema.record_count
        );
        Ok(schema)
    }

    async fn load_next(
        &self,
        segment: &str,
        start_after: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        let url = format!("{}/{}/data", self.base_url, segment);
        let query = [
            (
                "startAfterRecordId",
                start_after.map_or_else(|| "none".to_string(), |id| id.to_string()),
            ),
            ("pageSize", page_size.to_string()),
        ];
        let page: RowPage = self.get_json(url, &query).await?;
        Ok(page.rows)
    }
}

/// Datasets kept in memory, keyed by segment name
#[derive(Clone, Default)]
pub struct InMemoryDataSource {
    datasets: HashMap<String, Arc<Dataset>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, segment: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(segment, dataset);
        self
    }

    pub fn insert(&mut self, segment: impl Into<String>, dataset: Dataset) {
        self.datasets.insert(segment.into(), Arc::new(dataset));
    }

    pub fn dataset(&self, segment: &str) -> Result<&Dataset, DataSourceError> {
        self.datasets
            .get(segment)
            .map(Arc::as_ref)
            .ok_or_else(|| DataSourceError::UnknownSegment(segment.to_string()))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn configure(&self, segment: &str) -> Result<DatasetSchema, DataSourceError> {
        Ok(self.dataset(segment)?.schema().clone())
    }

    async fn load_next(
        &self,
        segment: &str,
        start_after: Option<u64>,
        page_size: usize,
    ) -> Result<Vec<RowRecord>, DataSourceError> {
        Ok(self.dataset(segment)?.page(start_after, page_size))
    }
}

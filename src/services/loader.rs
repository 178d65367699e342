//! Loading sequence for one segment.
//!
//! CONFIGURE and the first page are requested concurrently; after that pages
//! are fetched one at a time. Progress is reported to the model as
//! [`LoadEvent`]s over a channel, so the model is only ever mutated on the
//! thread that owns it.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::channel::WorkerClient;
use super::data_source::DataSource;
use super::page_stream::PageStream;
use super::worker::spawn_worker;
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::model::types::{DatasetSchema, RowRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Configured(DatasetSchema),
    Page(Vec<RowRecord>),
    RowsExhausted,
    Failed(LoadError),
}

pub struct GridLoader {
    segment: String,
    config: LoaderConfig,
}

impl GridLoader {
    pub fn new(segment: impl Into<String>, config: LoaderConfig) -> Self {
        Self {
            segment: segment.into(),
            config,
        }
    }

    /// Start the worker, the correlation router and the loading sequence on
    /// `handle`. Events are sent to `events` as they happen.
    pub fn spawn(
        self,
        handle: &Handle,
        source: Arc<dyn DataSource>,
        events: mpsc::UnboundedSender<LoadEvent>,
    ) -> LoaderHandle {
        let worker = spawn_worker(handle, source);
        let (client, router) = WorkerClient::connect(handle, worker.channels);
        let sequence = handle.spawn(self.run(client, events));

        LoaderHandle {
            tasks: vec![sequence, router, worker.task],
        }
    }

    async fn run(self, client: WorkerClient, events: mpsc::UnboundedSender<LoadEvent>) {
        info!("Loading segment '{}'", self.segment);

        let configure = {
            let client = client.clone();
            let events = events.clone();
            let segment = self.segment.clone();
            async move {
                let event = match client.configure(&segment).await {
                    Ok(schema) => LoadEvent::Configured(schema),
                    Err(err) => {
                        error!("CONFIGURE '{}' failed: {}", segment, err);
                        LoadEvent::Failed(err)
                    }
                };
                let _ = events.send(event);
            }
        };

        let stream = async {
            let mut pages = PageStream::new(client, self.segment.clone(), &self.config);
            let mut total = 0usize;

            while let Some(page) = pages.next_page().await {
                match page {
                    Ok(rows) => {
                        total += rows.len();
                        if events.send(LoadEvent::Page(rows)).is_err() {
                            // Model dropped; nobody is listening
                            return;
                        }
                    }
                    Err(err) => {
                        error!(
                            "Page load for '{}' failed after {} rows: {}",
                            self.segment, total, err
                        );
                        let _ = events.send(LoadEvent::Failed(err));
                        return;
                    }
                }
            }

            info!(
                "Row stream for '{}' exhausted: {} rows in {} pages",
                self.segment,
                total,
                pages.pages_fetched()
            );
            let _ = events.send(LoadEvent::RowsExhausted);
        };

        tokio::join!(configure, stream);
    }
}

/// Owns the background tasks of one loader. Dropping it tears them down.
pub struct LoaderHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl LoaderHandle {
    /// Abort every background task. Operations still in flight resolve as
    /// [`LoadError::Aborted`] for anyone waiting on them.
    pub fn shutdown(mut self) {
        self.abort_all();
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}

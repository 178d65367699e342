use tracing::debug;

use super::channel::WorkerClient;
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::model::types::RowRecord;

/// Finite producer of row pages for one segment.
///
/// The first page uses the small `first_page_size` so something can be shown
/// quickly; later pages use `page_size`, each keyed off the last id received.
/// The stream ends after a short or empty page, or after the first error.
pub struct PageStream {
    client: WorkerClient,
    segment: String,
    first_page_size: usize,
    page_size: usize,
    cursor: Option<u64>,
    pages_fetched: usize,
    finished: bool,
}

impl PageStream {
    pub fn new(client: WorkerClient, segment: impl Into<String>, config: &LoaderConfig) -> Self {
        Self {
            client,
            segment: segment.into(),
            first_page_size: config.first_page_size,
            page_size: config.page_size,
            cursor: None,
            pages_fetched: 0,
            finished: false,
        }
    }

    /// Fetch the next page. `None` once the stream is exhausted.
    pub async fn next_page(&mut self) -> Option<Result<Vec<RowRecord>, LoadError>> {
        if self.finished {
            return None;
        }

        let requested = self.next_page_size();
        let rows = match self
            .client
            .load_next(&self.segment, self.cursor, requested)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                self.finished = true;
                return Some(Err(err));
            }
        };

        if let Err(err) = self.check_ascending(&rows) {
            self.finished = true;
            return Some(Err(err));
        }

        self.pages_fetched += 1;
        if rows.is_empty() || rows.len() < requested {
            self.finished = true;
        }
        debug!(
            "Page {} of '{}': {} rows (requested {}), after {:?}",
            self.pages_fetched,
            self.segment,
            rows.len(),
            requested,
            self.cursor
        );

        match rows.last() {
            Some(last) => {
                self.cursor = Some(last.id);
                Some(Ok(rows))
            }
            None => None,
        }
    }

    fn check_ascending(&self, rows: &[RowRecord]) -> Result<(), LoadError> {
        let mut previous = self.cursor;
        for row in rows {
            if let Some(after) = previous {
                if row.id <= after {
                    return Err(LoadError::OutOfOrder {
                        after,
                        received: row.id,
                    });
                }
            }
            previous = Some(row.id);
        }
        Ok(())
    }

    /// Rewind to the start of the dataset
    pub fn restart(&mut self) {
        self.cursor = None;
        self.pages_fetched = 0;
        self.finished = false;
    }

    pub fn next_page_size(&self) -> usize {
        if self.pages_fetched == 0 {
            self.first_page_size
        } else {
            self.page_size
        }
    }

    /// Id of the last row received
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

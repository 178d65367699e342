use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::config::LayoutConfig;
use crate::error::DataSourceError;
use crate::model::dimension::{Axis, DimensionLedger};
use crate::model::types::{ColumnDescriptor, DatasetSchema, RowRecord, ValueType};

/// A complete dataset with stacked layout, served page by page.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: DatasetSchema,
    rows: Vec<RowRecord>,
}

impl Dataset {
    /// Lay out `columns` and `rows` from offset 0 and derive the schema.
    /// Rows must already be in ascending id order.
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<RowRecord>) -> Self {
        let columns = DimensionLedger::from_items(Axis::Columns, columns);
        let rows = DimensionLedger::from_items(Axis::Rows, rows);

        let schema = DatasetSchema {
            content_width: columns.extent(),
            content_height: rows.extent(),
            first_record_id: rows.as_slice().first().map(|r| r.id),
            last_record_id: rows.as_slice().last().map(|r| r.id),
            record_count: rows.len(),
            columns: columns.as_slice().to_vec(),
        };

        Self {
            schema,
            rows: rows.as_slice().to_vec(),
        }
    }

    /// Build a dataset from CSV: the header row names the columns, each
    /// record becomes a row labelled with its 1-based position.
    pub fn from_csv_reader<R: Read>(reader: R, layout: &LayoutConfig) -> Result<Self, DataSourceError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns: Vec<ColumnDescriptor> = headers
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                ColumnDescriptor::new(idx as u64, label, ValueType::Text, layout.default_column_width)
            })
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            // Pad or trim so every row has exactly one value per column
            let cells = (0..columns.len())
                .map(|col| record.get(col).unwrap_or_default().to_string())
                .collect();
            rows.push(RowRecord::new(
                idx as u64,
                (idx + 1).to_string(),
                layout.default_row_height,
                cells,
            ));
        }

        Ok(Self::new(columns, rows))
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P, layout: &LayoutConfig) -> Result<Self> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;
        let dataset = Self::from_csv_reader(file, layout)
            .with_context(|| format!("Failed to parse CSV file: {:?}", path.as_ref()))?;

        info!(
            "Loaded {:?}: {} columns, {} rows",
            path.as_ref(),
            dataset.schema.columns.len(),
            dataset.rows.len()
        );
        Ok(dataset)
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    /// Up to `page_size` rows with ids strictly greater than `start_after`
    pub fn page(&self, start_after: Option<u64>, page_size: usize) -> Vec<RowRecord> {
        let start = match start_after {
            Some(id) => self.rows.partition_point(|row| row.id <= id),
            None => 0,
        };

        self.rows
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect()
    }
}

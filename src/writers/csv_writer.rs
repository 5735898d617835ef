use crate::error::Result;
use crate::models::{Metric, TrafficTable};
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, TIME_COLUMN, WORKING_SENSORS_COLUMN};
use crate::utils::datetime::APP_DATETIME_FORMAT;
use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Plain CSV output with the same column layout as the Parquet writer. Nulls are empty cells.
#[derive(Debug, Default)]
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_table(&self, table: &TrafficTable, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, File::create(path)?);
        self.write_to(table, file)?;

        debug!(path = %path.display(), rows = table.len(), "Wrote CSV output");
        Ok(())
    }

    pub fn write_to<W: Write>(&self, table: &TrafficTable, sink: W) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(sink);

        let mut header = vec![TIME_COLUMN.to_string()];
        header.extend(table.stations.column_names().into_iter().map(str::to_string));
        header.extend(Metric::ALL.iter().map(|m| m.abs_column().to_string()));
        header.extend(Metric::ALL.iter().map(|m| m.norm_column().to_string()));
        header.push(WORKING_SENSORS_COLUMN.to_string());
        writer.write_record(&header)?;

        for (row, timestamp) in table.timestamps().iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push(timestamp.format(APP_DATETIME_FORMAT).to_string());
            record.extend(table.stations.row_values(row).into_iter().map(format_value));
            record.extend(table.absolute.row(row).into_iter().map(format_value));
            record.extend(table.normalized.row(row).into_iter().map(format_value));
            record.push(table.working_sensors[row].to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

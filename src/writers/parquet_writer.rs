use crate::error::{ProcessingError, Result};
use crate::models::{Metric, MetricColumns, SensorColumn, SensorTable, TrafficTable};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE, TIME_COLUMN, WORKING_SENSORS_COLUMN,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Write the normalized table, one record batch per row group
    pub fn write_table(&self, table: &TrafficTable, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let schema = self.create_schema(table);
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let mut start = 0;
        while start < table.len() {
            let end = (start + self.row_group_size).min(table.len());
            let batch = self.table_to_batch(table, start..end, schema.clone())?;
            writer.write(&batch)?;
            start = end;
        }

        writer.close()?;
        debug!(path = %path.display(), rows = table.len(), "Wrote Parquet output");
        Ok(())
    }

    /// `Time`, station columns, absolute metrics, normalized metrics, `working_sensors`
    fn create_schema(&self, table: &TrafficTable) -> Arc<Schema> {
        let mut fields = vec![Field::new(
            TIME_COLUMN,
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        )];

        for column in table.stations.columns() {
            fields.push(Field::new(&column.name, DataType::Float64, true));
        }
        for metric in Metric::ALL {
            fields.push(Field::new(metric.abs_column(), DataType::Float64, true));
        }
        for metric in Metric::ALL {
            fields.push(Field::new(metric.norm_column(), DataType::Float64, true));
        }
        fields.push(Field::new(WORKING_SENSORS_COLUMN, DataType::UInt32, false));

        Arc::new(Schema::new(fields))
    }

    fn table_to_batch(
        &self,
        table: &TrafficTable,
        rows: Range<usize>,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let times: Vec<i64> = table.timestamps()[rows.clone()]
            .iter()
            .map(|t| t.and_utc().timestamp_millis())
            .collect();

        let mut arrays: Vec<ArrayRef> = vec![Arc::new(TimestampMillisecondArray::from(times))];

        for column in table.stations.columns() {
            arrays.push(Arc::new(Float64Array::from(
                column.values[rows.clone()].to_vec(),
            )));
        }
        for metric in Metric::ALL {
            arrays.push(Arc::new(Float64Array::from(
                table.absolute.get(metric)[rows.clone()].to_vec(),
            )));
        }
        for metric in Metric::ALL {
            arrays.push(Arc::new(Float64Array::from(
                table.normalized.get(metric)[rows.clone()].to_vec(),
            )));
        }
        arrays.push(Arc::new(UInt32Array::from(
            table.working_sensors[rows].to_vec(),
        )));

        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Read a normalized table back, optionally only its first `limit` rows
    pub fn read_table(&self, path: &Path, limit: Option<usize>) -> Result<TrafficTable> {
        let file = File::open(path)?;
        let parquet_reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(limit.unwrap_or(8192).clamp(1, 8192))
            .build()?;

        let mut timestamps: Vec<NaiveDateTime> = Vec::new();
        let mut stations: Vec<SensorColumn> = Vec::new();
        let mut absolute: [Vec<Option<f64>>; 5] = Default::default();
        let mut normalized: [Vec<Option<f64>>; 5] = Default::default();
        let mut working_sensors: Vec<u32> = Vec::new();

        for batch_result in parquet_reader {
            let batch = batch_result?;
            let remaining = limit.map_or(usize::MAX, |l| l.saturating_sub(timestamps.len()));
            if remaining == 0 {
                break;
            }
            let take = batch.num_rows().min(remaining);
            let schema = batch.schema();

            for (field, array) in schema.fields().iter().zip(batch.columns()) {
                let name = field.name().as_str();

                if name == TIME_COLUMN {
                    let times = downcast::<TimestampMillisecondArray>(array, name)?;
                    for i in 0..take {
                        let ms = times.value(i);
                        let timestamp = DateTime::<Utc>::from_timestamp_millis(ms)
                            .ok_or_else(|| {
                                ProcessingError::InvalidFormat(format!(
                                    "Invalid timestamp {} in Parquet file",
                                    ms
                                ))
                            })?
                            .naive_utc();
                        timestamps.push(timestamp);
                    }
                } else if name == WORKING_SENSORS_COLUMN {
                    let counts = downcast::<UInt32Array>(array, name)?;
                    working_sensors.extend((0..take).map(|i| counts.value(i)));
                } else {
                    let floats = downcast::<Float64Array>(array, name)?;
                    let values = (0..take).map(|i| {
                        if floats.is_null(i) {
                            None
                        } else {
                            Some(floats.value(i))
                        }
                    });

                    if let Some(metric) = Metric::ALL.iter().find(|m| m.abs_column() == name) {
                        absolute[metric.index()].extend(values);
                    } else if let Some(metric) =
                        Metric::ALL.iter().find(|m| m.norm_column() == name)
                    {
                        normalized[metric.index()].extend(values);
                    } else {
                        match stations.iter_mut().find(|c| c.name == name) {
                            Some(column) => column.values.extend(values),
                            None => stations.push(SensorColumn::new(name, values.collect())),
                        }
                    }
                }
            }
        }

        let rows = timestamps.len();
        if working_sensors.len() != rows {
            return Err(ProcessingError::InvalidFormat(format!(
                "Parquet file is missing the '{}' column",
                WORKING_SENSORS_COLUMN
            )));
        }

        Ok(TrafficTable {
            stations: SensorTable::with_columns(timestamps, stations)?,
            working_sensors,
            absolute: metric_columns(absolute, rows)?,
            normalized: metric_columns(normalized, rows)?,
        })
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let total_rows = file_metadata.num_rows();
        let file_size = std::fs::metadata(path)?.len();
        let columns = file_metadata.schema_descr().num_columns();

        let mut row_group_sizes = Vec::new();
        let mut compression = self.compression;
        for i in 0..row_groups {
            let rg_metadata = metadata.row_group(i);
            row_group_sizes.push(rg_metadata.num_rows());
            if i == 0 && rg_metadata.num_columns() > 0 {
                compression = rg_metadata.column(0).compression();
            }
        }

        Ok(ParquetFileInfo {
            total_rows,
            columns,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Unexpected type for column '{}'", name))
    })
}

fn metric_columns(values: [Vec<Option<f64>>; 5], rows: usize) -> Result<MetricColumns> {
    let mut columns = MetricColumns::with_len(rows);
    for metric in Metric::ALL {
        let series = &values[metric.index()];
        if series.is_empty() {
            continue;
        }
        if series.len() != rows {
            return Err(ProcessingError::InvalidFormat(format!(
                "Column '{}' has {} values but the file has {} rows",
                metric.abs_column(),
                series.len(),
                rows
            )));
        }
        columns.get_mut(metric).copy_from_slice(series);
    }
    Ok(columns)
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub columns: usize,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Columns: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.columns,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0, // Convert to MB
            self.compression,
            if self.row_groups > 0 {
                self.total_rows as f64 / self.row_groups as f64
            } else {
                0.0
            }
        )
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Timestamp anomaly at row {row}: {message}")]
    TimestampAnomaly { row: usize, message: String },

    #[error("Column '{column}' required by {context} is missing from the input")]
    MissingColumn { column: String, context: String },

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl ProcessingError {
    pub fn timestamp_anomaly(row: usize, message: impl Into<String>) -> Self {
        Self::TimestampAnomaly {
            row,
            message: message.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    /// Structural errors abort the batch; everything else is I/O or setup.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ProcessingError::TimestampAnomaly { .. } | ProcessingError::MissingColumn { .. }
        )
    }
}

/// Column names
pub const TIME_COLUMN: &str = "Time";
pub const WORKING_SENSORS_COLUMN: &str = "working_sensors";

/// Direction suffixes on station columns
pub const DIRECTION_IN: &str = "IN";
pub const DIRECTION_OUT: &str = "OUT";

/// Suffix inserted between station name and direction for fused columns
pub const MERGED_MARKER: &str = "MERGED";

/// Export file layout
pub const EXPORT_PREAMBLE_LINES: usize = 2;
pub const EXPORT_EXTENSION: &str = "csv";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Pipeline defaults
pub const DEFAULT_OUTLIER_CEILING: f64 = 800.0;
pub const DEFAULT_MIN_SEGMENT_ROWS: usize = 2;
pub const NORMALIZED_MIN: f64 = 0.0;
pub const NORMALIZED_MAX: f64 = 100.0;

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "TRAILCOUNT";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";

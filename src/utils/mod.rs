pub mod constants;
pub mod datetime;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use datetime::{parse_config_timestamp, parse_export_timestamp};
pub use filename::generate_default_output_filename;
pub use progress::ProgressReporter;

pub mod concurrent_reader;
pub mod export_reader;

pub use concurrent_reader::{ConcurrentReader, ExportFile, ExportSource};
pub use export_reader::{decode_export, ExportReader};

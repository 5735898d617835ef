use crate::error::{ProcessingError, Result};
use crate::models::SensorTable;
use crate::readers::ExportReader;
use crate::utils::constants::{ARCHIVE_EXTENSION, EXPORT_EXTENSION};
use rayon::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// Where the raw exports come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSource {
    Directory(PathBuf),
    Archive(PathBuf),
    File(PathBuf),
}

impl ExportSource {
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(ExportSource::Directory(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ProcessingError::MissingData(format!(
                "Input path does not exist: {}",
                path.display()
            )));
        }
        match extension_of(path).as_deref() {
            Some(ARCHIVE_EXTENSION) => Ok(ExportSource::Archive(path.to_path_buf())),
            Some(EXPORT_EXTENSION) => Ok(ExportSource::File(path.to_path_buf())),
            _ => Err(ProcessingError::InvalidFormat(format!(
                "Expected a directory, a .csv export or a .zip bundle: {}",
                path.display()
            ))),
        }
    }
}

/// A parsed export, still in its original column naming.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub name: String,
    pub table: SensorTable,
}

pub struct ConcurrentReader {
    max_workers: usize,
}

impl ConcurrentReader {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Read every export under `input`, returned in file-name order.
    pub fn read_exports(&self, input: &Path, reader: &ExportReader) -> Result<Vec<ExportFile>> {
        let source = ExportSource::detect(input)?;
        debug!(?source, "Resolved export source");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let exports = match source {
            ExportSource::File(path) => vec![ExportFile {
                name: file_name(&path),
                table: reader.read_file(&path)?,
            }],
            ExportSource::Directory(dir) => {
                let paths = Self::find_export_files(&dir)?;
                pool.install(|| {
                    paths
                        .par_iter()
                        .map(|path| {
                            Ok(ExportFile {
                                name: file_name(path),
                                table: reader.read_file(path)?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                })?
            }
            ExportSource::Archive(path) => {
                let entries = Self::read_archive_entries(&path)?;
                pool.install(|| {
                    entries
                        .par_iter()
                        .map(|(name, bytes)| {
                            Ok(ExportFile {
                                name: name.clone(),
                                table: reader.parse_bytes(bytes, name)?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                })?
            }
        };

        if exports.is_empty() {
            return Err(ProcessingError::MissingData(format!(
                "No .csv exports found in {}",
                input.display()
            )));
        }

        info!(
            files = exports.len(),
            rows = exports.iter().map(|e| e.table.len()).sum::<usize>(),
            "Read raw exports"
        );

        Ok(exports)
    }

    /// Find all CSV exports in a directory, sorted by file name
    fn find_export_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| extension_of(path).as_deref() == Some(EXPORT_EXTENSION))
            .collect();

        files.sort();
        Ok(files)
    }

    /// Load CSV entries of a zip bundle into memory, sorted by entry name
    fn read_archive_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut entries = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();

            if entry.is_dir() || !name.to_lowercase().ends_with(".csv") {
                continue;
            }

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            entries.push((name, bytes));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

impl Default for ConcurrentReader {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::{write::FileOptions, CompressionMethod, ZipWriter};

    fn export(hour: u32, value: u32) -> String {
        format!(
            "Export\nStationen\nTime,Gfäll IN,Gfäll OUT\n2016-05-10 {:02}:00:00,{},1\n",
            hour, value
        )
    }

    #[test]
    fn test_read_directory_in_name_order() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("2017.csv"), export(4, 20))?;
        std::fs::write(dir.path().join("2016.csv"), export(3, 10))?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let reader = ExportReader::new(&PipelineConfig::default());
        let exports = ConcurrentReader::new(2).read_exports(dir.path(), &reader)?;

        assert_eq!(exports.len(), 2);
        assert_eq!(exports[0].name, "2016.csv");
        assert_eq!(
            exports[1].table.column("Gfäll IN").unwrap().values,
            vec![Some(20.0)]
        );
        Ok(())
    }

    #[test]
    fn test_read_zip_bundle() -> Result<()> {
        let dir = TempDir::new()?;
        let zip_path = dir.path().join("exports.zip");
        {
            let file = File::create(&zip_path)?;
            let mut zip = ZipWriter::new(file);
            let options = FileOptions::default().compression_method(CompressionMethod::Stored);
            zip.start_file("b.csv", options)?;
            zip.write_all(export(4, 2).as_bytes())?;
            zip.start_file("a.csv", options)?;
            zip.write_all(export(3, 1).as_bytes())?;
            zip.finish()?;
        }

        let reader = ExportReader::new(&PipelineConfig::default());
        let exports = ConcurrentReader::new(1).read_exports(&zip_path, &reader)?;

        let names: Vec<&str> = exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        Ok(())
    }

    #[test]
    fn test_empty_directory_is_an_error() -> Result<()> {
        let dir = TempDir::new()?;
        let reader = ExportReader::new(&PipelineConfig::default());
        let result = ConcurrentReader::new(1).read_exports(dir.path(), &reader);
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
        Ok(())
    }
}

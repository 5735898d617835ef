use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::{SensorColumn, SensorTable};
use crate::utils::datetime::parse_export_timestamp;
use encoding_rs::{UTF_8, WINDOWS_1252};
use memmap2::Mmap;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Parses one counting-system CSV export into a raw, unsorted sensor table.
pub struct ExportReader {
    preamble_lines: usize,
    time_column: String,
    use_mmap: bool,
}

impl ExportReader {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            preamble_lines: config.preamble_lines,
            time_column: config.time_column.clone(),
            use_mmap: false,
        }
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Read an export file from disk
    pub fn read_file(&self, path: &Path) -> Result<SensorTable> {
        let source = path.display().to_string();

        if self.use_mmap {
            let file = File::open(path)?;
            let mmap = unsafe { Mmap::map(&file)? };
            self.parse_bytes(&mmap, &source)
        } else {
            let bytes = std::fs::read(path)?;
            self.parse_bytes(&bytes, &source)
        }
    }

    /// Parse the raw bytes of an export; `source` names the file in errors.
    pub fn parse_bytes(&self, bytes: &[u8], source: &str) -> Result<SensorTable> {
        let text = decode_export(bytes);
        let body = skip_lines(&text, self.preamble_lines);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = mangle_duplicate_headers(reader.headers()?.iter());
        let time_idx = headers
            .iter()
            .position(|h| h.as_deref() == Some(self.time_column.as_str()))
            .ok_or_else(|| {
                ProcessingError::missing_column(&self.time_column, format!("export {}", source))
            })?;

        // (field index, column) for every named, non-time header
        let mut columns: Vec<(usize, SensorColumn)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != time_idx)
            .filter_map(|(idx, name)| {
                name.as_ref()
                    .map(|name| (idx, SensorColumn::new(name.clone(), Vec::new())))
            })
            .collect();

        let mut timestamps = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;

            // Skip empty lines
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            let raw_time = record.get(time_idx).unwrap_or("");
            let timestamp = parse_export_timestamp(raw_time).map_err(|_| {
                ProcessingError::InvalidFormat(format!(
                    "{}: unparseable timestamp '{}' on data line {}",
                    source,
                    raw_time,
                    line + 1
                ))
            })?;
            timestamps.push(timestamp);

            for (idx, column) in columns.iter_mut() {
                let raw = record.get(*idx).unwrap_or("");
                let value = parse_count(raw).map_err(|reason| {
                    ProcessingError::InvalidFormat(format!(
                        "{}: invalid count '{}' ({}) in column '{}' on data line {}",
                        source,
                        raw,
                        reason,
                        column.name,
                        line + 1
                    ))
                })?;
                column.values.push(value);
            }
        }

        debug!(
            source,
            rows = timestamps.len(),
            columns = columns.len(),
            "Parsed export"
        );

        SensorTable::with_columns(timestamps, columns.into_iter().map(|(_, c)| c).collect())
    }
}

/// UTF-8 when the bytes are valid UTF-8, otherwise the Windows-1252 of the older exports.
pub fn decode_export(bytes: &[u8]) -> Cow<'_, str> {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return text;
    }
    WINDOWS_1252.decode_without_bom_handling(bytes).0
}

fn skip_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

/// Disambiguate repeated headers as `name`, `name.1`, `name.2`; empty headers become `None`.
fn mangle_duplicate_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<Option<String>> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    headers
        .map(|raw| {
            let name = raw.trim();
            if name.is_empty() {
                return None;
            }
            let count = seen.entry(name.to_string()).or_insert(0);
            let mangled = if *count == 0 {
                name.to_string()
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            Some(mangled)
        })
        .collect()
}

/// Counts are finite and non-negative; `inf` and negative values are rejected.
fn parse_count(raw: &str) -> std::result::Result<Option<f64>, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value = trimmed
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| "not a number")?;
    if !value.is_finite() {
        return Err("not finite");
    }
    if value < 0.0 {
        return Err("negative");
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn reader() -> ExportReader {
        ExportReader::new(&PipelineConfig::default())
    }

    const EXPORT: &str = "Zählstellen-Export\n\
                          Zeitraum: 2016\n\
                          Time,Gsenget IN,Gsenget OUT,Gsenget IN,Gsenget OUT,\n\
                          10. Mai 2016 03:00,4,2,1,,\n\
                          10. Mai 2016 04:00,,7,2,3,\n";

    #[test]
    fn test_parse_export_with_duplicate_headers() {
        let table = reader().parse_bytes(EXPORT.as_bytes(), "test").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column_names(),
            vec!["Gsenget IN", "Gsenget OUT", "Gsenget IN.1", "Gsenget OUT.1"]
        );
        assert_eq!(table.column("Gsenget IN").unwrap().values, vec![Some(4.0), None]);
        assert_eq!(table.column("Gsenget OUT.1").unwrap().values, vec![None, Some(3.0)]);
    }

    #[test]
    fn test_windows_1252_export() {
        let (encoded, _, _) = WINDOWS_1252.encode(EXPORT);
        let table = reader().parse_bytes(&encoded, "legacy").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.contains_column("Gsenget IN.1"));
    }

    #[test]
    fn test_missing_time_column() {
        let export = "a\nb\nZeit,Gfäll IN\n2016-05-10 03:00:00,1\n";
        let result = reader().parse_bytes(export.as_bytes(), "broken");
        assert!(matches!(result, Err(ProcessingError::MissingColumn { .. })));
    }

    #[test]
    fn test_invalid_count_is_rejected() {
        let export = "a\nb\nTime,Gfäll IN\n2016-05-10 03:00:00,viele\n";
        let result = reader().parse_bytes(export.as_bytes(), "broken");
        assert!(matches!(result, Err(ProcessingError::InvalidFormat(_))));
    }

    #[test]
    fn test_read_file_with_mmap() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", EXPORT)?;

        let buffered = reader().read_file(file.path())?;
        let mapped = reader().with_mmap(true).read_file(file.path())?;

        assert_eq!(buffered, mapped);
        Ok(())
    }

    #[test]
    fn test_parse_count_variants() {
        assert_eq!(parse_count("12").unwrap(), Some(12.0));
        assert_eq!(parse_count("1,5").unwrap(), Some(1.5));
        assert_eq!(parse_count(" ").unwrap(), None);
        assert_eq!(parse_count("NaN").unwrap(), None);
        assert!(parse_count("x").is_err());
        assert!(parse_count("inf").is_err());
        assert!(parse_count("-Infinity").is_err());
        assert!(parse_count("-3").is_err());
        assert_eq!(parse_count("0").unwrap(), Some(0.0));
    }

    #[test]
    fn test_non_finite_count_is_rejected() {
        let export = "a\nb\nTime,Gfäll IN,Gfäll OUT\n\
                      2016-05-10 03:00:00,4,1\n\
                      2016-05-10 04:00:00,-inf,2\n\
                      2016-05-10 05:00:00,6,3\n";
        let result = reader().parse_bytes(export.as_bytes(), "broken");
        assert!(matches!(
            result,
            Err(ProcessingError::InvalidFormat(ref message)) if message.contains("not finite")
        ));
    }
}

use crate::config::{ColumnMapping, DerivedColumn};
use crate::error::{ProcessingError, Result};
use crate::models::{SensorColumn, SensorTable};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarmonizeStats {
    pub renamed: usize,
    pub dropped: usize,
    pub derived: usize,
}

impl HarmonizeStats {
    pub fn merge(&mut self, other: HarmonizeStats) {
        self.renamed += other.renamed;
        self.dropped += other.dropped;
        self.derived += other.derived;
    }
}

/// Maps the column vocabulary of each export vintage onto canonical names.
pub struct ColumnHarmonizer<'a> {
    mapping: &'a ColumnMapping,
}

impl<'a> ColumnHarmonizer<'a> {
    pub fn new(mapping: &'a ColumnMapping) -> Self {
        Self { mapping }
    }

    /// Rename, drop, then derive, in that order.
    pub fn harmonize(&self, table: &mut SensorTable) -> Result<HarmonizeStats> {
        let mut stats = HarmonizeStats::default();

        for rename in &self.mapping.rename {
            if table.rename_column(&rename.from, &rename.to)? {
                stats.renamed += 1;
            }
        }

        for name in &self.mapping.drop {
            if table.remove_column(name).is_some() {
                stats.dropped += 1;
            }
        }

        for derived in &self.mapping.derived {
            if let Some(column) = derive_column(table, derived)? {
                table.remove_column(&column.name);
                table.insert_column(column)?;
                stats.derived += 1;
            }
        }

        debug!(
            renamed = stats.renamed,
            dropped = stats.dropped,
            derived = stats.derived,
            "Harmonized export columns"
        );

        Ok(stats)
    }
}

/// Row-wise sum of the source columns; null when any source is null.
fn derive_column(table: &SensorTable, derived: &DerivedColumn) -> Result<Option<SensorColumn>> {
    let sources: Vec<Option<&SensorColumn>> =
        derived.sum_of.iter().map(|name| table.column(name)).collect();

    if sources.iter().all(Option::is_none) {
        return Ok(None);
    }

    let mut present = Vec::with_capacity(sources.len());
    for (name, source) in derived.sum_of.iter().zip(sources) {
        match source {
            Some(column) => present.push(column),
            None => {
                return Err(ProcessingError::missing_column(
                    name,
                    format!("derived column '{}'", derived.name),
                ))
            }
        }
    }

    let values = (0..table.len())
        .map(|row| {
            present
                .iter()
                .try_fold(0.0, |acc, column| column.values[row].map(|v| acc + v))
        })
        .collect();

    Ok(Some(SensorColumn::new(derived.name.clone(), values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnRename;
    use chrono::NaiveDate;

    fn table() -> SensorTable {
        let t0 = NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SensorTable::with_columns(
            vec![t0, t0 + chrono::Duration::hours(1)],
            vec![
                SensorColumn::new("Gsenget IN.1", vec![Some(3.0), Some(4.0)]),
                SensorColumn::new("Bucina_Multi Fahrräder IN", vec![Some(1.0), None]),
                SensorColumn::new("Bucina_Multi Fußgänger IN", vec![Some(2.0), Some(5.0)]),
                SensorColumn::new("Spiegelau IN", vec![None, None]),
            ],
        )
        .unwrap()
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            rename: vec![ColumnRename {
                from: "Gsenget IN.1".to_string(),
                to: "Gsenget Fahrräder IN".to_string(),
            }],
            drop: vec!["Spiegelau IN".to_string(), "Not There".to_string()],
            derived: vec![DerivedColumn {
                name: "Bucina_Multi IN".to_string(),
                sum_of: vec![
                    "Bucina_Multi Fahrräder IN".to_string(),
                    "Bucina_Multi Fußgänger IN".to_string(),
                ],
            }],
        }
    }

    #[test]
    fn test_rename_drop_derive() {
        let mut table = table();
        let mapping = mapping();
        let stats = ColumnHarmonizer::new(&mapping).harmonize(&mut table).unwrap();

        assert_eq!(
            stats,
            HarmonizeStats {
                renamed: 1,
                dropped: 1,
                derived: 1
            }
        );
        assert!(table.contains_column("Gsenget Fahrräder IN"));
        assert!(!table.contains_column("Spiegelau IN"));
        assert_eq!(
            table.column("Bucina_Multi IN").unwrap().values,
            vec![Some(3.0), None]
        );
    }

    #[test]
    fn test_derive_skipped_without_sources() {
        let mut table = SensorTable::new(vec![]);
        let mapping = mapping();
        let stats = ColumnHarmonizer::new(&mapping).harmonize(&mut table).unwrap();
        assert_eq!(stats, HarmonizeStats::default());
    }

    #[test]
    fn test_derive_with_partial_sources_fails() {
        let mut table = table();
        table.remove_column("Bucina_Multi Fußgänger IN");
        let mapping = mapping();

        let result = ColumnHarmonizer::new(&mapping).harmonize(&mut table);
        assert!(matches!(result, Err(ProcessingError::MissingColumn { .. })));
    }
}
